// Purge targets (local reverse-proxy cache, Cloudflare edge cache) and the
// dispatcher that fans a publish event out to them.

pub mod cloudflare;
pub mod dispatcher;
pub mod local;
pub mod sink;
pub mod transport;

pub use cloudflare::CloudflareTarget;
pub use dispatcher::Dispatcher;
pub use local::LocalCacheTarget;
pub use sink::{MemorySink, OutcomeSink, TargetReport, TracingSink};
pub use transport::{HttpReply, PurgeRequest, ReqwestTransport, Transport, TransportError};

use purge_relay_core::{PublishEvent, PurgeFailure, PurgeOutcome};

/// What a target wants to do with an event after checking its configuration
#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    Dispatch(PurgeRequest),
    Skip(String),
}

/// One cache-purge destination.
///
/// Targets never perform I/O themselves: they describe the request and
/// judge the reply, and the dispatcher's transport sits in between.
pub trait PurgeTarget: Send + Sync {
    fn name(&self) -> &'static str;

    /// Check configuration and build the outbound request.
    ///
    /// Missing configuration is `Ok(Plan::Skip(..))`; an `Err` means the
    /// event itself could not be turned into a request.
    fn plan(&self, event: &PublishEvent) -> Result<Plan, PurgeFailure>;

    /// Decide what a completed HTTP exchange means for this target
    fn classify(&self, reply: &HttpReply) -> PurgeOutcome;
}
