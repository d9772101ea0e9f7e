use serde::{Deserialize, Serialize};
use std::fmt;

/// What a publish event asks the targets to evict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurgeScope {
    /// Only the published URL
    #[default]
    Url,
    /// Everything the target caches
    Everything,
}

/// A piece of content was saved at `url`.
///
/// Events are built by whatever plays host (the CLI or the webhook
/// listener) and live only for the duration of one dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_id: Option<String>,
    pub url: String,
    #[serde(default)]
    pub scope: PurgeScope,
}

impl PublishEvent {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            content_id: None,
            url: url.into(),
            scope: PurgeScope::Url,
        }
    }

    pub fn with_content_id(mut self, id: impl Into<String>) -> Self {
        self.content_id = Some(id.into());
        self
    }

    /// Flush event anchored at the site root
    pub fn everything(site_url: impl Into<String>) -> Self {
        Self {
            content_id: None,
            url: site_url.into(),
            scope: PurgeScope::Everything,
        }
    }
}

/// Why a dispatched purge did not succeed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PurgeFailure {
    /// Connection, DNS, TLS or timeout failure before a response arrived
    Transport { message: String },
    /// The remote API answered but refused the purge
    Api { status: u16, detail: String },
    /// The event could not be turned into a request
    Request { message: String },
}

impl fmt::Display for PurgeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PurgeFailure::Transport { message } => write!(f, "transport error: {}", message),
            PurgeFailure::Api { status, detail } => {
                write!(f, "api error (HTTP {}): {}", status, detail)
            }
            PurgeFailure::Request { message } => write!(f, "invalid request: {}", message),
        }
    }
}

/// Result of one target handling one event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum PurgeOutcome {
    Success,
    /// Target is not configured; never an error
    Skipped(String),
    Failed(PurgeFailure),
}

impl PurgeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PurgeOutcome::Success)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, PurgeOutcome::Skipped(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, PurgeOutcome::Failed(_))
    }
}

impl fmt::Display for PurgeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PurgeOutcome::Success => write!(f, "purged"),
            PurgeOutcome::Skipped(reason) => write!(f, "skipped ({})", reason),
            PurgeOutcome::Failed(failure) => write!(f, "failed: {}", failure),
        }
    }
}

/// Keys currently held by the local cache, as reported by its purge endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheListing {
    #[serde(default)]
    pub mem: Vec<String>,
    #[serde(default)]
    pub disk: Vec<String>,
}

impl CacheListing {
    pub fn len(&self) -> usize {
        self.mem.len() + self.disk.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_event_defaults_to_url_scope() {
        let event: PublishEvent =
            serde_json::from_str(r#"{"url":"https://ex.com/post-1"}"#).unwrap();
        assert_eq!(event.scope, PurgeScope::Url);
        assert_eq!(event.content_id, None);
    }

    #[test]
    fn test_everything_event() {
        let event = PublishEvent::everything("https://ex.com");
        assert_eq!(event.scope, PurgeScope::Everything);
        assert_eq!(event.url, "https://ex.com");
    }

    #[test]
    fn test_outcome_serializes_tagged() {
        let failed = PurgeOutcome::Failed(PurgeFailure::Api {
            status: 403,
            detail: "denied".to_string(),
        });
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["detail"]["kind"], "api");
        assert_eq!(json["detail"]["status"], 403);

        let json = serde_json::to_value(PurgeOutcome::Success).unwrap();
        assert_eq!(json["status"], "success");
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(PurgeOutcome::Success.to_string(), "purged");
        assert_eq!(
            PurgeOutcome::Skipped("no zone".to_string()).to_string(),
            "skipped (no zone)"
        );
        let failed = PurgeOutcome::Failed(PurgeFailure::Transport {
            message: "dns".to_string(),
        });
        assert_eq!(failed.to_string(), "failed: transport error: dns");
    }

    #[test]
    fn test_cache_listing_tolerates_missing_sections() {
        let listing: CacheListing = serde_json::from_str(r#"{"mem":["a::","b::"]}"#).unwrap();
        assert_eq!(listing.len(), 2);
        assert!(listing.disk.is_empty());
        assert!(!listing.is_empty());
    }
}
