use crate::{
    CloudflareTarget, LocalCacheTarget, OutcomeSink, Plan, PurgeTarget, TracingSink, Transport,
};
use purge_relay_core::{PublishEvent, PurgeFailure, PurgeOutcome, Settings};
use std::sync::Arc;
use tracing::debug;

/// Fans one publish event out to every registered target.
///
/// Targets run one after another, in registration order. Each gets its own
/// outcome; a failure in one never stops the next.
pub struct Dispatcher {
    targets: Vec<Box<dyn PurgeTarget>>,
    transport: Arc<dyn Transport>,
    sinks: Vec<Arc<dyn OutcomeSink>>,
}

impl Dispatcher {
    /// Empty dispatcher that logs outcomes through `tracing`
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            targets: Vec::new(),
            transport,
            sinks: vec![Arc::new(TracingSink)],
        }
    }

    /// Dispatcher with the local cache and Cloudflare registered
    pub fn from_settings(settings: &Settings, transport: Arc<dyn Transport>) -> Self {
        let mut dispatcher = Self::new(transport);
        dispatcher
            .register(LocalCacheTarget::from_settings(settings))
            .register(CloudflareTarget::from_settings(settings));
        dispatcher
    }

    pub fn register<T: PurgeTarget + 'static>(&mut self, target: T) -> &mut Self {
        self.targets.push(Box::new(target));
        self
    }

    pub fn add_sink(&mut self, sink: Arc<dyn OutcomeSink>) -> &mut Self {
        self.sinks.push(sink);
        self
    }

    pub fn target_names(&self) -> Vec<&'static str> {
        self.targets.iter().map(|t| t.name()).collect()
    }

    /// Handle a publish event. Never fails; outcomes go to the sinks.
    pub async fn on_publish(&self, event: &PublishEvent) {
        for target in &self.targets {
            let outcome = self.run_target(target.as_ref(), event).await;
            for sink in &self.sinks {
                sink.record(target.name(), event, &outcome);
            }
        }
    }

    async fn run_target(&self, target: &dyn PurgeTarget, event: &PublishEvent) -> PurgeOutcome {
        let request = match target.plan(event) {
            Ok(Plan::Dispatch(request)) => request,
            Ok(Plan::Skip(reason)) => return PurgeOutcome::Skipped(reason),
            Err(failure) => return PurgeOutcome::Failed(failure),
        };

        debug!(purge_target = target.name(), url = %request.url, method = %request.method, "dispatching purge");

        match self.transport.send(&request).await {
            Ok(reply) => target.classify(&reply),
            Err(err) => PurgeOutcome::Failed(PurgeFailure::Transport {
                message: err.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HttpReply, MemorySink, PurgeRequest, ReqwestTransport, TransportError};
    use async_trait::async_trait;
    use httpmock::prelude::*;
    use purge_relay_core::config::settings_from_lookup;
    use std::sync::Mutex;

    /// Answers from a script and remembers what was sent
    struct ScriptedTransport {
        replies: Mutex<Vec<Result<HttpReply, TransportError>>>,
        sent: Mutex<Vec<PurgeRequest>>,
    }

    impl ScriptedTransport {
        fn new(replies: Vec<Result<HttpReply, TransportError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies),
                sent: Mutex::new(Vec::new()),
            })
        }

        fn sent(&self) -> Vec<PurgeRequest> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, request: &PurgeRequest) -> Result<HttpReply, TransportError> {
            self.sent.lock().unwrap().push(request.clone());
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                return Err(TransportError::request(&request.url, "no scripted reply"));
            }
            replies.remove(0)
        }
    }

    fn ok(status: u16, body: &str) -> Result<HttpReply, TransportError> {
        Ok(HttpReply {
            status,
            body: body.to_string(),
        })
    }

    fn settings(pairs: &[(&str, String)]) -> Settings {
        settings_from_lookup(|key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.clone())
        })
        .unwrap()
    }

    fn full_settings(site: &str, api_base: &str) -> Settings {
        settings(&[
            ("SITE_URL", site.to_string()),
            ("PURGE_PATH", "/purge".to_string()),
            ("PURGE_KEY", "k".to_string()),
            ("CLOUDFLARE_ZONE_ID", "zone".to_string()),
            ("CLOUDFLARE_API_TOKEN", "tok".to_string()),
            ("CLOUDFLARE_API_BASE", api_base.to_string()),
        ])
    }

    fn dispatcher_with_memory(
        settings: &Settings,
        transport: Arc<dyn Transport>,
    ) -> (Dispatcher, Arc<MemorySink>) {
        let memory = Arc::new(MemorySink::new());
        let mut dispatcher = Dispatcher::from_settings(settings, transport);
        dispatcher.add_sink(memory.clone());
        (dispatcher, memory)
    }

    #[test]
    fn test_from_settings_registers_both_targets() {
        let transport = ScriptedTransport::new(vec![]);
        let dispatcher = Dispatcher::from_settings(&Settings::default(), transport);
        assert_eq!(dispatcher.target_names(), vec!["local-cache", "cloudflare"]);
    }

    #[tokio::test]
    async fn test_unconfigured_targets_skip_without_http() {
        let transport = ScriptedTransport::new(vec![]);
        let (dispatcher, memory) = dispatcher_with_memory(&Settings::default(), transport.clone());

        dispatcher.on_publish(&PublishEvent::new("https://ex.com/a")).await;

        let reports = memory.take();
        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r.outcome.is_skipped()));
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_failure_in_one_target_does_not_block_the_next() {
        let transport = ScriptedTransport::new(vec![
            Err(TransportError::request("https://ex.com/purge/a/", "connection refused")),
            ok(200, r#"{"success":true}"#),
        ]);
        let settings = full_settings("https://ex.com", "https://cf.test/client/v4");
        let (dispatcher, memory) = dispatcher_with_memory(&settings, transport.clone());

        dispatcher.on_publish(&PublishEvent::new("https://ex.com/a")).await;

        let reports = memory.take();
        assert_eq!(reports[0].target, "local-cache");
        assert!(matches!(
            &reports[0].outcome,
            PurgeOutcome::Failed(PurgeFailure::Transport { message }) if message.contains("connection refused")
        ));
        assert_eq!(reports[1].target, "cloudflare");
        assert_eq!(reports[1].outcome, PurgeOutcome::Success);

        let sent = transport.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].url, "https://ex.com/purge/a/");
        assert_eq!(sent[1].url, "https://cf.test/client/v4/zones/zone/purge_cache");
    }

    #[tokio::test]
    async fn test_request_failure_is_recorded_not_raised() {
        let transport = ScriptedTransport::new(vec![ok(200, r#"{"success":true}"#)]);
        let settings = full_settings("https://ex.com", "https://cf.test");
        let (dispatcher, memory) = dispatcher_with_memory(&settings, transport.clone());

        dispatcher.on_publish(&PublishEvent::new("http://[::1")).await;

        let reports = memory.take();
        assert!(matches!(
            reports[0].outcome,
            PurgeOutcome::Failed(PurgeFailure::Request { .. })
        ));
        // Cloudflare still receives the raw URL
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_end_to_end_against_mock_servers() {
        let site = MockServer::start_async().await;
        let local = site
            .mock_async(|when, then| {
                when.method(POST).path("/purge/post-1/").header("x-purge-key", "k");
                then.status(200).body("OK");
            })
            .await;

        let api = MockServer::start_async().await;
        let purge = api
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/zones/zone/purge_cache")
                    .header("authorization", "Bearer tok")
                    .json_body(serde_json::json!({ "files": [site.url("/post-1")] }));
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"success":true,"errors":[],"messages":[],"result":{"id":"zone"}}"#);
            })
            .await;

        let settings = full_settings(&site.base_url(), &api.base_url());
        let transport: Arc<dyn Transport> = Arc::new(ReqwestTransport::new().unwrap());
        let (dispatcher, memory) = dispatcher_with_memory(&settings, transport);

        dispatcher
            .on_publish(&PublishEvent::new(site.url("/post-1")).with_content_id("7"))
            .await;

        local.assert_async().await;
        purge.assert_async().await;
        let reports = memory.take();
        assert!(reports.iter().all(|r| r.outcome.is_success()));
    }

    #[tokio::test]
    async fn test_cloudflare_api_error_against_mock_server() {
        let api = MockServer::start_async().await;
        api.mock_async(|when, then| {
            when.method(POST).path("/zones/zone/purge_cache");
            then.status(200).body(
                r#"{"success":false,"errors":[{"code":1012,"message":"bad files"}]}"#,
            );
        })
        .await;

        let settings = settings(&[
            ("CLOUDFLARE_ZONE_ID", "zone".to_string()),
            ("CLOUDFLARE_API_TOKEN", "tok".to_string()),
            ("CLOUDFLARE_API_BASE", api.base_url()),
        ]);
        let transport: Arc<dyn Transport> = Arc::new(ReqwestTransport::new().unwrap());
        let (dispatcher, memory) = dispatcher_with_memory(&settings, transport);

        dispatcher.on_publish(&PublishEvent::new("https://ex.com/a")).await;

        let reports = memory.take();
        assert!(reports[0].outcome.is_skipped());
        assert!(matches!(
            &reports[1].outcome,
            PurgeOutcome::Failed(PurgeFailure::Api { status: 200, detail }) if detail.contains("bad files")
        ));
    }

    #[tokio::test]
    async fn test_skipped_cloudflare_makes_no_call() {
        let api = MockServer::start_async().await;
        let purge = api
            .mock_async(|when, then| {
                when.method(POST);
                then.status(200).body(r#"{"success":true}"#);
            })
            .await;

        let settings = settings(&[
            ("CLOUDFLARE_ZONE_ID", "zone".to_string()),
            ("CLOUDFLARE_API_TOKEN", String::new()),
            ("CLOUDFLARE_API_BASE", api.base_url()),
        ]);
        let transport: Arc<dyn Transport> = Arc::new(ReqwestTransport::new().unwrap());
        let (dispatcher, memory) = dispatcher_with_memory(&settings, transport);

        dispatcher.on_publish(&PublishEvent::new("https://ex.com/a")).await;

        purge.assert_hits_async(0).await;
        assert!(memory.take().iter().all(|r| r.outcome.is_skipped()));
    }

    #[tokio::test]
    async fn test_unreachable_targets_fail_quietly() {
        let settings = full_settings("http://127.0.0.1:1", "http://127.0.0.1:1");
        let transport: Arc<dyn Transport> = Arc::new(ReqwestTransport::new().unwrap());
        let (dispatcher, memory) = dispatcher_with_memory(&settings, transport);

        dispatcher.on_publish(&PublishEvent::new("https://ex.com/a")).await;

        let reports = memory.take();
        assert_eq!(reports.len(), 2);
        for report in reports {
            assert!(matches!(
                report.outcome,
                PurgeOutcome::Failed(PurgeFailure::Transport { .. })
            ));
        }
    }
}
