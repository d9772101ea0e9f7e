use anyhow::{Context, Result};
use purge_relay_core::{PublishEvent, PurgeOutcome, Settings};
use purge_relay_targets::{Dispatcher, MemorySink, ReqwestTransport, TargetReport, Transport};
use std::sync::Arc;

/// Purge one published URL
pub async fn run(settings: &Settings, url: String, content_id: Option<String>) -> Result<()> {
    let mut event = PublishEvent::new(url);
    if let Some(id) = content_id {
        event = event.with_content_id(id);
    }

    println!("📣 Purging {}", event.url);
    dispatch(settings, &event).await
}

/// Flush every target
pub async fn purge_all(settings: &Settings) -> Result<()> {
    let event = PublishEvent::everything(settings.site_url.clone().unwrap_or_default());

    println!("🧹 Flushing all cached content");
    dispatch(settings, &event).await
}

async fn dispatch(settings: &Settings, event: &PublishEvent) -> Result<()> {
    let transport: Arc<dyn Transport> =
        Arc::new(ReqwestTransport::new().context("Failed to create HTTP client")?);

    let reports = collect_reports(settings, transport, event).await;
    for report in &reports {
        println!("{}", summary_line(report));
    }

    Ok(())
}

/// Run one dispatch and hand back what each target did
pub async fn collect_reports(
    settings: &Settings,
    transport: Arc<dyn Transport>,
    event: &PublishEvent,
) -> Vec<TargetReport> {
    let memory = Arc::new(MemorySink::new());
    let mut dispatcher = Dispatcher::from_settings(settings, transport);
    dispatcher.add_sink(memory.clone());
    dispatcher.on_publish(event).await;
    memory.take()
}

pub fn summary_line(report: &TargetReport) -> String {
    match &report.outcome {
        PurgeOutcome::Success => format!("   ✓ {}: purged", report.target),
        PurgeOutcome::Skipped(reason) => format!("   - {}: skipped ({})", report.target, reason),
        PurgeOutcome::Failed(failure) => format!("   ✗ {}: {}", report.target, failure),
    }
}
