use anyhow::Result;
use purge_relay_core::config::redact;
use purge_relay_core::{PublishEvent, Settings};
use purge_relay_targets::{CloudflareTarget, LocalCacheTarget, Plan, PurgeTarget};

/// Show which targets would act on a publish, without sending anything
pub fn run(settings: &Settings) -> Result<()> {
    println!("🔧 purge-relay configuration\n");
    for line in describe(settings) {
        println!("{}", line);
    }
    Ok(())
}

pub fn describe(settings: &Settings) -> Vec<String> {
    let site = settings.site_url.as_deref().unwrap_or("https://example.com");
    let sample = PublishEvent::new(format!("{}/sample-post", site));

    let mut lines = vec![format!(
        "   Site URL: {}",
        settings.site_url.as_deref().unwrap_or("(not set)")
    )];

    let local = LocalCacheTarget::from_settings(settings);
    lines.push(describe_target(&local, &sample));
    if let Some(key) = &settings.local_cache.purge_key {
        lines.push(format!(
            "     {}: {}",
            settings.local_cache.purge_key_header,
            redact(key)
        ));
    }
    if let Some(timeout) = settings.local_cache.timeout {
        lines.push(format!("     Timeout: {}s", timeout.as_secs()));
    }

    let cloudflare = CloudflareTarget::from_settings(settings);
    lines.push(describe_target(&cloudflare, &sample));
    if let Some((zone, token)) = settings.cloudflare.credentials() {
        lines.push(format!("     Zone: {}  Token: {}", zone, redact(token)));
    }

    lines.push(format!(
        "   Listener auth: {}",
        if settings.hook_token.is_some() {
            "bearer token required"
        } else {
            "open (HOOK_TOKEN not set)"
        }
    ));

    lines
}

fn describe_target(target: &dyn PurgeTarget, sample: &PublishEvent) -> String {
    match target.plan(sample) {
        Ok(Plan::Dispatch(request)) => {
            format!("   ✓ {}: {} {}", target.name(), request.method, request.url)
        }
        Ok(Plan::Skip(reason)) => format!("   - {}: not configured ({})", target.name(), reason),
        Err(failure) => format!("   ✗ {}: {}", target.name(), failure),
    }
}
