use anyhow::{Context, Result};
use purge_relay_core::{CacheListing, Settings};
use purge_relay_targets::local::parse_listing;
use purge_relay_targets::{LocalCacheTarget, ReqwestTransport, Transport};

/// Print the keys the local cache currently holds
pub async fn run(settings: &Settings) -> Result<()> {
    let transport = ReqwestTransport::new().context("Failed to create HTTP client")?;
    let listing = fetch_listing(settings, &transport).await?;

    println!("🗂  Local cache: {} entries", listing.len());
    print_section("Memory", &listing.mem);
    print_section("Disk", &listing.disk);

    Ok(())
}

pub async fn fetch_listing(settings: &Settings, transport: &dyn Transport) -> Result<CacheListing> {
    let target = LocalCacheTarget::from_settings(settings);
    let request = target
        .list_request()
        .context("Local cache not configured.\nSet SITE_URL and PURGE_PATH first")?;

    let reply = transport
        .send(&request)
        .await
        .context("Failed to reach the local cache")?;

    parse_listing(&reply).map_err(|failure| anyhow::anyhow!("Cache listing failed: {}", failure))
}

fn print_section(label: &str, keys: &[String]) {
    println!("   {} ({}):", label, keys.len());
    for key in keys {
        println!("     - {}", key);
    }
}
