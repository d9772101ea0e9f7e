// Cloudflare edge cache purge (zones/{zone_id}/purge_cache)

use crate::{HttpReply, Plan, PurgeRequest, PurgeTarget};
use purge_relay_core::{PublishEvent, PurgeFailure, PurgeOutcome, PurgeScope, Settings};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;

const PURGE_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub struct CloudflareTarget {
    zone_id: Option<String>,
    api_token: Option<String>,
    api_base: String,
}

/// Cloudflare API response wrapper.
///
/// `errors` stays raw JSON so fields like `error_chain` reach the detail
/// untouched, whatever shape the API sends.
#[derive(Debug, Deserialize)]
struct CloudflareResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    errors: Option<Value>,
}

impl CloudflareTarget {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            zone_id: settings.cloudflare.zone_id.clone(),
            api_token: settings.cloudflare.api_token.clone(),
            api_base: settings.cloudflare.api_base.clone(),
        }
    }

    fn purge_endpoint(&self, zone_id: &str) -> String {
        format!("{}/zones/{}/purge_cache", self.api_base, zone_id)
    }
}

impl PurgeTarget for CloudflareTarget {
    fn name(&self) -> &'static str {
        "cloudflare"
    }

    fn plan(&self, event: &PublishEvent) -> Result<Plan, PurgeFailure> {
        let (zone_id, api_token) = match (&self.zone_id, &self.api_token) {
            (Some(zone), Some(token)) => (zone, token),
            _ => {
                return Ok(Plan::Skip(
                    "CLOUDFLARE_ZONE_ID or CLOUDFLARE_API_TOKEN not set".to_string(),
                ));
            }
        };

        let body = match event.scope {
            PurgeScope::Url => json!({ "files": [event.url] }),
            PurgeScope::Everything => json!({ "purge_everything": true }),
        };

        Ok(Plan::Dispatch(
            PurgeRequest::new(Method::POST, self.purge_endpoint(zone_id))
                .bearer(api_token.as_str())
                .json(body)
                .timeout(Some(PURGE_TIMEOUT)),
        ))
    }

    fn classify(&self, reply: &HttpReply) -> PurgeOutcome {
        let parsed: Option<CloudflareResponse> = serde_json::from_str(&reply.body).ok();

        match parsed {
            Some(response) if reply.status == 200 && response.success == Some(true) => {
                PurgeOutcome::Success
            }
            Some(response) => PurgeOutcome::Failed(PurgeFailure::Api {
                status: reply.status,
                detail: error_detail(&response),
            }),
            None => PurgeOutcome::Failed(PurgeFailure::Api {
                status: reply.status,
                detail: format!(
                    "unexpected response body: {}",
                    reply.body.chars().take(200).collect::<String>()
                ),
            }),
        }
    }
}

fn error_detail(response: &CloudflareResponse) -> String {
    match &response.errors {
        Some(Value::Array(errors)) if errors.is_empty() => {
            format!("success={}", response.success.unwrap_or(false))
        }
        None | Some(Value::Null) => format!("success={}", response.success.unwrap_or(false)),
        Some(errors) => errors.to_string(),
    }
}
