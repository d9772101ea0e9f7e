use crate::{HttpReply, Plan, PurgeRequest, PurgeTarget};
use purge_relay_core::{CacheListing, PublishEvent, PurgeFailure, PurgeOutcome, PurgeScope, Settings};
use reqwest::Method;
use std::time::Duration;
use url::Url;

/// The reverse-proxy cache sitting in front of the site.
///
/// It exposes a purge endpoint under `PURGE_PATH`: a POST to
/// `{site}{PURGE_PATH}{path}/` evicts every key starting with `{path}/`,
/// a POST to `{site}{PURGE_PATH}/` flushes the whole cache, and a GET to
/// `{site}{PURGE_PATH}` lists what is cached. All of them require the key
/// header.
#[derive(Debug, Clone)]
pub struct LocalCacheTarget {
    site_url: Option<String>,
    purge_path: Option<String>,
    purge_key: Option<String>,
    key_header: String,
    timeout: Option<Duration>,
}

impl LocalCacheTarget {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            site_url: settings.site_url.clone(),
            purge_path: settings.local_cache.purge_path.clone(),
            purge_key: settings.local_cache.purge_key.clone(),
            key_header: settings.local_cache.purge_key_header.clone(),
            timeout: settings.local_cache.timeout,
        }
    }

    fn endpoint(&self) -> Result<(&str, &str), String> {
        match (&self.site_url, &self.purge_path) {
            (Some(site), Some(path)) => Ok((site.as_str(), path.as_str())),
            (None, None) => Err("SITE_URL and PURGE_PATH not set".to_string()),
            (None, _) => Err("SITE_URL not set".to_string()),
            (_, None) => Err("PURGE_PATH not set".to_string()),
        }
    }

    fn request(&self, method: Method, url: String) -> PurgeRequest {
        let request = PurgeRequest::new(method, url)
            .timeout(self.timeout)
            .insecure();
        match &self.purge_key {
            Some(key) => request.header(self.key_header.as_str(), key.as_str()),
            None => request,
        }
    }

    /// GET request for the cache index, `None` when not configured
    pub fn list_request(&self) -> Option<PurgeRequest> {
        let (site, path) = self.endpoint().ok()?;
        let url = format!("{}{}", site, path.trim_end_matches('/'));
        Some(self.request(Method::GET, url))
    }
}

impl PurgeTarget for LocalCacheTarget {
    fn name(&self) -> &'static str {
        "local-cache"
    }

    fn plan(&self, event: &PublishEvent) -> Result<Plan, PurgeFailure> {
        let (site, path) = match self.endpoint() {
            Ok(endpoint) => endpoint,
            Err(reason) => return Ok(Plan::Skip(reason)),
        };
        let url = purge_url(site, path, event)?;
        Ok(Plan::Dispatch(self.request(Method::POST, url)))
    }

    /// The cache answers "OK" or falls through to the site; neither is
    /// inspected. Reaching it at all counts as success.
    fn classify(&self, _reply: &HttpReply) -> PurgeOutcome {
        PurgeOutcome::Success
    }
}

const RELATIVE_BASE: &str = "http://relative.invalid/";

/// `{site}{purge_path}{relative path of the event URL}/`
pub fn purge_url(site_url: &str, purge_path: &str, event: &PublishEvent) -> Result<String, PurgeFailure> {
    let relative = match event.scope {
        PurgeScope::Url => relative_path(&event.url)?,
        PurgeScope::Everything => String::new(),
    };

    Ok(format!(
        "{}{}{}/",
        site_url.trim_end_matches('/'),
        purge_path.trim_end_matches('/'),
        relative.trim_end_matches('/')
    ))
}

/// Path component of a link with scheme and host removed.
///
/// Relative links resolve against the root, so `post-1` and `/post-1` agree
/// and a scheme-relative `//host/post-1` loses its host. Query and fragment
/// are dropped since the cache keys entries by path alone.
fn relative_path(link: &str) -> Result<String, PurgeFailure> {
    let parsed = match Url::parse(link) {
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            Url::parse(RELATIVE_BASE).and_then(|base| base.join(link))
        }
        other => other,
    };

    parsed
        .map(|url| url.path().to_string())
        .map_err(|e| PurgeFailure::Request {
            message: format!("cannot parse URL '{}': {}", link, e),
        })
}

/// Decode the cache index returned for `list_request`
pub fn parse_listing(reply: &HttpReply) -> Result<CacheListing, PurgeFailure> {
    if !(200..300).contains(&reply.status) {
        return Err(PurgeFailure::Api {
            status: reply.status,
            detail: reply.body.chars().take(200).collect(),
        });
    }

    // A wrong key makes the cache fall through to the site, which answers
    // with a page instead of JSON.
    serde_json::from_str(&reply.body).map_err(|e| PurgeFailure::Api {
        status: reply.status,
        detail: format!("unexpected listing response (wrong purge key?): {}", e),
    })
}
