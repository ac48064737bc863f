//! The caller side of the bridge: what the CLI does around one `open` call.
use anyhow::{Result, bail};
use gleaner_common::{ImportRequest, OkPayload};
use gleaner_core::ImportBridge;
use tracing::{debug, info};
use url::Url;

pub const EMPTY_CONTENT: &str = "Import returned empty content.";

#[derive(Debug, Clone, Copy)]
pub struct ImportPolicy {
    pub normalize_guide_urls: bool,
    pub require_text: bool,
}

impl Default for ImportPolicy {
    fn default() -> Self {
        Self {
            normalize_guide_urls: true,
            require_text: true,
        }
    }
}

/// Point GameFAQs guide URLs at their print view.
///
/// Anything else, including text that does not parse as a URL, comes back
/// unchanged.
pub fn normalize_guide_url(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw.trim()) else {
        return raw.to_string();
    };
    let is_gamefaqs = url
        .host_str()
        .is_some_and(|host| host.contains("gamefaqs.gamespot.com"));
    if !is_gamefaqs {
        return raw.to_string();
    }
    if !url.query_pairs().any(|(key, _)| key == "print") {
        url.query_pairs_mut().append_pair("print", "1");
    }
    url.to_string()
}

/// Run one import through `bridge`, applying the host's policy on both sides.
pub async fn import(bridge: &ImportBridge, raw_url: &str, policy: ImportPolicy) -> Result<OkPayload> {
    let url = if policy.normalize_guide_urls && !raw_url.trim().is_empty() {
        normalize_guide_url(raw_url)
    } else {
        raw_url.to_string()
    };
    if url != raw_url {
        debug!(target: "gleaner.host", from = %raw_url, to = %url, "normalized guide url");
    }

    let payload = bridge.open(ImportRequest::new(url)).await?;
    if policy.require_text && payload.text.trim().is_empty() {
        bail!(EMPTY_CONTENT);
    }
    info!(target: "gleaner.host", chars = payload.text.chars().count(), "import finished");
    Ok(payload)
}

/// Render a payload for output: the text itself, or `{"text": ...}`.
pub fn render(payload: &OkPayload, json: bool) -> Result<String> {
    if json {
        Ok(serde_json::to_string_pretty(payload)? + "\n")
    } else {
        Ok(payload.text.clone())
    }
}
