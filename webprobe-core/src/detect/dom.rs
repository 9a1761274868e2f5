use crate::context::ScanContext;
use crate::finding::{Evidence, Finding};
use crate::module::Check;
use tracing::info;
use webprobe_scanner::{ProbeRequest, Resource};

const SINKS: &[&str] = &["document.write", "innerhtml", "eval("];
const SOURCES: &[&str] = &["location.hash", "location.search"];

/// Page script writes into a DOM sink and reads a location source.
pub fn has_sink_and_source(body: &str) -> bool {
    let lower = body.to_ascii_lowercase();
    SINKS.iter().any(|s| lower.contains(s)) && SOURCES.iter().any(|s| lower.contains(s))
}

/// The page URL with `payload` in the fragment, percent-encoded.
pub fn fragment_url(url: &Resource, payload: &str) -> String {
    let mut with_fragment = url.url().clone();
    with_fragment.set_fragment(Some(payload));
    with_fragment.to_string()
}

/// Fragments never reach the server, so the evidence is the page's own
/// script plus a URL the analyst can open in a browser.
pub async fn probe(
    ctx: &ScanContext,
    check: &Check,
    url: &Resource,
    payloads: &[String],
) -> Vec<Finding> {
    if ctx.is_cancelled() {
        return Vec::new();
    }
    let request = ProbeRequest::get(url.clone());
    let Some(response) = ctx.send(&request).await else {
        return Vec::new();
    };
    if !has_sink_and_source(&response.body) {
        return Vec::new();
    }
    info!(module = check.tag, url = %url, "location source flows into a DOM sink");

    payloads
        .iter()
        .map(|payload| {
            check
                .url_finding(url, payload, request.clone())
                .with_evidence(Evidence {
                    dom_url: Some(fragment_url(url, payload)),
                    ..Evidence::default()
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_needs_a_source() {
        assert!(has_sink_and_source(
            "<script>document.getElementById('x').innerHTML = location.hash.slice(1);</script>"
        ));
        assert!(has_sink_and_source("<script>eval(decodeURI(LOCATION.SEARCH))</script>"));
        assert!(!has_sink_and_source("<script>document.write('static')</script>"));
        assert!(!has_sink_and_source("<p>location.hash is mentioned in the docs</p>"));
    }

    #[test]
    fn test_fragment_url_keeps_query() {
        let url = Resource::parse("http://example.com/app?x=1").unwrap();
        let out = fragment_url(&url, "<img src=x onerror=alert(1)>");
        assert!(out.starts_with("http://example.com/app?x=1#"));
        assert!(!out.contains(' '));
    }
}
