use crate::context::ScanContext;
use crate::finding::{Evidence, Finding};
use crate::injection::{FillPolicy, InjectionPoint, points_for_form};
use crate::module::Check;
use tracing::{debug, info};
use url::form_urlencoded;
use webprobe_scanner::{FormDescriptor, Method, ProbeRequest};

/// Shapes a payload keeps when echoed without HTML encoding: the literal
/// text, its urlencoded form and its JavaScript string escape. HTML entity
/// encoding neutralises markup and is not a variant.
pub fn variants(payload: &str) -> Vec<String> {
    let urlencoded: String = form_urlencoded::byte_serialize(payload.as_bytes()).collect();
    let js_escaped = payload
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\'', "\\'")
        .replace('/', "\\/");

    let mut out = vec![payload.to_string()];
    for variant in [urlencoded, js_escaped] {
        if !out.contains(&variant) {
            out.push(variant);
        }
    }
    out
}

/// True when the payload, or one of its escaped variants, shows up in the
/// body.
pub fn reflects(body: &str, payload: &str) -> bool {
    !payload.is_empty() && variants(payload).iter().any(|v| body.contains(v.as_str()))
}

pub async fn probe(
    ctx: &ScanContext,
    check: &Check,
    point: &InjectionPoint,
    payloads: &[String],
) -> Vec<Finding> {
    let mut findings = Vec::new();
    for payload in payloads {
        if ctx.is_cancelled() {
            break;
        }
        let request = point.mutate(payload);
        let Some(response) = ctx.send(&request).await else {
            continue;
        };
        if reflects(&response.body, payload) {
            info!(module = check.tag, target = %point.target(), param = %point.name, "payload reflected");
            findings.push(check.finding(point, payload, request));
        }
    }
    findings
}

/// Write each payload through the form, then read the verification page and
/// look for it there. Forms without a free-text field are skipped.
pub async fn probe_stored(
    ctx: &ScanContext,
    check: &Check,
    form: &FormDescriptor,
    payloads: &[String],
) -> Vec<Finding> {
    let mut findings = Vec::new();
    let Some(verify_url) = ctx.policy.verify_url.as_ref() else {
        return findings;
    };
    if form.method != Method::Post {
        return findings;
    }
    let Some(point) = points_for_form(form, FillPolicy::FreeText)
        .into_iter()
        .find(InjectionPoint::is_free_text)
    else {
        debug!(action = %form.action, "no free-text field to store a payload in");
        return findings;
    };

    for payload in payloads {
        if ctx.is_cancelled() {
            break;
        }
        let write = point.mutate(payload);
        if ctx.send(&write).await.is_none() {
            continue;
        }
        let Some(page) = ctx.send(&ProbeRequest::get(verify_url.clone())).await else {
            continue;
        };
        if reflects(&page.body, payload) {
            info!(module = check.tag, action = %form.action, verify_url = %verify_url, "stored payload found");
            findings.push(check.finding(&point, payload, write).with_evidence(Evidence {
                verify_url: Some(verify_url.to_string()),
                ..Evidence::default()
            }));
        }
    }
    findings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_reflection() {
        let payload = "<script>alert(1)</script>";
        assert!(reflects("<p>Results for <script>alert(1)</script></p>", payload));
        assert!(!reflects("anything", ""));
    }

    #[test]
    fn test_escaped_variants_reflect() {
        let payload = "<script>alert(\"x\")</script>";
        assert_eq!(
            variants(payload),
            vec![
                payload.to_string(),
                "%3Cscript%3Ealert%28%22x%22%29%3C%2Fscript%3E".to_string(),
                "<script>alert(\\\"x\\\")<\\/script>".to_string(),
            ]
        );
        assert!(reflects(
            "var q = \"<script>alert(\\\"x\\\")<\\/script>\";",
            payload
        ));
        assert!(reflects("<a href=\"/s?q=%3Cscript%3Ealert%28%22x%22%29%3C%2Fscript%3E\">", payload));
    }

    #[test]
    fn test_html_entity_encoding_is_not_a_reflection() {
        let payload = "<script>alert(1)</script>";
        assert!(!reflects("<p>Results for &lt;script&gt;alert(1)&lt;/script&gt;</p>", payload));
    }

    #[test]
    fn test_plain_payload_has_one_variant() {
        assert_eq!(variants("xss1337"), vec!["xss1337".to_string()]);
    }
}
