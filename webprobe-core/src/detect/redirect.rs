use crate::context::ScanContext;
use crate::finding::{Evidence, Finding};
use crate::injection::InjectionPoint;
use crate::module::Check;
use tracing::info;
use url::Url;

/// The redirect chain ended on a host other than the scan origin.
pub fn is_external(final_url: &Url, origin_host: &str) -> bool {
    final_url
        .host_str()
        .is_some_and(|host| !host.eq_ignore_ascii_case(origin_host))
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
        if is_external(&response.final_url, &ctx.origin_host) {
            info!(
                module = check.tag,
                target = %point.target(),
                param = %point.name,
                redirect_to = %response.final_url,
                "redirected off-site"
            );
            findings.push(check.finding(point, payload, request).with_evidence(Evidence {
                redirect_to: Some(response.final_url.to_string()),
                ..Evidence::default()
            }));
        }
    }
    findings
}
