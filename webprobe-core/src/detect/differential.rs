use crate::context::ScanContext;
use crate::finding::{Evidence, Finding};
use crate::injection::InjectionPoint;
use crate::module::Check;
use tracing::{debug, info};

const TRUE_FORMS: [(&str, &str); 2] = [("'1'='2", "'1'='1"), ("\"1\"=\"2", "\"1\"=\"1")];
const FALSE_FORMS: [(&str, &str); 2] = [("'1'='1", "'1'='2"), ("\"1\"=\"1", "\"1\"=\"2")];

/// Derive the (true, false) pair for a boolean payload. `None` when both
/// variants come out identical.
pub fn variants(payload: &str) -> Option<(String, String)> {
    let rewrite = |forms: &[(&str, &str)]| {
        forms
            .iter()
            .fold(payload.to_string(), |acc, (from, to)| acc.replace(from, to))
    };
    let truthy = rewrite(&TRUE_FORMS);
    let falsy = rewrite(&FALSE_FORMS);
    if truthy == falsy {
        None
    } else {
        Some((truthy, falsy))
    }
}

pub fn length_delta(len_true: usize, len_false: usize) -> usize {
    len_true.abs_diff(len_false)
}

pub fn exceeds(len_true: usize, len_false: usize, threshold: usize) -> bool {
    length_delta(len_true, len_false) >= threshold
}

pub async fn probe(
    ctx: &ScanContext,
    check: &Check,
    point: &InjectionPoint,
    payloads: &[String],
) -> Vec<Finding> {
    let mut findings = Vec::new();
    let threshold = ctx.policy.length_threshold;

    for payload in payloads {
        if ctx.is_cancelled() {
            break;
        }
        let Some((truthy, falsy)) = variants(payload) else {
            debug!(payload = %payload, "degenerate boolean payload, skipped");
            continue;
        };

        let request = point.mutate(&truthy);
        let Some(response_true) = ctx.send(&request).await else {
            continue;
        };
        let Some(response_false) = ctx.send(&point.mutate(&falsy)).await else {
            continue;
        };

        let (len_true, len_false) = (response_true.len(), response_false.len());
        if exceeds(len_true, len_false, threshold) {
            info!(
                module = check.tag,
                target = %point.target(),
                param = %point.name,
                len_true,
                len_false,
                "boolean responses differ"
            );
            findings.push(check.finding(point, &truthy, request).with_evidence(Evidence {
                payload_false: Some(falsy),
                len_true: Some(len_true),
                len_false: Some(len_false),
                ..Evidence::default()
            }));
        }
    }
    findings
}
