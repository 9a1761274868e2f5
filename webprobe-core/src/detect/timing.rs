use crate::context::ScanContext;
use crate::finding::{Evidence, Finding};
use crate::injection::InjectionPoint;
use crate::module::Check;
use std::time::Duration;
use tracing::info;

pub fn exceeds(elapsed: Duration, baseline: Duration, threshold: Duration) -> bool {
    elapsed.saturating_sub(baseline) >= threshold
}

fn seconds(d: Duration) -> f64 {
    (d.as_secs_f64() * 100.0).round() / 100.0
}

pub async fn probe(
    ctx: &ScanContext,
    check: &Check,
    point: &InjectionPoint,
    payloads: &[String],
    threshold: Duration,
) -> Vec<Finding> {
    let mut findings = Vec::new();

    let baseline = if ctx.policy.timing_baseline {
        match ctx.send(&point.baseline()).await {
            Some(response) => response.elapsed,
            None => return findings,
        }
    } else {
        Duration::ZERO
    };

    for payload in payloads {
        if ctx.is_cancelled() {
            break;
        }
        let request = point.mutate(payload);
        let Some(response) = ctx.send(&request).await else {
            continue;
        };
        if exceeds(response.elapsed, baseline, threshold) {
            info!(
                module = check.tag,
                target = %point.target(),
                param = %point.name,
                elapsed = ?response.elapsed,
                "response delayed"
            );
            findings.push(check.finding(point, payload, request).with_evidence(Evidence {
                observed_delay: Some(seconds(response.elapsed)),
                baseline_delay: (!baseline.is_zero()).then(|| seconds(baseline)),
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
    fn test_threshold() {
        let threshold = Duration::from_secs_f64(3.0);
        assert!(exceeds(Duration::from_secs_f64(3.1), Duration::ZERO, threshold));
        assert!(exceeds(Duration::from_secs_f64(3.0), Duration::ZERO, threshold));
        assert!(!exceeds(Duration::from_secs_f64(2.9), Duration::ZERO, threshold));
    }

    #[test]
    fn test_baseline_is_subtracted() {
        let threshold = Duration::from_secs(5);
        assert!(!exceeds(Duration::from_secs(6), Duration::from_secs(2), threshold));
        assert!(exceeds(Duration::from_secs(8), Duration::from_secs(2), threshold));
        // A slower baseline than the probe never underflows.
        assert!(!exceeds(Duration::from_secs(1), Duration::from_secs(2), threshold));
    }

    #[test]
    fn test_rounding() {
        assert_eq!(seconds(Duration::from_millis(5123)), 5.12);
    }
}
