use crate::config::AccessMarkers;
use crate::context::ScanContext;
use crate::finding::{Evidence, Finding};
use crate::injection::InjectionPoint;
use crate::module::Check;
use tracing::info;
use uuid::Uuid;

const RANDOM_UUIDS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdShape {
    Sequential(i64),
    Uuid,
}

/// Hyphenated UUIDs and all-digit values count as object identifiers.
pub fn classify(value: &str) -> Option<IdShape> {
    if is_hyphenated_uuid(value) {
        return Some(IdShape::Uuid);
    }
    if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
        return value.parse::<i64>().ok().map(IdShape::Sequential);
    }
    None
}

fn is_hyphenated_uuid(value: &str) -> bool {
    value.len() == 36
        && value.char_indices().all(|(i, c)| match i {
            8 | 13 | 18 | 23 => c == '-',
            _ => c.is_ascii_hexdigit(),
        })
}

/// Neighbouring and well-known ids, or fresh random UUIDs.
pub fn candidates(shape: IdShape) -> Vec<String> {
    match shape {
        IdShape::Sequential(n) => {
            let mut out: Vec<i64> = Vec::new();
            for c in [n.saturating_sub(1), n.saturating_add(1), 0, 9999] {
                if c >= 0 && c != n && !out.contains(&c) {
                    out.push(c);
                }
            }
            out.into_iter().map(|c| c.to_string()).collect()
        }
        IdShape::Uuid => (0..RANDOM_UUIDS)
            .map(|_| Uuid::new_v4().to_string())
            .collect(),
    }
}

/// Response looks like someone else's data: non-empty, no denial marker and
/// at least one data marker.
pub fn exposes_data(body: &str, markers: &AccessMarkers) -> bool {
    if body.trim().is_empty() {
        return false;
    }
    let lower = body.to_lowercase();
    !markers.denied.iter().any(|m| lower.contains(m.as_str()))
        && markers.valid.iter().any(|m| lower.contains(m.as_str()))
}

pub async fn probe(ctx: &ScanContext, check: &Check, point: &InjectionPoint) -> Vec<Finding> {
    let mut findings = Vec::new();
    let Some(shape) = classify(&point.original) else {
        return findings;
    };
    let issue = match shape {
        IdShape::Sequential(_) => "possible IDOR using sequential id",
        IdShape::Uuid => "possible IDOR using random UUID",
    };

    for candidate in candidates(shape) {
        if ctx.is_cancelled() {
            break;
        }
        let request = point.mutate(&candidate);
        let Some(response) = ctx.send(&request).await else {
            continue;
        };
        if exposes_data(&response.body, &ctx.policy.access_markers) {
            info!(
                module = check.tag,
                target = %point.target(),
                param = %point.name,
                candidate = %candidate,
                "foreign object returned"
            );
            findings.push(check.finding(point, &candidate, request).with_evidence(Evidence {
                original: Some(point.original.clone()),
                issue: Some(issue.to_string()),
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
    fn test_classify() {
        assert_eq!(classify("42"), Some(IdShape::Sequential(42)));
        assert_eq!(
            classify("3f2504e0-4f89-11d3-9a0c-0305e82c3301"),
            Some(IdShape::Uuid)
        );
        assert_eq!(classify("-1"), None);
        assert_eq!(classify("abc"), None);
        assert_eq!(classify(""), None);
        assert_eq!(classify("3f2504e04f8911d39a0c0305e82c3301"), None);
    }

    #[test]
    fn test_sequential_candidates() {
        assert_eq!(candidates(IdShape::Sequential(5)), vec!["4", "6", "0", "9999"]);
        assert_eq!(candidates(IdShape::Sequential(0)), vec!["1", "9999"]);
        assert_eq!(candidates(IdShape::Sequential(1)), vec!["0", "2", "9999"]);
        assert_eq!(candidates(IdShape::Sequential(9999)), vec!["9998", "10000", "0"]);
    }

    #[test]
    fn test_uuid_candidates_are_fresh() {
        let out = candidates(IdShape::Uuid);
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|u| classify(u) == Some(IdShape::Uuid)));
    }

    #[test]
    fn test_exposes_data() {
        let markers = AccessMarkers::default();
        assert!(exposes_data("<h1>Profile</h1> Email: bob@example.com", &markers));
        assert!(!exposes_data("Email: bob@example.com - Access Denied", &markers));
        assert!(!exposes_data("<p>nothing to see</p>", &markers));
        assert!(!exposes_data("", &markers));
    }
}
