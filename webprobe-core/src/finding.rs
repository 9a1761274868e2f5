use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use webprobe_scanner::ProbeRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Info => "info",
        }
    }
}

/// Module-specific observations. Only the keys a strategy filled in are
/// serialized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_delay: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline_delay: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_false: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub len_true: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub len_false: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verify_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dom_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue: Option<String>,
}

/// One piece of evidence for a suspected vulnerability.
///
/// `request` is the exact request that produced the evidence, so every
/// finding can be replayed by hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// Check tag, e.g. `error_based_sqli`.
    pub module: String,
    /// Registry id of the module the check belongs to.
    pub category: String,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwe_id: Option<String>,
    /// Probed resource or form action.
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    pub payload: String,
    pub request: ProbeRequest,
    #[serde(flatten)]
    pub evidence: Evidence,
}

impl Finding {
    pub fn new(
        module: impl Into<String>,
        category: impl Into<String>,
        severity: Severity,
        target: impl Into<String>,
        payload: impl Into<String>,
        request: ProbeRequest,
    ) -> Self {
        Self {
            module: module.into(),
            category: category.into(),
            severity,
            cwe_id: None,
            target: target.into(),
            param: None,
            payload: payload.into(),
            request,
            evidence: Evidence::default(),
        }
    }

    pub fn with_cwe(mut self, cwe: impl Into<String>) -> Self {
        self.cwe_id = Some(cwe.into());
        self
    }

    pub fn with_param(mut self, param: impl Into<String>) -> Self {
        self.param = Some(param.into());
        self
    }

    pub fn with_evidence(mut self, evidence: Evidence) -> Self {
        self.evidence = evidence;
        self
    }

    /// Flat key/value view for the report collaborator. Always has
    /// `module`, `target` and `payload`.
    pub fn to_mapping(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => {
                let mut map = Map::new();
                map.insert("module".into(), Value::String(self.module.clone()));
                map.insert("target".into(), Value::String(self.target.clone()));
                map.insert("payload".into(), Value::String(self.payload.clone()));
                map
            }
        }
    }

    /// One-line human summary of the evidence.
    pub fn details(&self) -> String {
        let e = &self.evidence;
        let mut parts = Vec::new();
        if let Some(ref issue) = e.issue {
            parts.push(issue.clone());
        }
        if let Some(ref matched) = e.matched {
            parts.push(format!("matched '{}'", matched));
        }
        if let Some(delay) = e.observed_delay {
            parts.push(format!("observed delay {:.2}s", delay));
        }
        if let (Some(t), Some(f)) = (e.len_true, e.len_false) {
            parts.push(format!("length true={} false={}", t, f));
        }
        if let Some(ref to) = e.redirect_to {
            parts.push(format!("redirected to {}", to));
        }
        if let Some(ref url) = e.verify_url {
            parts.push(format!("stored payload seen at {}", url));
        }
        if let Some(ref url) = e.dom_url {
            parts.push(format!("open {}", url));
        }
        if let Some(ref original) = e.original {
            parts.push(format!("original value {}", original));
        }
        if let (Some(u), Some(p)) = (&e.username, &e.password) {
            parts.push(format!("credentials {}:{}", u, p));
        }
        if let Some(ref name) = e.filename {
            parts.push(format!("uploaded {}", name));
        }
        parts.join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use webprobe_scanner::Resource;

    #[test]
    fn test_mapping_has_required_and_evidence_keys() {
        let url = Resource::parse("http://example.com/item?id=1").unwrap();
        let finding = Finding::new(
            "time_based_sqli",
            "sql_injection",
            Severity::High,
            url.as_str(),
            "1' AND SLEEP(5)--",
            webprobe_scanner::ProbeRequest::get(url.clone()),
        )
        .with_param("id")
        .with_evidence(Evidence {
            observed_delay: Some(5.12),
            ..Evidence::default()
        });

        let map = finding.to_mapping();
        assert_eq!(map["module"], "time_based_sqli");
        assert_eq!(map["target"], "http://example.com/item?id=1");
        assert_eq!(map["payload"], "1' AND SLEEP(5)--");
        assert_eq!(map["observed_delay"], 5.12);
        assert_eq!(map["request"]["method"], "GET");
        assert!(!map.contains_key("redirect_to"));
        assert!(finding.details().contains("5.12s"));
    }
}
