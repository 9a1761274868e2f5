use crate::module::ModuleId;
use crate::scan::resolve_modules;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;
use webprobe_scanner::{ConfigError, Resource, Scope, TransportOptions};

/// Response vocabularies used by the access-control check. Compared
/// case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessMarkers {
    pub denied: Vec<String>,
    pub valid: Vec<String>,
}

impl Default for AccessMarkers {
    fn default() -> Self {
        Self {
            denied: ["access denied", "forbidden", "not authorized", "401 unauthorized"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            valid: [
                "user:",
                "email:",
                "profile:",
                "balance:",
                "<h1>profile</h1>",
                "account #",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Raw scan settings as handed over by the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    pub start_url: String,
    pub max_depth: usize,
    pub scope_pattern: Option<String>,
    pub exclude_pattern: Option<String>,
    pub request_delay: Duration,
    pub request_timeout: Duration,
    pub user_agent: Option<String>,
    /// `all` or a comma-separated list of module ids.
    pub module_names: String,
    pub crawl_workers: usize,
    pub probe_workers: usize,
    pub verify_url: Option<String>,
    pub length_threshold: usize,
    pub timing_baseline: bool,
    pub access_markers: AccessMarkers,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            start_url: String::new(),
            max_depth: 1,
            scope_pattern: None,
            exclude_pattern: None,
            request_delay: Duration::ZERO,
            request_timeout: Duration::from_secs(10),
            user_agent: None,
            module_names: "all".to_string(),
            crawl_workers: 4,
            probe_workers: 4,
            verify_url: None,
            length_threshold: 50,
            timing_baseline: false,
            access_markers: AccessMarkers::default(),
        }
    }
}

impl ScanConfig {
    pub fn new(start_url: impl Into<String>) -> Self {
        Self {
            start_url: start_url.into(),
            ..Self::default()
        }
    }

    /// Compile patterns and URLs. Nothing is sent until this succeeds.
    pub fn validate(&self) -> Result<ValidatedConfig, ConfigError> {
        let start = Resource::parse(self.start_url.trim())
            .map_err(|_| ConfigError::InvalidStartUrl(self.start_url.clone()))?;

        let scope = Scope::new(
            &start,
            self.scope_pattern.as_deref(),
            self.exclude_pattern.as_deref(),
        )?;

        let verify_url = match self.verify_url.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => Some(
                Resource::parse(raw).map_err(|_| ConfigError::InvalidVerifyUrl(raw.to_string()))?,
            ),
            _ => None,
        };

        let (modules, unknown_modules) = resolve_modules(&self.module_names);
        for name in &unknown_modules {
            warn!(module = %name, "unknown module, skipped");
        }

        let mut transport = TransportOptions {
            timeout: self.request_timeout,
            delay: self.request_delay,
            ..TransportOptions::default()
        };
        if let Some(ua) = self.user_agent.as_deref().filter(|ua| !ua.trim().is_empty()) {
            transport.user_agent = ua.to_string();
        }

        Ok(ValidatedConfig {
            origin_host: start.host().to_ascii_lowercase(),
            start,
            scope,
            max_depth: self.max_depth,
            crawl_workers: self.crawl_workers.max(1),
            probe_workers: self.probe_workers.max(1),
            transport,
            modules,
            unknown_modules,
            policy: ProbePolicy {
                verify_url,
                length_threshold: self.length_threshold,
                timing_baseline: self.timing_baseline,
                access_markers: self.access_markers.lowercased(),
            },
        })
    }
}

impl AccessMarkers {
    fn lowercased(&self) -> Self {
        Self {
            denied: self.denied.iter().map(|m| m.to_lowercase()).collect(),
            valid: self.valid.iter().map(|m| m.to_lowercase()).collect(),
        }
    }
}

/// Knobs the detection strategies read while probing.
#[derive(Debug, Clone, Default)]
pub struct ProbePolicy {
    pub verify_url: Option<Resource>,
    pub length_threshold: usize,
    pub timing_baseline: bool,
    pub access_markers: AccessMarkers,
}

#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    pub start: Resource,
    pub origin_host: String,
    pub scope: Scope,
    pub max_depth: usize,
    pub crawl_workers: usize,
    pub probe_workers: usize,
    pub transport: TransportOptions,
    pub modules: Vec<ModuleId>,
    pub unknown_modules: Vec<String>,
    pub policy: ProbePolicy,
}
