use crate::context::ScanContext;
use crate::detect::signature::SignatureClass;
use crate::detect::{access, credentials, csrf, differential, dom, redirect, reflection, signature, timing, upload};
use crate::finding::{Finding, Severity};
use crate::injection::{FillPolicy, InjectionPoint, Selector, points_for_form, points_for_resource};
use crate::payload::{PayloadKind, redirect_payloads, ssrf_payloads, traversal_payloads};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};
use webprobe_scanner::{FormDescriptor, ProbeRequest, Resource};

const URL_PARAM_NAMES: &[&str] = &["url", "link", "target", "dest", "uri"];
const REDIRECT_PARAM_NAMES: &[&str] = &[
    "next", "url", "redirect", "return", "goto", "dest", "continue", "to",
];

/// Registered vulnerability modules, in registry order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleId {
    SqlInjection,
    Xss,
    Csrf,
    NosqlInjection,
    DirectoryTraversal,
    Rce,
    OpenRedirect,
    Idor,
    Ssrf,
    InsecureFileUpload,
    Authentication,
}

impl ModuleId {
    pub const ALL: [ModuleId; 11] = [
        ModuleId::SqlInjection,
        ModuleId::Xss,
        ModuleId::Csrf,
        ModuleId::NosqlInjection,
        ModuleId::DirectoryTraversal,
        ModuleId::Rce,
        ModuleId::OpenRedirect,
        ModuleId::Idor,
        ModuleId::Ssrf,
        ModuleId::InsecureFileUpload,
        ModuleId::Authentication,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleId::SqlInjection => "sql_injection",
            ModuleId::Xss => "xss",
            ModuleId::Csrf => "csrf",
            ModuleId::NosqlInjection => "nosql_injection",
            ModuleId::DirectoryTraversal => "directory_traversal",
            ModuleId::Rce => "rce",
            ModuleId::OpenRedirect => "open_redirect",
            ModuleId::Idor => "idor",
            ModuleId::Ssrf => "ssrf",
            ModuleId::InsecureFileUpload => "insecure_file_upload",
            ModuleId::Authentication => "authentication",
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            ModuleId::SqlInjection => "error-based, boolean-based and time-based SQL injection",
            ModuleId::Xss => "reflected, stored and DOM-based cross-site scripting",
            ModuleId::Csrf => "missing or unenforced CSRF tokens on sensitive forms",
            ModuleId::NosqlInjection => "NoSQL error disclosure and time-based NoSQL injection",
            ModuleId::DirectoryTraversal => "path traversal to well-known system files",
            ModuleId::Rce => "OS command and code injection",
            ModuleId::OpenRedirect => "redirect parameters that leave the site",
            ModuleId::Idor => "object references that expose other users' data",
            ModuleId::Ssrf => "server-side request forgery through URL parameters",
            ModuleId::InsecureFileUpload => "upload forms that accept executable files",
            ModuleId::Authentication => "default credentials and weak passwords on login forms",
        }
    }

    /// Build the module's checks.
    pub fn construct(self) -> Module {
        let checks = match self {
            ModuleId::SqlInjection => vec![
                Check::new("error_based_sqli", self, Strategy::Signature(SignatureClass::Sql))
                    .payloads(PayloadSource::Book(PayloadKind::Sql))
                    .fill(FillPolicy::FreeText)
                    .rated(Severity::High, "CWE-89"),
                Check::new("boolean_based_sqli", self, Strategy::Differential)
                    .payloads(PayloadSource::Book(PayloadKind::Sql))
                    .fill(FillPolicy::FreeText)
                    .rated(Severity::High, "CWE-89"),
                Check::new(
                    "time_based_sqli",
                    self,
                    Strategy::Timing(Duration::from_secs_f64(5.0)),
                )
                .payloads(PayloadSource::Book(PayloadKind::SqlBlind))
                .fill(FillPolicy::FreeText)
                .rated(Severity::High, "CWE-89"),
            ],
            ModuleId::Xss => vec![
                Check::new("reflected_xss", self, Strategy::Reflection)
                    .payloads(PayloadSource::Book(PayloadKind::Xss))
                    .fill(FillPolicy::FreeText)
                    .rated(Severity::Medium, "CWE-79"),
                Check::new("stored_xss", self, Strategy::StoredReflection)
                    .scope(CheckScope::Form)
                    .payloads(PayloadSource::Book(PayloadKind::Xss))
                    .rated(Severity::High, "CWE-79"),
                Check::new("dom_based_xss", self, Strategy::DomSink)
                    .scope(CheckScope::Url)
                    .payloads(PayloadSource::Book(PayloadKind::Xss))
                    .rated(Severity::Medium, "CWE-79"),
            ],
            ModuleId::Csrf => vec![
                Check::new("csrf", self, Strategy::CsrfAudit)
                    .scope(CheckScope::Form)
                    .rated(Severity::Medium, "CWE-352"),
            ],
            ModuleId::NosqlInjection => vec![
                Check::new("simple_nosql", self, Strategy::Signature(SignatureClass::NoSql))
                    .payloads(PayloadSource::Book(PayloadKind::NoSql))
                    .fill(FillPolicy::FreeText)
                    .rated(Severity::High, "CWE-943"),
                Check::new(
                    "advanced_nosql",
                    self,
                    Strategy::Timing(Duration::from_secs_f64(2.0)),
                )
                .scope(CheckScope::Url)
                .payloads(PayloadSource::Book(PayloadKind::NoSqlBlind))
                .rated(Severity::High, "CWE-943"),
            ],
            ModuleId::DirectoryTraversal => vec![
                Check::new(
                    "directory_traversal",
                    self,
                    Strategy::Signature(SignatureClass::FileDisclosure),
                )
                .payloads(PayloadSource::Traversal)
                .rated(Severity::High, "CWE-22"),
            ],
            ModuleId::Rce => vec![
                Check::new(
                    "rce_command_injection",
                    self,
                    Strategy::Signature(SignatureClass::Command),
                )
                .payloads(PayloadSource::Book(PayloadKind::Rce))
                .fill(FillPolicy::FreeText)
                .rated(Severity::Critical, "CWE-78"),
                Check::new(
                    "rce_code_injection",
                    self,
                    Strategy::Signature(SignatureClass::Command),
                )
                .payloads(PayloadSource::Book(PayloadKind::Rce))
                .fill(FillPolicy::FreeText)
                .rated(Severity::Critical, "CWE-94"),
            ],
            ModuleId::OpenRedirect => vec![
                Check::new("open_redirect", self, Strategy::Redirect)
                    .select(Selector::Names(REDIRECT_PARAM_NAMES))
                    .payloads(PayloadSource::Redirect)
                    .rated(Severity::Medium, "CWE-601"),
            ],
            ModuleId::Idor => vec![
                Check::new("idor", self, Strategy::AccessControl)
                    .select(Selector::IdShaped)
                    .rated(Severity::High, "CWE-639"),
            ],
            ModuleId::Ssrf => vec![
                Check::new("ssrf", self, Strategy::Signature(SignatureClass::Ssrf))
                    .select(Selector::Names(URL_PARAM_NAMES))
                    .payloads(PayloadSource::Ssrf)
                    .rated(Severity::High, "CWE-918"),
            ],
            ModuleId::InsecureFileUpload => vec![
                Check::new("insecure_file_upload", self, Strategy::FileUpload)
                    .scope(CheckScope::Form)
                    .rated(Severity::High, "CWE-434"),
            ],
            ModuleId::Authentication => vec![
                Check::new("authentication", self, Strategy::CredentialGuess)
                    .scope(CheckScope::Form)
                    .rated(Severity::High, "CWE-521"),
            ],
        };
        Module { id: self, checks }
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModuleId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModuleId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| format!("unknown module '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckScope {
    Url,
    Form,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadSource {
    Book(PayloadKind),
    Traversal,
    Ssrf,
    Redirect,
    /// The strategy generates its own inputs.
    Builtin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Signature(SignatureClass),
    Reflection,
    StoredReflection,
    DomSink,
    Differential,
    Timing(Duration),
    Redirect,
    AccessControl,
    CsrfAudit,
    CredentialGuess,
    FileUpload,
}

impl Strategy {
    /// Strategies that write to the target run one probe at a time.
    pub fn has_side_effects(&self) -> bool {
        matches!(
            self,
            Strategy::StoredReflection
                | Strategy::CsrfAudit
                | Strategy::CredentialGuess
                | Strategy::FileUpload
        )
    }

    fn is_form_level(&self) -> bool {
        self.has_side_effects()
    }
}

/// One probing recipe inside a module.
#[derive(Debug, Clone)]
pub struct Check {
    pub tag: &'static str,
    pub category: ModuleId,
    pub scope: CheckScope,
    pub selector: Selector,
    pub fill: FillPolicy,
    pub payloads: PayloadSource,
    pub strategy: Strategy,
    pub severity: Severity,
    pub cwe: &'static str,
}

impl Check {
    pub fn new(tag: &'static str, category: ModuleId, strategy: Strategy) -> Self {
        Self {
            tag,
            category,
            scope: CheckScope::Both,
            selector: Selector::Injectable,
            fill: FillPolicy::Single,
            payloads: PayloadSource::Builtin,
            strategy,
            severity: Severity::Medium,
            cwe: "",
        }
    }

    pub fn scope(mut self, scope: CheckScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn select(mut self, selector: Selector) -> Self {
        self.selector = selector;
        self
    }

    pub fn fill(mut self, fill: FillPolicy) -> Self {
        self.fill = fill;
        self
    }

    pub fn payloads(mut self, source: PayloadSource) -> Self {
        self.payloads = source;
        self
    }

    pub fn rated(mut self, severity: Severity, cwe: &'static str) -> Self {
        self.severity = severity;
        self.cwe = cwe;
        self
    }

    fn base_finding(
        &self,
        target: &Resource,
        payload: impl Into<String>,
        request: ProbeRequest,
    ) -> Finding {
        let finding = Finding::new(
            self.tag,
            self.category.as_str(),
            self.severity,
            target.as_str(),
            payload,
            request,
        );
        if self.cwe.is_empty() {
            finding
        } else {
            finding.with_cwe(self.cwe)
        }
    }

    pub fn finding(
        &self,
        point: &InjectionPoint,
        payload: impl Into<String>,
        request: ProbeRequest,
    ) -> Finding {
        self.base_finding(point.target(), payload, request)
            .with_param(point.name.clone())
    }

    pub fn url_finding(
        &self,
        url: &Resource,
        payload: impl Into<String>,
        request: ProbeRequest,
    ) -> Finding {
        self.base_finding(url, payload, request)
    }

    pub fn form_finding(
        &self,
        form: &FormDescriptor,
        payload: impl Into<String>,
        request: ProbeRequest,
    ) -> Finding {
        self.base_finding(&form.action, payload, request)
    }

    fn resolve_payloads(&self, ctx: &ScanContext) -> Vec<String> {
        match self.payloads {
            PayloadSource::Book(kind) => ctx.payloads.get(kind).map(<[String]>::to_vec).unwrap_or_default(),
            PayloadSource::Traversal => traversal_payloads(),
            PayloadSource::Ssrf => ssrf_payloads(),
            PayloadSource::Redirect => redirect_payloads(),
            PayloadSource::Builtin => Vec::new(),
        }
    }

    fn concurrency(&self, ctx: &ScanContext) -> usize {
        if self.strategy.has_side_effects() {
            1
        } else {
            ctx.workers
        }
    }

    pub async fn scan_urls(&self, ctx: &ScanContext, urls: &[Resource]) -> Vec<Finding> {
        if self.scope == CheckScope::Form || self.strategy.is_form_level() {
            return Vec::new();
        }
        let payloads = self.resolve_payloads(ctx);

        if self.strategy == Strategy::DomSink {
            return stream::iter(urls)
                .map(|url| dom::probe(ctx, self, url, &payloads))
                .buffered(self.concurrency(ctx))
                .collect::<Vec<_>>()
                .await
                .into_iter()
                .flatten()
                .collect();
        }

        let points: Vec<InjectionPoint> = urls
            .iter()
            .flat_map(points_for_resource)
            .filter(|p| self.selector.matches(p))
            .collect();
        self.run_points(ctx, points, &payloads).await
    }

    pub async fn scan_forms(&self, ctx: &ScanContext, forms: &[FormDescriptor]) -> Vec<Finding> {
        if self.scope == CheckScope::Url {
            return Vec::new();
        }
        let payloads = self.resolve_payloads(ctx);

        if self.strategy.is_form_level() {
            if self.strategy == Strategy::StoredReflection && ctx.policy.verify_url.is_none() {
                debug!(module = self.tag, "no verification URL configured, skipped");
                return Vec::new();
            }
            let mut findings = Vec::new();
            for form in forms {
                if ctx.is_cancelled() {
                    break;
                }
                findings.extend(self.probe_form(ctx, form, &payloads).await);
            }
            return findings;
        }

        let points: Vec<InjectionPoint> = forms
            .iter()
            .flat_map(|form| points_for_form(form, self.fill))
            .filter(|p| self.selector.matches(p))
            .collect();
        self.run_points(ctx, points, &payloads).await
    }

    async fn run_points(
        &self,
        ctx: &ScanContext,
        points: Vec<InjectionPoint>,
        payloads: &[String],
    ) -> Vec<Finding> {
        if points.is_empty() {
            return Vec::new();
        }
        debug!(module = self.tag, points = points.len(), payloads = payloads.len(), "probing");
        stream::iter(points)
            .map(|point| async move { self.probe_point(ctx, &point, payloads).await })
            .buffered(self.concurrency(ctx))
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .flatten()
            .collect()
    }

    async fn probe_point(
        &self,
        ctx: &ScanContext,
        point: &InjectionPoint,
        payloads: &[String],
    ) -> Vec<Finding> {
        if ctx.is_cancelled() {
            return Vec::new();
        }
        match self.strategy {
            Strategy::Signature(class) => signature::probe(ctx, self, class, point, payloads).await,
            Strategy::Reflection => reflection::probe(ctx, self, point, payloads).await,
            Strategy::Differential => differential::probe(ctx, self, point, payloads).await,
            Strategy::Timing(threshold) => timing::probe(ctx, self, point, payloads, threshold).await,
            Strategy::Redirect => redirect::probe(ctx, self, point, payloads).await,
            Strategy::AccessControl => access::probe(ctx, self, point).await,
            Strategy::DomSink
            | Strategy::StoredReflection
            | Strategy::CsrfAudit
            | Strategy::CredentialGuess
            | Strategy::FileUpload => Vec::new(),
        }
    }

    async fn probe_form(
        &self,
        ctx: &ScanContext,
        form: &FormDescriptor,
        payloads: &[String],
    ) -> Vec<Finding> {
        match self.strategy {
            Strategy::StoredReflection => reflection::probe_stored(ctx, self, form, payloads).await,
            Strategy::CsrfAudit => csrf::audit(ctx, self, form).await,
            Strategy::CredentialGuess => credentials::guess(ctx, self, form).await,
            Strategy::FileUpload => upload::probe(ctx, self, form).await,
            _ => Vec::new(),
        }
    }
}

/// A named vulnerability module: a fixed, ordered list of checks.
#[derive(Debug, Clone)]
pub struct Module {
    pub id: ModuleId,
    pub checks: Vec<Check>,
}

impl Module {
    /// Payload sets this module cannot run without.
    pub fn required_payloads(&self) -> Vec<PayloadKind> {
        let mut kinds = Vec::new();
        for check in &self.checks {
            if let PayloadSource::Book(kind) = check.payloads
                && !kinds.contains(&kind)
            {
                kinds.push(kind);
            }
        }
        kinds
    }

    pub async fn scan_urls(&self, ctx: &ScanContext, urls: &[Resource]) -> Vec<Finding> {
        let mut findings = Vec::new();
        for check in &self.checks {
            if ctx.is_cancelled() {
                break;
            }
            let found = check.scan_urls(ctx, urls).await;
            if !found.is_empty() {
                info!(module = check.tag, findings = found.len(), "URL findings");
            }
            findings.extend(found);
        }
        findings
    }

    pub async fn scan_forms(&self, ctx: &ScanContext, forms: &[FormDescriptor]) -> Vec<Finding> {
        let mut findings = Vec::new();
        for check in &self.checks {
            if ctx.is_cancelled() {
                break;
            }
            let found = check.scan_forms(ctx, forms).await;
            if !found.is_empty() {
                info!(module = check.tag, findings = found.len(), "form findings");
            }
            findings.extend(found);
        }
        findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_round_trips_names() {
        for id in ModuleId::ALL {
            assert_eq!(id.as_str().parse::<ModuleId>(), Ok(id));
            assert!(!id.describe().is_empty());
            assert!(!id.construct().checks.is_empty());
        }
        assert!("sqli".parse::<ModuleId>().is_err());
    }

    #[test]
    fn test_catalogue_tags() {
        let tags = |id: ModuleId| -> Vec<&'static str> {
            id.construct().checks.iter().map(|c| c.tag).collect()
        };
        assert_eq!(
            tags(ModuleId::SqlInjection),
            vec!["error_based_sqli", "boolean_based_sqli", "time_based_sqli"]
        );
        assert_eq!(
            tags(ModuleId::Xss),
            vec!["reflected_xss", "stored_xss", "dom_based_xss"]
        );
        assert_eq!(tags(ModuleId::NosqlInjection), vec!["simple_nosql", "advanced_nosql"]);
        assert_eq!(
            tags(ModuleId::Rce),
            vec!["rce_command_injection", "rce_code_injection"]
        );
    }

    #[test]
    fn test_rce_checks_fill_every_free_text_field() {
        let module = ModuleId::Rce.construct();
        assert_eq!(module.checks.len(), 2);
        assert!(module.checks.iter().all(|c| c.fill == FillPolicy::FreeText));
    }

    #[test]
    fn test_required_payloads() {
        assert_eq!(
            ModuleId::SqlInjection.construct().required_payloads(),
            vec![PayloadKind::Sql, PayloadKind::SqlBlind]
        );
        assert!(ModuleId::Idor.construct().required_payloads().is_empty());
        assert!(ModuleId::DirectoryTraversal.construct().required_payloads().is_empty());
    }

    #[test]
    fn test_timing_thresholds() {
        let threshold = |id: ModuleId| {
            id.construct()
                .checks
                .iter()
                .find_map(|c| match c.strategy {
                    Strategy::Timing(t) => Some(t),
                    _ => None,
                })
        };
        assert_eq!(threshold(ModuleId::SqlInjection), Some(Duration::from_secs(5)));
        assert_eq!(threshold(ModuleId::NosqlInjection), Some(Duration::from_secs(2)));
    }
}
