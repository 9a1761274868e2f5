use crate::config::ValidatedConfig;
use crate::context::ScanContext;
use crate::finding::Finding;
use crate::module::ModuleId;
use crate::payload::PayloadBook;
use std::sync::Arc;
use tracing::{info, warn};
use webprobe_scanner::{
    Cancellation, ConfigError, CrawlOutput, Crawler, ProgressCallback, Result, Transport,
};

/// Resolve a module list into registry ids. `all` expands in registry
/// order; anything else keeps the requested order with duplicates dropped.
/// Unrecognised names are returned separately.
pub fn resolve_modules(names: &str) -> (Vec<ModuleId>, Vec<String>) {
    if names.trim().eq_ignore_ascii_case("all") {
        return (ModuleId::ALL.to_vec(), Vec::new());
    }
    let mut modules = Vec::new();
    let mut unknown = Vec::new();
    for name in names.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        match name.parse::<ModuleId>() {
            Ok(id) if !modules.contains(&id) => modules.push(id),
            Ok(_) => {}
            Err(_) if !unknown.iter().any(|u| u == name) => unknown.push(name.to_string()),
            Err(_) => {}
        }
    }
    (modules, unknown)
}

/// Progress notifications for the CLI spinner.
#[derive(Debug, Clone)]
pub enum ScanEvent {
    Fetching { depth: usize, url: String },
    CrawlFinished { urls: usize, forms: usize },
    ModuleStarted(ModuleId),
    ModuleFinished { module: ModuleId, findings: usize },
}

pub type ScanCallback = Arc<dyn Fn(ScanEvent) + Send + Sync>;

#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    pub crawl: CrawlOutput,
    pub findings: Vec<Finding>,
    pub cancelled: bool,
}

/// Crawl, then run every resolved module over the crawl output.
pub struct Scanner {
    config: ValidatedConfig,
    ctx: ScanContext,
    callback: Option<ScanCallback>,
}

impl Scanner {
    /// Fails before any traffic when a resolved module needs a payload set
    /// the book does not have.
    pub fn new(
        config: ValidatedConfig,
        payloads: PayloadBook,
        transport: Arc<dyn Transport>,
    ) -> std::result::Result<Self, ConfigError> {
        for id in &config.modules {
            for kind in id.construct().required_payloads() {
                let set = payloads.require(kind)?;
                if set.is_empty() {
                    warn!(module = %id, payloads = %kind, "payload set is empty");
                }
            }
        }

        let ctx = ScanContext::new(
            transport,
            config.origin_host.clone(),
            config.policy.clone(),
            payloads,
        )?
        .with_workers(config.probe_workers);

        Ok(Self {
            config,
            ctx,
            callback: None,
        })
    }

    pub fn with_cancellation(mut self, cancellation: Cancellation) -> Self {
        self.ctx.cancellation = cancellation;
        self
    }

    pub fn with_callback(mut self, callback: ScanCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn modules(&self) -> &[ModuleId] {
        &self.config.modules
    }

    fn emit(&self, event: ScanEvent) {
        if let Some(ref callback) = self.callback {
            callback(event);
        }
    }

    pub async fn crawl(&self) -> Result<CrawlOutput> {
        let mut crawler = Crawler::new(self.ctx.transport.clone(), self.config.scope.clone())
            .with_max_depth(self.config.max_depth)
            .with_workers(self.config.crawl_workers)
            .with_cancellation(self.ctx.cancellation.clone());

        if let Some(callback) = self.callback.clone() {
            let progress: ProgressCallback = Arc::new(move |depth, url| {
                callback(ScanEvent::Fetching { depth, url });
            });
            crawler = crawler.with_progress_callback(progress);
        }

        let output = crawler.crawl(&self.config.start).await?;
        self.emit(ScanEvent::CrawlFinished {
            urls: output.visited.len(),
            forms: output.forms.len(),
        });
        Ok(output)
    }

    /// Findings module by module in resolved order; within a module URL
    /// findings precede form findings.
    pub async fn run_modules(&self, crawl: &CrawlOutput) -> Vec<Finding> {
        let mut findings = Vec::new();
        for id in &self.config.modules {
            if self.ctx.is_cancelled() {
                info!("scan cancelled");
                break;
            }
            self.emit(ScanEvent::ModuleStarted(*id));
            info!(module = %id, "running module");

            let module = id.construct();
            let mut found = module.scan_urls(&self.ctx, &crawl.visited).await;
            found.extend(module.scan_forms(&self.ctx, &crawl.forms).await);

            info!(module = %id, findings = found.len(), "module finished");
            self.emit(ScanEvent::ModuleFinished {
                module: *id,
                findings: found.len(),
            });
            findings.extend(found);
        }
        findings
    }

    pub async fn run(&self) -> Result<ScanOutcome> {
        let crawl = self.crawl().await?;
        info!(urls = crawl.visited.len(), forms = crawl.forms.len(), "crawl finished");
        let findings = self.run_modules(&crawl).await;
        Ok(ScanOutcome {
            cancelled: crawl.cancelled || self.ctx.is_cancelled(),
            crawl,
            findings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_expands_in_registry_order() {
        let (modules, unknown) = resolve_modules("all");
        assert_eq!(modules, ModuleId::ALL.to_vec());
        assert!(unknown.is_empty());
    }

    #[test]
    fn test_explicit_list_keeps_requested_order() {
        let (modules, unknown) = resolve_modules(" idor, xss ,sql_injection,xss,, nope,nope");
        assert_eq!(
            modules,
            vec![ModuleId::Idor, ModuleId::Xss, ModuleId::SqlInjection]
        );
        assert_eq!(unknown, vec!["nope".to_string()]);
    }

    #[test]
    fn test_empty_list_resolves_to_nothing() {
        let (modules, unknown) = resolve_modules("");
        assert!(modules.is_empty());
        assert!(unknown.is_empty());
    }
}
