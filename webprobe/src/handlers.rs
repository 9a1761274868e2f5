use crate::report::{ReportFormat, ReportMeta, render_report, save_report};
use anyhow::{Context, Result};
use clap::ArgMatches;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;
use webprobe_core::{
    ModuleId, PayloadBook, PayloadKind, ScanCallback, ScanConfig, ScanEvent, Scanner,
};
use webprobe_scanner::{Cancellation, ConfigError, HttpTransport, Transport};

/// Exit status for configuration problems detected before any traffic.
pub const EXIT_CONFIG: i32 = 2;
/// Exit status for a scan that started but could not finish.
pub const EXIT_FAILURE: i32 = 1;

const DEFAULT_PAYLOADS: [(PayloadKind, &str); 6] = [
    (PayloadKind::Sql, include_str!("../payloads/sql.txt")),
    (PayloadKind::SqlBlind, include_str!("../payloads/sql_blind.txt")),
    (PayloadKind::Xss, include_str!("../payloads/xss.txt")),
    (PayloadKind::NoSql, include_str!("../payloads/nosql.txt")),
    (PayloadKind::NoSqlBlind, include_str!("../payloads/nosql_blind.txt")),
    (PayloadKind::Rce, include_str!("../payloads/rce.txt")),
];

/// Payload sets compiled into the binary.
pub fn embedded_payloads() -> PayloadBook {
    let mut book = PayloadBook::new();
    for (kind, text) in DEFAULT_PAYLOADS {
        book.insert_text(kind, text);
    }
    book
}

/// Load `<set>.txt` files from `dir`. Sets without a file are left out, so a
/// module that needs one fails with [`ConfigError::MissingPayloads`] when the
/// scanner is built.
pub fn load_payload_dir(dir: &Path) -> Result<PayloadBook, ConfigError> {
    if !dir.is_dir() {
        return Err(ConfigError::MissingPayloads(dir.display().to_string()));
    }
    let mut book = PayloadBook::new();
    for kind in PayloadKind::ALL {
        let path = dir.join(kind.file_name());
        if !path.exists() {
            debug!(path = %path.display(), "no payload file");
            continue;
        }
        let text = fs::read_to_string(&path).map_err(|source| ConfigError::UnreadablePayloads {
            name: path.display().to_string(),
            source,
        })?;
        book.insert_text(kind, &text);
    }
    Ok(book)
}

/// Expand `~` in user-supplied paths.
pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

/// clap value parser for non-negative second counts such as `0.5`.
pub fn parse_seconds(raw: &str) -> Result<Duration, String> {
    let secs: f64 = raw
        .parse()
        .map_err(|_| format!("'{}' is not a number of seconds", raw))?;
    Duration::try_from_secs_f64(secs).map_err(|e| format!("'{}': {}", raw, e))
}

/// Translate `scan` arguments into core configuration.
pub fn build_config(args: &ArgMatches) -> ScanConfig {
    let text = |id: &str| args.get_one::<String>(id).cloned();
    let threads = args.get_one::<usize>("threads").copied().unwrap_or(4);
    let defaults = ScanConfig::default();

    ScanConfig {
        start_url: text("URL").unwrap_or_default(),
        max_depth: args.get_one::<usize>("depth").copied().unwrap_or(defaults.max_depth),
        scope_pattern: text("scope"),
        exclude_pattern: text("exclude"),
        request_delay: args
            .get_one::<Duration>("delay")
            .copied()
            .unwrap_or(defaults.request_delay),
        request_timeout: args
            .get_one::<Duration>("timeout")
            .copied()
            .unwrap_or(defaults.request_timeout),
        user_agent: text("user-agent"),
        module_names: text("modules").unwrap_or(defaults.module_names),
        crawl_workers: threads,
        probe_workers: threads,
        verify_url: text("verify-url"),
        length_threshold: args
            .get_one::<usize>("length-threshold")
            .copied()
            .unwrap_or(defaults.length_threshold),
        timing_baseline: args.get_flag("timing-baseline"),
        access_markers: defaults.access_markers,
    }
}

/// Built-in payloads unless `--payloads` names a directory.
pub fn payloads_from_args(args: &ArgMatches) -> Result<PayloadBook, ConfigError> {
    match args.get_one::<String>("payloads") {
        Some(dir) => load_payload_dir(&expand_path(dir)),
        None => Ok(embedded_payloads()),
    }
}

/// Exit status for a failed run: configuration errors are distinguished from
/// everything else.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<ConfigError>().is_some() {
        EXIT_CONFIG
    } else {
        EXIT_FAILURE
    }
}

fn divider() -> String {
    "═".repeat(60).bright_blue().bold().to_string()
}

fn spinner(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        spinner.set_style(style);
    }
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

fn short_path(url: &str) -> String {
    Url::parse(url)
        .map(|u| match u.query() {
            Some(q) => format!("{}?{}", u.path(), q),
            None => u.path().to_string(),
        })
        .unwrap_or_else(|_| url.to_string())
}

fn progress_callback(bar: ProgressBar) -> ScanCallback {
    Arc::new(move |event: ScanEvent| match event {
        ScanEvent::Fetching { depth, url } => {
            bar.set_message(format!("crawling [depth {}] {}", depth, short_path(&url)));
        }
        ScanEvent::CrawlFinished { urls, forms } => {
            bar.println(format!(
                "{} Crawl complete: {} URLs, {} forms",
                "✓".green().bold(),
                urls,
                forms
            ));
        }
        ScanEvent::ModuleStarted(id) => {
            bar.set_message(format!("running {}", id));
        }
        ScanEvent::ModuleFinished { module, findings } => {
            let mark = if findings > 0 {
                "!".red().bold()
            } else {
                "✓".green().bold()
            };
            bar.println(format!("{} {}: {} finding(s)", mark, module, findings));
        }
    })
}

/// Run a full scan from `scan` arguments and emit the report.
pub async fn run_scan(args: &ArgMatches, quiet: bool) -> Result<()> {
    let config = build_config(args);
    let payloads = payloads_from_args(args)?;
    let validated = config.validate()?;

    for name in &validated.unknown_modules {
        eprintln!("{} Unknown module '{}' skipped", "⚠".yellow().bold(), name);
    }
    if validated.modules.is_empty() {
        eprintln!("{} No modules selected, crawling only", "⚠".yellow().bold());
    }

    let target = validated.start.to_string();
    let module_names: Vec<String> = validated.modules.iter().map(|m| m.to_string()).collect();
    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(&validated.transport)?);

    // Progress goes to stderr; stdout carries only the report.
    if !quiet {
        eprintln!("{}", divider());
        eprintln!("{} {}", "  Target:".bright_white().bold(), target);
        eprintln!("{} {}", "  Depth:".bright_white().bold(), validated.max_depth);
        eprintln!(
            "{} {}",
            "  Modules:".bright_white().bold(),
            if module_names.is_empty() { "-".to_string() } else { module_names.join(", ") }
        );
        eprintln!("{}", divider());
    }

    let cancellation = Cancellation::new();
    let bar = spinner(quiet);
    let scanner = Scanner::new(validated, payloads, transport)?
        .with_cancellation(cancellation.clone())
        .with_callback(progress_callback(bar.clone()));

    let on_interrupt = cancellation.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing current probes");
            on_interrupt.cancel();
        }
    });

    let outcome = scanner.run().await;
    interrupt.abort();
    bar.finish_and_clear();
    let outcome = outcome.context("scan failed")?;

    info!(
        findings = outcome.findings.len(),
        cancelled = outcome.cancelled,
        "scan finished"
    );
    if outcome.cancelled && !quiet {
        eprintln!("{} Scan cancelled, reporting partial results", "⚠".yellow().bold());
    }

    let format = args
        .get_one::<String>("format")
        .map(|f| f.parse::<ReportFormat>())
        .transpose()
        .map_err(anyhow::Error::msg)?
        .unwrap_or(ReportFormat::Text);
    let meta = ReportMeta::from_outcome(&target, module_names, &outcome);

    match args.get_one::<String>("output") {
        Some(raw) => {
            let path = expand_path(raw);
            let report = render_report(format, &meta, &outcome.findings, false)?;
            save_report(&report, &path)
                .with_context(|| format!("failed to write report to {}", path.display()))?;
            if !quiet {
                eprintln!(
                    "{} {} report saved to {}",
                    "✓".green().bold(),
                    format,
                    path.display().to_string().bright_white()
                );
            }
        }
        None => {
            let color = format == ReportFormat::Text && io::IsTerminal::is_terminal(&io::stdout());
            print!("{}", render_report(format, &meta, &outcome.findings, color)?);
        }
    }
    Ok(())
}

pub async fn handle_scan(args: &ArgMatches, quiet: bool) {
    if let Err(err) = run_scan(args, quiet).await {
        eprintln!("{} {:#}", "✗".red().bold(), err);
        std::process::exit(exit_code(&err));
    }
}

pub fn handle_modules() {
    println!("{}", divider());
    println!("{}", "  AVAILABLE MODULES".bright_white().bold());
    println!("{}", divider());
    for id in ModuleId::ALL {
        println!("  {:<22} {}", id.as_str().cyan().bold(), id.describe());
    }
    println!();
    println!("Select with --modules <id,id,...> or --modules all (default).");
}
