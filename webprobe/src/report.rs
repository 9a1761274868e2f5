// Report rendering for scan findings

use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use webprobe_core::{Finding, ScanOutcome, Severity};

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";
const CSV_HEADER: &str = "module,target,method,param,payload,details";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Json,
    Csv,
    Html,
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            "csv" => Ok(ReportFormat::Csv),
            "html" => Ok(ReportFormat::Html),
            other => Err(format!("unknown report format '{}'", other)),
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReportFormat::Text => "text",
            ReportFormat::Json => "json",
            ReportFormat::Csv => "csv",
            ReportFormat::Html => "html",
        })
    }
}

/// Scan-level facts printed above the findings.
#[derive(Debug, Clone)]
pub struct ReportMeta {
    pub target: String,
    pub modules: Vec<String>,
    pub pages: usize,
    pub forms: usize,
    pub crawl_errors: usize,
    pub cancelled: bool,
    pub generated_at: DateTime<Utc>,
}

impl ReportMeta {
    pub fn from_outcome(target: &str, modules: Vec<String>, outcome: &ScanOutcome) -> Self {
        Self {
            target: target.to_string(),
            modules,
            pages: outcome.crawl.visited.len(),
            forms: outcome.crawl.forms.len(),
            crawl_errors: outcome
                .crawl
                .pages
                .iter()
                .filter(|p| p.error.is_some())
                .count(),
            cancelled: outcome.cancelled,
            generated_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub info: usize,
}

impl SeverityCounts {
    pub fn tally(findings: &[Finding]) -> Self {
        let mut counts = Self::default();
        for finding in findings {
            match finding.severity {
                Severity::Critical => counts.critical += 1,
                Severity::High => counts.high += 1,
                Severity::Medium => counts.medium += 1,
                Severity::Low => counts.low += 1,
                Severity::Info => counts.info += 1,
            }
        }
        counts
    }
}

/// Render `findings` in `format`. `color` only affects the text format.
pub fn render_report(
    format: ReportFormat,
    meta: &ReportMeta,
    findings: &[Finding],
    color: bool,
) -> Result<String, serde_json::Error> {
    match format {
        ReportFormat::Text => Ok(generate_text_report(meta, findings, color)),
        ReportFormat::Json => generate_json_report(meta, findings),
        ReportFormat::Csv => Ok(generate_csv_report(findings)),
        ReportFormat::Html => Ok(generate_html_report(meta, findings)),
    }
}

fn paint(text: &str, color: bool, style: fn(&str) -> colored::ColoredString) -> String {
    if color {
        style(text).to_string()
    } else {
        text.to_string()
    }
}

fn severity_label(severity: Severity, color: bool) -> String {
    let label = format!("[{}]", severity.as_str().to_uppercase());
    if !color {
        return label;
    }
    match severity {
        Severity::Critical => label.bright_red().bold().to_string(),
        Severity::High => label.red().bold().to_string(),
        Severity::Medium => label.yellow().bold().to_string(),
        Severity::Low => label.blue().to_string(),
        Severity::Info => label.white().to_string(),
    }
}

pub fn generate_text_report(meta: &ReportMeta, findings: &[Finding], color: bool) -> String {
    let mut report = String::new();

    report.push_str(&paint(RULE, color, |s| s.bright_blue().bold()));
    report.push('\n');
    report.push_str("                        WEBPROBE VULNERABILITY SCAN REPORT\n");
    report.push_str(&paint(RULE, color, |s| s.bright_blue().bold()));
    report.push_str("\n\n");

    report.push_str(&format!("Target:       {}\n", meta.target));
    report.push_str(&format!(
        "Scan Date:    {}\n",
        meta.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    report.push_str(&format!("Modules:      {}\n", meta.modules.join(", ")));
    report.push_str(&format!("Pages Found:  {}\n", meta.pages));
    report.push_str(&format!("Forms Found:  {}\n", meta.forms));
    if meta.crawl_errors > 0 {
        report.push_str(&format!("Fetch Errors: {}\n", meta.crawl_errors));
    }
    if meta.cancelled {
        report.push_str(&format!(
            "{}\n",
            paint("Scan was cancelled; results are partial.", color, |s| s.yellow())
        ));
    }
    report.push('\n');

    if findings.is_empty() {
        report.push_str(&paint("No vulnerabilities found.", color, |s| s.green().bold()));
        report.push('\n');
        return report;
    }

    let counts = SeverityCounts::tally(findings);
    report.push_str(&format!("Total Findings: {}\n", findings.len()));
    for (severity, count) in [
        (Severity::Critical, counts.critical),
        (Severity::High, counts.high),
        (Severity::Medium, counts.medium),
        (Severity::Low, counts.low),
        (Severity::Info, counts.info),
    ] {
        if count > 0 {
            report.push_str(&format!("  {:<12} {}\n", severity_label(severity, color), count));
        }
    }
    report.push('\n');

    report.push_str(&paint(RULE, color, |s| s.bright_blue().bold()));
    report.push_str("\nDETAILED FINDINGS\n");
    report.push_str(&paint(RULE, color, |s| s.bright_blue().bold()));
    report.push_str("\n\n");

    for (idx, finding) in findings.iter().enumerate() {
        report.push_str(&format!(
            "{}) {} {}\n",
            idx + 1,
            severity_label(finding.severity, color),
            paint(&finding.module.to_uppercase(), color, |s| s.bright_white().bold())
        ));
        report.push_str(&format!("   Target:   {}\n", finding.target));
        report.push_str(&format!("   Request:  {} {}\n", finding.request.method, finding.request.url));
        if let Some(ref param) = finding.param {
            report.push_str(&format!("   Param:    {}\n", param));
        }
        if !finding.payload.is_empty() {
            report.push_str(&format!("   Payload:  {}\n", finding.payload));
        }
        if let Some(ref cwe) = finding.cwe_id {
            report.push_str(&format!("   CWE:      {}\n", cwe));
        }
        let details = finding.details();
        if !details.is_empty() {
            report.push_str(&format!("   Details:  {}\n", details));
        }
        report.push('\n');
    }

    report.push_str("For authorized security testing only.\n");
    report
}

pub fn generate_json_report(
    meta: &ReportMeta,
    findings: &[Finding],
) -> Result<String, serde_json::Error> {
    let counts = SeverityCounts::tally(findings);
    let findings: Vec<serde_json::Value> = findings
        .iter()
        .map(|f| serde_json::Value::Object(f.to_mapping()))
        .collect();

    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "webprobe",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": meta.generated_at.to_rfc3339(),
                "format": "json",
                "disclaimer": "For authorized security testing only"
            },
            "scan": {
                "target": meta.target,
                "modules": meta.modules,
                "pages": meta.pages,
                "forms": meta.forms,
                "crawl_errors": meta.crawl_errors,
                "cancelled": meta.cancelled
            },
            "summary": {
                "total_findings": findings.len(),
                "severity_breakdown": counts
            },
            "findings": findings
        }
    });

    serde_json::to_string_pretty(&json_report)
}

/// Quote a CSV field when it contains a separator, quote or newline.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub fn generate_csv_report(findings: &[Finding]) -> String {
    let mut report = String::from(CSV_HEADER);
    report.push('\n');
    for finding in findings {
        let details = finding.details();
        let row = [
            finding.module.as_str(),
            finding.target.as_str(),
            finding.request.method.as_str(),
            finding.param.as_deref().unwrap_or(""),
            finding.payload.as_str(),
            details.as_str(),
        ]
        .iter()
        .map(|v| csv_field(v))
        .collect::<Vec<_>>()
        .join(",");
        report.push_str(&row);
        report.push('\n');
    }
    report
}

pub fn html_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn generate_html_report(meta: &ReportMeta, findings: &[Finding]) -> String {
    let mut report = String::new();
    report.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\"/>\n");
    report.push_str("<title>webprobe report</title>\n");
    report.push_str(
        "<style>body{font-family:sans-serif}table{border-collapse:collapse}\
         td,th{border:1px solid #999;padding:4px 8px;text-align:left}\
         .critical,.high{color:#b00}.medium{color:#b60}</style>\n",
    );
    report.push_str("</head>\n<body>\n");
    report.push_str("<h1>Vulnerability Report</h1>\n");
    report.push_str(&format!(
        "<p>Target: {}<br/>Generated: {}<br/>Pages: {} &middot; Forms: {}</p>\n",
        html_escape(&meta.target),
        meta.generated_at.to_rfc3339(),
        meta.pages,
        meta.forms
    ));
    if meta.cancelled {
        report.push_str("<p><strong>Scan was cancelled; results are partial.</strong></p>\n");
    }

    if findings.is_empty() {
        report.push_str("<p>No vulnerabilities found.</p>\n</body>\n</html>\n");
        return report;
    }

    report.push_str("<table>\n");
    report.push_str(
        "<tr><th>#</th><th>Module</th><th>Severity</th><th>Target</th><th>Method</th>\
         <th>Param</th><th>Payload</th><th>Details</th></tr>\n",
    );
    for (idx, finding) in findings.iter().enumerate() {
        let severity = finding.severity.as_str();
        report.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td class=\"{}\">{}</td><td>{}</td><td>{}</td>\
             <td>{}</td><td><code>{}</code></td><td>{}</td></tr>\n",
            idx + 1,
            html_escape(&finding.module),
            severity,
            severity,
            html_escape(&finding.target),
            finding.request.method,
            html_escape(finding.param.as_deref().unwrap_or("")),
            html_escape(&finding.payload),
            html_escape(&finding.details()),
        ));
    }
    report.push_str("</table>\n</body>\n</html>\n");
    report
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parsing() {
        assert_eq!("JSON".parse::<ReportFormat>(), Ok(ReportFormat::Json));
        assert_eq!("txt".parse::<ReportFormat>(), Ok(ReportFormat::Text));
        assert!("markdown".parse::<ReportFormat>().is_err());
    }

    #[test]
    fn test_csv_quoting() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("' OR '1'='1"), "' OR '1'='1");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(
            html_escape("<script>alert('x')</script>&"),
            "&lt;script&gt;alert(&#x27;x&#x27;)&lt;/script&gt;&amp;"
        );
    }
}
