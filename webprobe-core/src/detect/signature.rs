use crate::context::ScanContext;
use crate::finding::{Evidence, Finding};
use crate::injection::InjectionPoint;
use crate::module::Check;
use regex::{Regex, RegexBuilder};
use tracing::info;
use webprobe_scanner::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureClass {
    Sql,
    NoSql,
    Command,
    FileDisclosure,
    Ssrf,
}

impl SignatureClass {
    pub const ALL: [SignatureClass; 5] = [
        SignatureClass::Sql,
        SignatureClass::NoSql,
        SignatureClass::Command,
        SignatureClass::FileDisclosure,
        SignatureClass::Ssrf,
    ];

    /// Regex alternatives for the class. Literal markers are escaped when
    /// compiled.
    fn patterns(&self) -> Patterns {
        match self {
            SignatureClass::Sql => Patterns::Regex(&[
                r"you have an error in your sql syntax",
                r"sql syntax.*?error",
                r"warning(?:</b>)?:\s*mysql",
                r"unclosed quotation mark after the character string",
                r"quoted string not properly terminated",
                r"microsoft oledb provider for odbc drivers error",
                r"syntax error.*sqlite",
                r"database error",
                r"db error",
                r"sqlstate",
                r"sqlite3::exception",
                r"fatal error",
                r"pg::syntaxerror",
            ]),
            SignatureClass::NoSql => Patterns::Literal(&[
                "MongoError",
                "mongodb",
                "NoSQL error",
                "cannot parse query",
                "bad query",
                "E11000 duplicate key",
                "Command failed",
            ]),
            SignatureClass::Command => Patterns::Literal(&[
                "uid=0(",
                "root:x:0:0",
                "Windows IP Configuration",
                "sh: 1:",
                "cannot execute",
                "command not found",
                "Authorization: Basic",
            ]),
            SignatureClass::FileDisclosure => {
                Patterns::Literal(&["root:x:0:0", "[boot loader]", "[extensions]", "root::"])
            }
            SignatureClass::Ssrf => Patterns::Literal(&[
                "root:x:0:0",
                "METADATA-EC2",
                "EC2 IAM Credentials",
                "Host: 127.0.0.1",
            ]),
        }
    }
}

enum Patterns {
    Regex(&'static [&'static str]),
    Literal(&'static [&'static str]),
}

/// Case-insensitive matchers, one per class, compiled once per scan.
#[derive(Debug, Clone)]
pub struct SignatureLibrary {
    matchers: Vec<(SignatureClass, Regex)>,
}

impl SignatureLibrary {
    pub fn new() -> Result<Self, ConfigError> {
        let mut matchers = Vec::with_capacity(SignatureClass::ALL.len());
        for class in SignatureClass::ALL {
            let joined = match class.patterns() {
                Patterns::Regex(list) => list.join("|"),
                Patterns::Literal(list) => list
                    .iter()
                    .map(|m| regex::escape(m))
                    .collect::<Vec<_>>()
                    .join("|"),
            };
            let regex = RegexBuilder::new(&joined)
                .case_insensitive(true)
                .build()
                .map_err(|source| ConfigError::InvalidPattern {
                    which: "signature",
                    pattern: joined.clone(),
                    source,
                })?;
            matchers.push((class, regex));
        }
        Ok(Self { matchers })
    }

    /// First signature of `class` found in `body`.
    pub fn find<'a>(&self, class: SignatureClass, body: &'a str) -> Option<&'a str> {
        if body.is_empty() {
            return None;
        }
        self.matchers
            .iter()
            .find(|(c, _)| *c == class)
            .and_then(|(_, regex)| regex.find(body))
            .map(|m| m.as_str())
    }
}

pub async fn probe(
    ctx: &ScanContext,
    check: &Check,
    class: SignatureClass,
    point: &InjectionPoint,
    payloads: &[String],
) -> Vec<Finding> {
    let mut findings = Vec::new();
    for payload in payloads {
        if ctx.is_cancelled() {
            break;
        }
        let request = point.mutate(payload);
        let Some(response) = ctx.send(&request).await else {
            continue;
        };
        if let Some(matched) = ctx.signatures.find(class, &response.body) {
            info!(
                module = check.tag,
                target = %point.target(),
                param = %point.name,
                "signature matched"
            );
            findings.push(check.finding(point, payload, request).with_evidence(Evidence {
                matched: Some(matched.to_string()),
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
    fn test_sql_error_matches_case_insensitively() {
        let lib = SignatureLibrary::new().unwrap();
        for body in [
            "You have an error in your SQL syntax near ''' at line 1",
            "YOU HAVE AN ERROR IN YOUR SQL SYNTAX",
            "<b>Warning</b>:  mysql_fetch_array()",
            "Warning: mysql_num_rows() expects parameter 1",
        ] {
            assert!(lib.find(SignatureClass::Sql, body).is_some(), "{}", body);
        }
        assert!(lib.find(SignatureClass::Sql, "<h1>Welcome back</h1>").is_none());
        assert!(lib.find(SignatureClass::Sql, "").is_none());
    }

    #[test]
    fn test_literal_markers_are_escaped() {
        let lib = SignatureLibrary::new().unwrap();
        assert!(lib.find(SignatureClass::FileDisclosure, "; for 16-bit app support\n[extensions]").is_some());
        // `[boot loader]` must not behave like a character class.
        assert!(lib.find(SignatureClass::FileDisclosure, "b").is_none());
        assert!(lib.find(SignatureClass::Command, "uid=0(root) gid=0(root)").is_some());
        assert!(lib.find(SignatureClass::NoSql, "E11000 DUPLICATE KEY error").is_some());
    }

    #[test]
    fn test_classes_do_not_bleed() {
        let lib = SignatureLibrary::new().unwrap();
        assert!(lib.find(SignatureClass::Ssrf, "sqlstate[42000]").is_none());
        assert!(lib.find(SignatureClass::Ssrf, "ami-id\nMETADATA-EC2").is_some());
    }
}
