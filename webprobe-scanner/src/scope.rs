use crate::error::ConfigError;
use crate::resource::Resource;
use regex::Regex;

/// Decides whether a discovered resource belongs to the crawl target surface.
///
/// A resource is in scope when its host and port equal the start URL's, the
/// optional scope pattern matches it and the optional exclude pattern does
/// not. Patterns are searched anywhere in the full URL string.
#[derive(Debug, Clone)]
pub struct Scope {
    host: String,
    port: Option<u16>,
    include: Option<Regex>,
    exclude: Option<Regex>,
}

impl Scope {
    pub fn new(
        start: &Resource,
        scope_pattern: Option<&str>,
        exclude_pattern: Option<&str>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            host: start.host().to_ascii_lowercase(),
            port: start.port(),
            include: compile("scope", scope_pattern)?,
            exclude: compile("exclude", exclude_pattern)?,
        })
    }

    /// Scope that only checks the origin.
    pub fn origin(start: &Resource) -> Self {
        Self {
            host: start.host().to_ascii_lowercase(),
            port: start.port(),
            include: None,
            exclude: None,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn same_origin(&self, resource: &Resource) -> bool {
        resource.host().eq_ignore_ascii_case(&self.host) && resource.port() == self.port
    }

    pub fn allows(&self, resource: &Resource) -> bool {
        if !self.same_origin(resource) {
            return false;
        }
        let url = resource.as_str();
        if let Some(include) = &self.include
            && !include.is_match(url)
        {
            return false;
        }
        if let Some(exclude) = &self.exclude
            && exclude.is_match(url)
        {
            return false;
        }
        true
    }
}

fn compile(which: &'static str, pattern: Option<&str>) -> Result<Option<Regex>, ConfigError> {
    match pattern.filter(|p| !p.is_empty()) {
        None => Ok(None),
        Some(p) => Regex::new(p)
            .map(Some)
            .map_err(|source| ConfigError::InvalidPattern {
                which,
                pattern: p.to_string(),
                source,
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn res(s: &str) -> Resource {
        Resource::parse(s).unwrap()
    }

    #[test]
    fn test_other_host_is_never_in_scope() {
        let start = res("http://example.com/");
        let configs = [
            (None, None),
            (Some(".*"), None),
            (Some("evil"), None),
            (None, Some("nothing-matches-this")),
        ];
        for (include, exclude) in configs {
            let scope = Scope::new(&start, include, exclude).unwrap();
            assert!(!scope.allows(&res("http://evil.com/")));
            assert!(!scope.allows(&res("http://sub.example.com/")));
        }
    }

    #[test]
    fn test_port_is_part_of_origin() {
        let scope = Scope::origin(&res("http://example.com:8080/"));
        assert!(scope.allows(&res("http://example.com:8080/a")));
        assert!(!scope.allows(&res("http://example.com/a")));
    }

    #[test]
    fn test_scope_and_exclude_patterns() {
        let start = res("http://example.com/app/");
        let scope = Scope::new(&start, Some("/app/"), Some(r"logout|\.pdf$")).unwrap();
        assert!(scope.allows(&res("http://example.com/app/list?id=2")));
        assert!(!scope.allows(&res("http://example.com/blog/")));
        assert!(!scope.allows(&res("http://example.com/app/logout")));
        assert!(!scope.allows(&res("http://example.com/app/manual.pdf")));
    }

    #[test]
    fn test_patterns_are_case_sensitive() {
        let start = res("http://example.com/");
        let scope = Scope::new(&start, Some("APP"), None).unwrap();
        assert!(!scope.allows(&res("http://example.com/app/x")));
        assert!(scope.allows(&res("http://example.com/APP/x")));
        let scope = Scope::new(&start, Some("(?i)APP"), None).unwrap();
        assert!(scope.allows(&res("http://example.com/app/x")));
    }

    #[test]
    fn test_bad_pattern_is_a_config_error() {
        let start = res("http://example.com/");
        let err = Scope::new(&start, Some("("), None).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { which: "scope", .. }));
        let err = Scope::new(&start, None, Some("[")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { which: "exclude", .. }));
    }
}
