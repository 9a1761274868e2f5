use crate::context::ScanContext;
use crate::finding::{Evidence, Finding};
use crate::injection::form_request;
use crate::module::Check;
use crate::payload::{default_credentials, weak_passwords};
use tracing::info;
use webprobe_scanner::{FormDescriptor, Method};

const USER_FIELDS: &[&str] = &["username", "user", "login", "email"];
const PASS_FIELDS: &[&str] = &["password", "pass", "passwd", "pwd"];
const FAILURE_MARKERS: &[&str] = &["invalid", "wrong password", "authentication failed"];
const SUCCESS_MARKERS: &[&str] = &["welcome", "logout", "profile"];

/// Names of the (user, password) fields of a POST login form.
pub fn login_fields(form: &FormDescriptor) -> Option<(String, String)> {
    if form.method != Method::Post {
        return None;
    }
    let find = |names: &[&str]| {
        form.fields
            .iter()
            .find(|f| names.contains(&f.name.to_ascii_lowercase().as_str()))
            .map(|f| f.name.clone())
    };
    Some((find(USER_FIELDS)?, find(PASS_FIELDS)?))
}

pub fn login_succeeded(body: &str) -> bool {
    let lower = body.to_lowercase();
    if FAILURE_MARKERS.iter().any(|m| lower.contains(m)) {
        return false;
    }
    SUCCESS_MARKERS.iter().any(|m| lower.contains(m))
}

/// Default pairs first, then weak passwords for a pre-filled username.
pub async fn guess(ctx: &ScanContext, check: &Check, form: &FormDescriptor) -> Vec<Finding> {
    let mut findings = Vec::new();
    let Some((user_field, pass_field)) = login_fields(form) else {
        return findings;
    };

    let mut attempts: Vec<(String, String, &str)> = default_credentials()
        .into_iter()
        .map(|(u, p)| (u, p, "default credentials accepted"))
        .collect();
    if let Some(known) = form
        .field(&user_field)
        .map(|f| f.value.clone())
        .filter(|v| !v.is_empty())
    {
        attempts.extend(
            weak_passwords()
                .into_iter()
                .map(|p| (known.clone(), p, "weak password accepted")),
        );
    }

    for (username, password, issue) in attempts {
        if ctx.is_cancelled() {
            break;
        }
        let fields = form
            .fields
            .iter()
            .map(|f| {
                let value = if f.name == user_field {
                    username.clone()
                } else if f.name == pass_field {
                    password.clone()
                } else {
                    f.value.clone()
                };
                (f.name.clone(), value)
            })
            .collect();
        let request = form_request(form, fields);
        let Some(response) = ctx.send(&request).await else {
            continue;
        };
        if login_succeeded(&response.body) {
            info!(module = check.tag, action = %form.action, username = %username, "login succeeded");
            findings.push(
                check
                    .form_finding(form, format!("{}:{}", username, password), request)
                    .with_param(pass_field.clone())
                    .with_evidence(Evidence {
                        username: Some(username),
                        password: Some(password),
                        issue: Some(issue.to_string()),
                        ..Evidence::default()
                    }),
            );
        }
    }
    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use webprobe_scanner::{FieldDescriptor, Resource};

    #[test]
    fn test_login_fields() {
        let form = FormDescriptor::new(
            Method::Post,
            Resource::parse("http://example.com/login").unwrap(),
        )
        .with_field(FieldDescriptor::new("Email", "email", ""))
        .with_field(FieldDescriptor::new("pwd", "password", ""));
        assert_eq!(
            login_fields(&form),
            Some(("Email".to_string(), "pwd".to_string()))
        );

        let mut get_form = form.clone();
        get_form.method = Method::Get;
        assert_eq!(login_fields(&get_form), None);
    }

    #[test]
    fn test_login_success_markers() {
        assert!(login_succeeded("Welcome back, admin! <a href=/logout>Logout</a>"));
        assert!(!login_succeeded("Invalid username. Welcome page below."));
        assert!(!login_succeeded("Please sign in"));
    }
}
