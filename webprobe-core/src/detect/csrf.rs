use crate::context::ScanContext;
use crate::finding::{Evidence, Finding};
use crate::injection::form_request;
use crate::module::Check;
use tracing::info;
use webprobe_scanner::{FieldDescriptor, FormDescriptor, Method};

const SENSITIVE_ACTIONS: &[&str] = &["delete", "update", "admin", "change_password", "profile"];
const TOKEN_NAMES: &[&str] = &[
    "csrf_token",
    "csrfmiddlewaretoken",
    "token",
    "__requestverificationtoken",
];
const REJECTION_KEYWORDS: &[&str] = &["error", "forbidden", "invalid csrf", "access denied"];

/// POST form whose action names a state-changing operation.
pub fn is_sensitive(form: &FormDescriptor) -> bool {
    if form.method != Method::Post {
        return false;
    }
    let action = form.action.as_str().to_ascii_lowercase();
    SENSITIVE_ACTIONS.iter().any(|kw| action.contains(kw))
}

fn is_token_name(name: &str) -> bool {
    TOKEN_NAMES.contains(&name.to_ascii_lowercase().as_str())
}

pub fn find_token(form: &FormDescriptor) -> Option<&FieldDescriptor> {
    form.fields
        .iter()
        .find(|f| f.is_hidden() && is_token_name(&f.name))
}

/// No rejection wording in a non-empty response.
pub fn accepted(body: &str) -> bool {
    if body.trim().is_empty() {
        return false;
    }
    let lower = body.to_lowercase();
    !REJECTION_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

pub async fn audit(ctx: &ScanContext, check: &Check, form: &FormDescriptor) -> Vec<Finding> {
    if !is_sensitive(form) || ctx.is_cancelled() {
        return Vec::new();
    }

    let Some(token) = find_token(form) else {
        info!(module = check.tag, action = %form.action, "sensitive form without CSRF token");
        let forged = form_request(form, form.default_values());
        return vec![check.form_finding(form, "", forged).with_evidence(Evidence {
            issue: Some("no CSRF token in a sensitive form".to_string()),
            ..Evidence::default()
        })];
    };

    let without_token: Vec<(String, String)> = form
        .fields
        .iter()
        .filter(|f| !is_token_name(&f.name))
        .map(|f| (f.name.clone(), f.value.clone()))
        .collect();
    let request = form_request(form, without_token);
    let Some(response) = ctx.send(&request).await else {
        return Vec::new();
    };
    if !accepted(&response.body) {
        return Vec::new();
    }

    info!(module = check.tag, action = %form.action, token = %token.name, "request accepted without token");
    vec![check
        .form_finding(form, "", request)
        .with_param(token.name.clone())
        .with_evidence(Evidence {
            issue: Some("CSRF token present but the request was accepted without it".to_string()),
            ..Evidence::default()
        })]
}
