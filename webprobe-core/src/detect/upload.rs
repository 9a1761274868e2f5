use crate::context::ScanContext;
use crate::finding::{Evidence, Finding};
use crate::module::Check;
use crate::payload::upload_files;
use tracing::info;
use webprobe_scanner::{FormDescriptor, Method, ProbeRequest, UploadFile};

const ACCEPTANCE_MARKERS: &[&str] = &["file uploaded", "upload success", "has been saved", "shell"];

pub fn accepted(body: &str) -> bool {
    let lower = body.to_lowercase();
    ACCEPTANCE_MARKERS.iter().any(|m| lower.contains(m))
}

pub async fn probe(ctx: &ScanContext, check: &Check, form: &FormDescriptor) -> Vec<Finding> {
    let mut findings = Vec::new();
    if form.method != Method::Post || !form.is_multipart() {
        return findings;
    }
    let Some(file_field) = form.fields.iter().find(|f| f.is_file()) else {
        return findings;
    };
    let fields: Vec<(String, String)> = form
        .fields
        .iter()
        .filter(|f| !f.is_file())
        .map(|f| (f.name.clone(), f.value.clone()))
        .collect();

    for (filename, content) in upload_files() {
        if ctx.is_cancelled() {
            break;
        }
        let request = ProbeRequest::multipart(
            form.action.clone(),
            fields.clone(),
            UploadFile {
                field: file_field.name.clone(),
                filename: filename.clone(),
                content,
            },
        );
        let Some(response) = ctx.send(&request).await else {
            continue;
        };
        if accepted(&response.body) {
            info!(module = check.tag, action = %form.action, filename = %filename, "upload accepted");
            findings.push(
                check
                    .form_finding(form, filename.clone(), request)
                    .with_param(file_field.name.clone())
                    .with_evidence(Evidence {
                        filename: Some(filename),
                        issue: Some("executable file accepted by upload form".to_string()),
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

    #[test]
    fn test_acceptance_markers() {
        assert!(accepted("File uploaded to /uploads/shell.php"));
        assert!(accepted("Your document has been saved"));
        assert!(!accepted("Only images are allowed"));
    }
}
