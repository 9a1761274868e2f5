pub mod handlers;
pub mod report;

// Re-export commonly used handler functions for convenience
pub use handlers::{
    build_config, embedded_payloads, exit_code, expand_path, load_payload_dir, parse_seconds,
};
pub use report::{ReportFormat, ReportMeta, render_report, save_report};
