// In-memory transport for driving checks without a server

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use webprobe_core::{PayloadBook, PayloadKind, ProbePolicy, ScanContext};
use webprobe_scanner::{ProbeRequest, Resource, Response, ScanError, Transport};

type Handler = dyn Fn(&ProbeRequest) -> Option<Response> + Send + Sync;

/// Answers every request with `handler`. `None` simulates a network failure.
pub struct StubTransport {
    handler: Box<Handler>,
    log: Mutex<Vec<ProbeRequest>>,
}

impl StubTransport {
    pub fn new<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&ProbeRequest) -> Option<Response> + Send + Sync + 'static,
    {
        Arc::new(Self {
            handler: Box::new(handler),
            log: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<ProbeRequest> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn send(&self, request: &ProbeRequest) -> webprobe_scanner::error::Result<Response> {
        self.log.lock().unwrap().push(request.clone());
        (self.handler)(request).ok_or_else(|| ScanError::InvalidUrl("connection refused".to_string()))
    }
}

pub fn html(request: &ProbeRequest, body: impl Into<String>) -> Response {
    Response {
        status: 200,
        content_type: Some("text/html".to_string()),
        body: body.into(),
        final_url: request.url.url().clone(),
        elapsed: Duration::from_millis(10),
    }
}

/// Value submitted for `name`, from the query or the body.
pub fn field(request: &ProbeRequest, name: &str) -> Option<String> {
    request
        .fields()
        .into_iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v)
}

pub fn book() -> PayloadBook {
    PayloadBook::new()
        .with(PayloadKind::Sql, vec!["'".to_string(), "' OR '1'='1".to_string()])
        .with(PayloadKind::SqlBlind, vec!["1' AND SLEEP(5)--".to_string()])
        .with(PayloadKind::Xss, vec!["<script>alert(1)</script>".to_string()])
        .with(PayloadKind::NoSql, vec!["{\"$gt\": \"\"}".to_string()])
        .with(PayloadKind::NoSqlBlind, vec!["'; sleep(3000); '".to_string()])
        .with(PayloadKind::Rce, vec![";id".to_string()])
}

pub fn context(transport: Arc<StubTransport>, policy: ProbePolicy) -> ScanContext {
    ScanContext::new(transport, "example.com", policy, book()).unwrap()
}

pub fn policy() -> ProbePolicy {
    ProbePolicy {
        length_threshold: 50,
        ..ProbePolicy::default()
    }
}

pub fn url(s: &str) -> Resource {
    Resource::parse(s).unwrap()
}
