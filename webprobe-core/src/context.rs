use crate::config::ProbePolicy;
use crate::detect::signature::SignatureLibrary;
use crate::payload::PayloadBook;
use std::sync::Arc;
use tracing::debug;
use webprobe_scanner::{Cancellation, ConfigError, ProbeRequest, Response, Transport};

/// Everything a check needs while probing. Shared read-only by all checks
/// of one scan.
pub struct ScanContext {
    pub transport: Arc<dyn Transport>,
    /// Host of the start URL, lowercased.
    pub origin_host: String,
    pub policy: ProbePolicy,
    pub signatures: SignatureLibrary,
    pub payloads: PayloadBook,
    pub cancellation: Cancellation,
    /// Probes in flight per check.
    pub workers: usize,
}

impl ScanContext {
    pub fn new(
        transport: Arc<dyn Transport>,
        origin_host: impl Into<String>,
        policy: ProbePolicy,
        payloads: PayloadBook,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            transport,
            origin_host: origin_host.into().to_ascii_lowercase(),
            policy,
            signatures: SignatureLibrary::new()?,
            payloads,
            cancellation: Cancellation::new(),
            workers: 4,
        })
    }

    pub fn with_cancellation(mut self, cancellation: Cancellation) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Send one probe. A transport failure is logged and reported as `None`,
    /// which every strategy treats as absence of evidence.
    pub async fn send(&self, request: &ProbeRequest) -> Option<Response> {
        match self.transport.send(request).await {
            Ok(response) => Some(response),
            Err(e) => {
                debug!(
                    method = %request.method,
                    url = %request.url,
                    error = %e,
                    "probe failed"
                );
                None
            }
        }
    }
}
