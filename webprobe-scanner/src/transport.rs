use crate::error::{ConfigError, Result};
use crate::request::{Method, ProbeRequest, RequestBody};
use crate::resource::Resource;
use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use reqwest::redirect::Policy;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

pub const DEFAULT_USER_AGENT: &str = concat!("webprobe/", env!("CARGO_PKG_VERSION"));
const MAX_REDIRECTS: usize = 10;

/// What a probe observed. HTTP error statuses are still responses; only
/// network, timeout and DNS failures are errors.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
    /// URL reached after following same-origin redirects. When a redirect
    /// leaves the origin it is not followed and this is its `Location`.
    pub final_url: Url,
    /// Time spent sending the request and reading the body. Rate-limit
    /// waiting is excluded.
    pub elapsed: Duration,
}

impl Response {
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| {
                let ct = ct.to_ascii_lowercase();
                ct.contains("text/html") || ct.contains("application/xhtml+xml")
            })
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ProbeRequest) -> Result<Response>;

    async fn get(&self, url: &Resource) -> Result<Response> {
        self.send(&ProbeRequest::get(url.clone())).await
    }

    async fn post(&self, url: &Resource, fields: &[(String, String)]) -> Result<Response> {
        self.send(&ProbeRequest::post(url.clone(), fields.to_vec()))
            .await
    }
}

#[derive(Debug, Clone)]
pub struct TransportOptions {
    pub timeout: Duration,
    /// Minimum spacing between two requests, shared by every worker.
    pub delay: Duration,
    pub user_agent: String,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            delay: Duration::ZERO,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// reqwest-backed transport with a single token bucket for all callers.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

impl HttpTransport {
    pub fn new(options: &TransportOptions) -> std::result::Result<Self, ConfigError> {
        let user_agent = if options.user_agent.trim().is_empty() {
            DEFAULT_USER_AGENT
        } else {
            options.user_agent.as_str()
        };

        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(options.timeout)
            .connect_timeout(options.timeout / 2)
            .pool_max_idle_per_host(50)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .cookie_store(true)
            .redirect(redirect_policy())
            .build()
            .map_err(|e| ConfigError::Client(e.to_string()))?;

        // Zero delay means no pacing at all.
        let limiter = Quota::with_period(options.delay)
            .map(|quota| Arc::new(RateLimiter::direct(quota)));

        Ok(Self { client, limiter })
    }

    async fn pace(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }
}

fn same_origin(a: &Url, b: &Url) -> bool {
    a.host_str().map(str::to_ascii_lowercase) == b.host_str().map(str::to_ascii_lowercase)
        && a.port_or_known_default() == b.port_or_known_default()
}

/// Follow redirects within the origin only. Off-origin targets are reported,
/// never contacted.
fn redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        let leaves_origin = attempt
            .previous()
            .first()
            .is_some_and(|first| !same_origin(first, attempt.url()));
        if leaves_origin {
            attempt.stop()
        } else if attempt.previous().len() > MAX_REDIRECTS {
            attempt.error("too many redirects")
        } else {
            attempt.follow()
        }
    })
}

/// `Location` of a redirect the policy stopped at, resolved against the
/// response URL.
fn stopped_redirect(response: &reqwest::Response) -> Option<Url> {
    if !response.status().is_redirection() {
        return None;
    }
    let location = response
        .headers()
        .get(reqwest::header::LOCATION)?
        .to_str()
        .ok()?;
    response.url().join(location).ok()
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &ProbeRequest) -> Result<Response> {
        self.pace().await;
        debug!(method = %request.method, url = %request.url, "sending request");

        let builder = match (&request.method, &request.body) {
            (Method::Get, _) => self.client.get(request.url.url().clone()),
            (Method::Post, RequestBody::None) => self.client.post(request.url.url().clone()),
            (Method::Post, RequestBody::Form { fields }) => {
                self.client.post(request.url.url().clone()).form(fields)
            }
            (Method::Post, RequestBody::Multipart { fields, file }) => {
                let mut form = Form::new();
                for (name, value) in fields {
                    form = form.text(name.clone(), value.clone());
                }
                let part = Part::text(file.content.clone())
                    .file_name(file.filename.clone())
                    .mime_str("application/octet-stream")?;
                form = form.part(file.field.clone(), part);
                self.client.post(request.url.url().clone()).multipart(form)
            }
        };

        let start = Instant::now();
        let response = builder.send().await?;
        let status = response.status().as_u16();
        let final_url = stopped_redirect(&response).unwrap_or_else(|| response.url().clone());
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body = response.text().await?;
        let elapsed = start.elapsed();

        debug!(
            url = %request.url,
            status,
            final_url = %final_url,
            elapsed = ?elapsed,
            "response received"
        );

        Ok(Response {
            status,
            content_type,
            body,
            final_url,
            elapsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_string_contains, header, method, path, query_param},
    };

    fn transport() -> HttpTransport {
        HttpTransport::new(&TransportOptions {
            user_agent: "probe-test/1.0".to_string(),
            ..TransportOptions::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_get_sends_user_agent_and_reads_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/item"))
            .and(query_param("id", "7"))
            .and(header("user-agent", "probe-test/1.0"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("<p>item 7</p>", "text/html; charset=utf-8"),
            )
            .mount(&server)
            .await;

        let url = Resource::parse(&format!("{}/item?id=7", server.uri())).unwrap();
        let response = transport().get(&url).await.unwrap();

        assert_eq!(response.status, 200);
        assert!(response.is_html());
        assert_eq!(response.body, "<p>item 7</p>");
    }

    #[tokio::test]
    async fn test_error_status_is_not_a_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("SQLSTATE[42000]"))
            .mount(&server)
            .await;

        let url = Resource::parse(&server.uri()).unwrap();
        let response = transport().get(&url).await.unwrap();
        assert_eq!(response.status, 500);
        assert!(response.body.contains("SQLSTATE"));
    }

    #[tokio::test]
    async fn test_final_url_follows_redirects() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/go"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("location", format!("{}/landing", server.uri()).as_str()),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/landing"))
            .respond_with(ResponseTemplate::new(200).set_body_string("here"))
            .mount(&server)
            .await;

        let url = Resource::parse(&format!("{}/go", server.uri())).unwrap();
        let response = transport().get(&url).await.unwrap();
        assert_eq!(response.final_url.path(), "/landing");
        assert_eq!(response.body, "here");
    }

    #[tokio::test]
    async fn test_off_origin_redirect_is_reported_not_followed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/login"))
            .respond_with(
                ResponseTemplate::new(302).insert_header("location", "http://evil.invalid/landing"),
            )
            .mount(&server)
            .await;

        // evil.invalid never resolves, so following it would be a transport error.
        let url = Resource::parse(&format!("{}/login?next=x", server.uri())).unwrap();
        let response = transport().get(&url).await.unwrap();
        assert_eq!(response.status, 302);
        assert_eq!(response.final_url.as_str(), "http://evil.invalid/landing");
    }

    #[test]
    fn test_same_origin_compares_host_and_port() {
        let a = Url::parse("http://Example.com/a").unwrap();
        assert!(same_origin(&a, &Url::parse("http://example.com:80/b").unwrap()));
        assert!(!same_origin(&a, &Url::parse("http://example.com:8080/").unwrap()));
        assert!(!same_origin(&a, &Url::parse("http://evil.com/").unwrap()));
    }

    #[tokio::test]
    async fn test_post_encodes_fields() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .and(body_string_contains("user=admin"))
            .respond_with(ResponseTemplate::new(200).set_body_string("welcome"))
            .mount(&server)
            .await;

        let url = Resource::parse(&format!("{}/login", server.uri())).unwrap();
        let fields = vec![
            ("user".to_string(), "admin".to_string()),
            ("pass".to_string(), "admin".to_string()),
        ];
        let response = transport().post(&url, &fields).await.unwrap();
        assert_eq!(response.body, "welcome");
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let transport = HttpTransport::new(&TransportOptions {
            timeout: Duration::from_millis(500),
            ..TransportOptions::default()
        })
        .unwrap();
        // Port 9 (discard) on localhost is almost never listening.
        let url = Resource::parse("http://127.0.0.1:9/").unwrap();
        let err = transport.get(&url).await.unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_delay_spaces_requests() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(&TransportOptions {
            delay: Duration::from_millis(200),
            ..TransportOptions::default()
        })
        .unwrap();
        let url = Resource::parse(&server.uri()).unwrap();

        let start = Instant::now();
        for _ in 0..3 {
            transport.get(&url).await.unwrap();
        }
        // First request passes immediately, the next two wait one period each.
        assert!(start.elapsed() >= Duration::from_millis(350));
    }
}
