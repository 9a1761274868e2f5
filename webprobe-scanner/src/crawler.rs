use crate::cancel::Cancellation;
use crate::error::{Result, ScanError};
use crate::form::{DEFAULT_ENCTYPE, FieldDescriptor, FormDescriptor};
use crate::request::Method;
use crate::resource::Resource;
use crate::result::{CrawlOutput, CrawlResult};
use crate::scope::Scope;
use crate::transport::Transport;
use futures::stream::{self, StreamExt};
use scraper::{ElementRef, Html, Selector};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Called with (depth, url) right before a page is fetched.
pub type ProgressCallback = Arc<dyn Fn(usize, String) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlState {
    Init,
    Running,
    Done,
}

/// Links and forms pulled out of one fetched page.
struct PageOutcome {
    result: CrawlResult,
    links: Vec<Resource>,
    forms: Vec<FormDescriptor>,
}

/// Breadth-first crawler bounded by depth and a [`Scope`].
///
/// The frontier is drained one depth level at a time. Inside a level up to
/// `workers` fetches run concurrently, and results are consumed in frontier
/// order, so the visited list does not depend on response timing.
pub struct Crawler {
    transport: Arc<dyn Transport>,
    scope: Scope,
    max_depth: usize,
    workers: usize,
    progress_callback: Option<ProgressCallback>,
    cancellation: Cancellation,
    state: Arc<Mutex<CrawlState>>,
}

impl Crawler {
    pub fn new(transport: Arc<dyn Transport>, scope: Scope) -> Self {
        Self {
            transport,
            scope,
            max_depth: 1,
            workers: 4,
            progress_callback: None,
            cancellation: Cancellation::new(),
            state: Arc::new(Mutex::new(CrawlState::Init)),
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn with_cancellation(mut self, cancellation: Cancellation) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub async fn state(&self) -> CrawlState {
        *self.state.lock().await
    }

    pub async fn crawl(&self, start: &Resource) -> Result<CrawlOutput> {
        info!(
            start = %start,
            max_depth = self.max_depth,
            workers = self.workers,
            "starting crawl"
        );
        *self.state.lock().await = CrawlState::Running;

        let mut output = CrawlOutput::default();
        let mut visited: HashSet<Resource> = HashSet::new();
        let mut seen_forms: HashSet<FormDescriptor> = HashSet::new();
        let mut frontier: VecDeque<(Resource, usize)> = VecDeque::new();
        frontier.push_back((start.clone(), 0));

        while let Some(depth) = frontier.front().map(|(_, d)| *d) {
            if self.cancellation.is_cancelled() {
                info!(visited = output.visited.len(), "crawl cancelled");
                output.cancelled = true;
                break;
            }

            let batch = self.pop_level(&mut frontier, depth, &mut visited, &mut output);
            if batch.is_empty() {
                continue;
            }

            let pages: Vec<PageOutcome> = stream::iter(batch)
                .map(|url| self.visit(url, depth))
                .buffered(self.workers)
                .collect()
                .await;

            for page in pages {
                output.pages.push(page.result);

                for form in page.forms {
                    if seen_forms.insert(form.clone()) {
                        debug!(action = %form.action, method = %form.method, "form recorded");
                        output.forms.push(form);
                    }
                }

                if depth < self.max_depth {
                    for link in page.links {
                        if !visited.contains(&link) {
                            frontier.push_back((link, depth + 1));
                        }
                    }
                }
            }
        }

        *self.state.lock().await = CrawlState::Done;
        info!(
            visited = output.visited.len(),
            forms = output.forms.len(),
            "crawl complete"
        );
        Ok(output)
    }

    /// Pop every frontier entry at `depth`, marking each as visited and
    /// keeping the in-scope ones for fetching.
    fn pop_level(
        &self,
        frontier: &mut VecDeque<(Resource, usize)>,
        depth: usize,
        visited: &mut HashSet<Resource>,
        output: &mut CrawlOutput,
    ) -> Vec<Resource> {
        let mut batch = Vec::new();
        while frontier.front().is_some_and(|(_, d)| *d == depth) {
            let Some((url, _)) = frontier.pop_front() else {
                break;
            };
            if !visited.insert(url.clone()) {
                continue;
            }
            if !self.scope.allows(&url) {
                debug!(url = %url, "out of scope, discarded");
                continue;
            }
            output.visited.push(url.clone());
            batch.push(url);
        }
        batch
    }

    async fn visit(&self, url: Resource, depth: usize) -> PageOutcome {
        if self.cancellation.is_cancelled() {
            return PageOutcome {
                result: CrawlResult::with_error(
                    url.to_string(),
                    depth,
                    ScanError::Cancelled.to_string(),
                ),
                links: Vec::new(),
                forms: Vec::new(),
            };
        }

        if let Some(ref callback) = self.progress_callback {
            callback(depth, url.to_string());
        }

        match Self::fetch_and_parse_static(self.transport.as_ref(), &url, depth, &self.scope).await
        {
            Ok(page) => page,
            Err(e) => {
                warn!(url = %url, error = %e, "crawl fetch failed");
                PageOutcome {
                    result: CrawlResult::with_error(url.to_string(), depth, e.to_string()),
                    links: Vec::new(),
                    forms: Vec::new(),
                }
            }
        }
    }

    async fn fetch_and_parse_static(
        transport: &dyn Transport,
        url: &Resource,
        depth: usize,
        scope: &Scope,
    ) -> Result<PageOutcome> {
        debug!(url = %url, depth, "fetching");
        let response = transport.get(url).await?;

        let mut result = CrawlResult::new(url.to_string(), depth);
        result.status_code = response.status;
        result.content_type = response.content_type.clone();
        result.response_time = response.elapsed;

        if !response.is_html() {
            debug!(url = %url, content_type = ?response.content_type, "not HTML, skipped");
            return Ok(PageOutcome {
                result,
                links: Vec::new(),
                forms: Vec::new(),
            });
        }

        // Relative references resolve against the document actually served.
        let base = Resource::from_url(response.final_url.clone()).unwrap_or_else(|_| url.clone());

        let (links, forms) = match Self::extract_elements_static(&response.body, &base, scope) {
            Ok(found) => found,
            Err(e) => {
                warn!(url = %url, error = %e, "page could not be parsed");
                (Vec::new(), Vec::new())
            }
        };

        result.links_found = links.iter().map(|l| l.to_string()).collect();
        result.forms_found = forms.len();

        Ok(PageOutcome {
            result,
            links,
            forms,
        })
    }

    fn extract_elements_static(
        html: &str,
        base: &Resource,
        scope: &Scope,
    ) -> Result<(Vec<Resource>, Vec<FormDescriptor>)> {
        let document = Html::parse_document(html);

        let link_selector = selector("a[href]")?;
        let mut links = Vec::new();
        let mut seen = HashSet::new();

        for element in document.select(&link_selector) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            let Some(absolute) = base.join(href) else {
                continue;
            };
            if !scope.allows(&absolute) {
                debug!(link = %absolute, "link out of scope");
                continue;
            }
            if seen.insert(absolute.clone()) {
                links.push(absolute);
            }
        }

        let form_selector = selector("form")?;
        let mut forms = Vec::new();
        for element in document.select(&form_selector) {
            let form = parse_form(element, base)?;
            if scope.allows(&form.action) {
                forms.push(form);
            } else {
                debug!(action = %form.action, "form action out of scope");
            }
        }

        Ok((links, forms))
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| ScanError::ParseError(format!("selector '{}': {}", css, e)))
}

fn parse_form(element: ElementRef<'_>, base: &Resource) -> Result<FormDescriptor> {
    let attrs = element.value();
    let method = Method::from_form_attr(attrs.attr("method"));
    let action = match attrs.attr("action").map(str::trim).filter(|a| !a.is_empty()) {
        Some(action) => base.join(action).unwrap_or_else(|| base.clone()),
        None => base.clone(),
    };
    let enctype = attrs
        .attr("enctype")
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .unwrap_or(DEFAULT_ENCTYPE);

    let mut form = FormDescriptor::new(method, action).with_enctype(enctype);

    let field_selector = selector("input[name], textarea[name], select[name]")?;
    let option_selector = selector("option")?;

    for field in element.select(&field_selector) {
        let value = field.value();
        let Some(name) = value.attr("name").filter(|n| !n.is_empty()) else {
            continue;
        };
        let descriptor = match value.name() {
            "textarea" => FieldDescriptor::new(name, "textarea", field.text().collect::<String>()),
            "select" => {
                let options: Vec<ElementRef<'_>> = field.select(&option_selector).collect();
                let chosen = options
                    .iter()
                    .find(|o| o.value().attr("selected").is_some())
                    .or_else(|| options.first());
                let selected = chosen
                    .map(|o| {
                        o.value()
                            .attr("value")
                            .map(str::to_string)
                            .unwrap_or_else(|| o.text().collect::<String>().trim().to_string())
                    })
                    .unwrap_or_default();
                FieldDescriptor::new(name, "select", selected)
            }
            _ => FieldDescriptor::new(
                name,
                value.attr("type").unwrap_or("text"),
                value.attr("value").unwrap_or_default(),
            ),
        };
        form = form.with_field(descriptor);
    }

    Ok(form)
}
