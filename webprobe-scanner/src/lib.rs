pub mod cancel;
pub mod crawler;
pub mod error;
pub mod form;
pub mod request;
pub mod resource;
pub mod result;
pub mod scope;
pub mod transport;

pub use cancel::Cancellation;
pub use crawler::{CrawlState, Crawler, ProgressCallback};
pub use error::{ConfigError, Result, ScanError};
pub use form::{FieldDescriptor, FormDescriptor};
pub use request::{Method, ProbeRequest, RequestBody, UploadFile};
pub use resource::Resource;
pub use result::{CrawlOutput, CrawlResult};
pub use scope::Scope;
pub use transport::{HttpTransport, Response, Transport, TransportOptions};
