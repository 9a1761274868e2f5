pub mod config;
pub mod context;
pub mod detect;
pub mod finding;
pub mod injection;
pub mod module;
pub mod payload;
pub mod scan;

pub use config::{AccessMarkers, ProbePolicy, ScanConfig, ValidatedConfig};
pub use context::ScanContext;
pub use finding::{Evidence, Finding, Severity};
pub use injection::{FillPolicy, InjectionPoint, PointSource, Selector};
pub use module::{Check, CheckScope, Module, ModuleId, Strategy};
pub use payload::{PayloadBook, PayloadKind};
pub use scan::{ScanCallback, ScanEvent, ScanOutcome, Scanner, resolve_modules};
