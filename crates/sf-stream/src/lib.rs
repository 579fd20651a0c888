//! sf-stream: on-demand DASH session orchestration.
//!
//! Decides how each source stream is served ([`resolver`]), runs one encoder
//! process per window of segments ([`session`]), keeps those processes
//! bounded in number and lifetime ([`registry`]), and memoizes probe results
//! ([`probe_cache`]). [`catalog`] puts these together into the per-file
//! answers the HTTP layer and the CLI serve.

pub mod catalog;
pub mod probe_cache;
pub mod registry;
pub mod representation;
pub mod resolver;
pub mod session;

pub use catalog::{Catalog, Manifest, ManifestKind, StreamSummary};
pub use probe_cache::ProbeCache;
pub use registry::{start_cleanup_task, ManagedSessionInfo, SessionKey, SessionManager};
pub use representation::{Representation, RepresentationId, RepresentationKind};
pub use resolver::{Resolver, Stream, StreamRepresentation};
pub use session::{SessionInfo, SessionOptions, SessionState, TranscodingSession};
