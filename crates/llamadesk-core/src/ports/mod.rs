//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces the download queue expects from
//! infrastructure. They contain no implementation details and use only
//! domain types.
//!
//! # Design Rules
//!
//! - No `reqwest` or `sysinfo` types in any signature
//! - Probes never fail: they answer with a conservative boolean
//! - Adapters map transport errors into `DownloadError` at the boundary

pub mod disk_space;
pub mod localization;
pub mod model_pull;
pub mod reachability;

pub use disk_space::DiskSpacePort;
pub use localization::{
    EnglishCatalog, LocalizeError, LocalizerPort, MessageKey, format_template,
};
pub use model_pull::{ModelPullPort, PullChunk, PullStream, SUCCESS_STATUS};
pub use reachability::{AlwaysReachable, NetworkReachabilityPort};
