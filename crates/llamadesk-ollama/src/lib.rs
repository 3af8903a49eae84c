//! Ollama adapters for llamadesk ports.
//!
//! - [`OllamaClient`] streams `/api/pull` progress ([`ModelPullPort`])
//! - [`HttpReachabilityProbe`] checks the network before a pull
//! - [`SystemDiskSpace`] checks free space in the model directory
//!
//! [`ModelPullPort`]: llamadesk_core::ports::ModelPullPort

mod client;
mod config;
mod disk;
mod ndjson;
mod probe;

pub use client::OllamaClient;
pub use config::{DEFAULT_CONNECT_TIMEOUT, OllamaConfig, is_remote_url};
pub use disk::{ENV_OLLAMA_MODELS, SystemDiskSpace, default_models_dir};
pub use probe::HttpReachabilityProbe;
