//! examguard-host: the outside world of an exam session.
//!
//! Question sources (local file, HTTP), camera/microphone access, durable
//! result storage and the TOML configuration that wires them together.

pub mod config;
pub mod devices;
pub mod error;
pub mod file;
pub mod http;
pub mod mock;
pub mod store;

pub use config::{create_devices, create_source, load_config, DeviceMode, ExamguardConfig, SourceConfig};
pub use error::SourceError;
pub use file::FileSource;
pub use http::HttpSource;
pub use store::JsonResultStore;
