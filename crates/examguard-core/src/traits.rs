//! Collaborator traits.
//!
//! The session engine talks to the outside world only through these traits;
//! `examguard-host` provides the concrete implementations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DeviceError;
use crate::model::TestDefinition;
use crate::results::ResultRecord;

// ---------------------------------------------------------------------------
// Question source
// ---------------------------------------------------------------------------

/// Loads a test definition from some data source.
#[async_trait]
pub trait QuestionSource: Send + Sync {
    /// Short description of the source (e.g. a path or URL).
    fn name(&self) -> &str;

    /// Fetch and parse the test definition.
    async fn load(&self) -> anyhow::Result<TestDefinition>;
}

// ---------------------------------------------------------------------------
// Media devices
// ---------------------------------------------------------------------------

/// Which devices to acquire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRequest {
    pub camera: bool,
    pub microphone: bool,
}

impl MediaRequest {
    /// Both camera and microphone, as proctoring requires.
    pub const CAMERA_AND_MICROPHONE: MediaRequest = MediaRequest {
        camera: true,
        microphone: true,
    };
}

/// Grants access to camera/microphone.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Acquire the requested devices. Either all are acquired or none.
    async fn acquire(&self, request: &MediaRequest) -> Result<Box<dyn MediaStream>, DeviceError>;
}

/// An acquired device handle.
///
/// `release` consumes the handle, so it can run at most once per acquisition.
pub trait MediaStream: Send + Sync {
    /// Human-readable description of the acquired devices.
    fn label(&self) -> String;

    /// Release the devices.
    fn release(self: Box<Self>);
}

// ---------------------------------------------------------------------------
// Result sink
// ---------------------------------------------------------------------------

/// Durable, append-only store of graded results.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn append(&self, record: &ResultRecord) -> anyhow::Result<()>;
}
