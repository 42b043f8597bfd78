//! In-memory collaborators for tests and simulated runs.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use examguard_core::error::DeviceError;
use examguard_core::model::TestDefinition;
use examguard_core::results::{ResultLog, ResultRecord};
use examguard_core::traits::{MediaDevices, MediaRequest, MediaStream, QuestionSource, ResultSink};

/// A question source that always returns the same definition, or the same failure.
pub struct StaticSource {
    definition: Option<TestDefinition>,
    failure: String,
    call_count: AtomicU32,
}

impl StaticSource {
    pub fn new(definition: TestDefinition) -> Self {
        Self {
            definition: Some(definition),
            failure: String::new(),
            call_count: AtomicU32::new(0),
        }
    }

    /// A source whose every load fails with `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            definition: None,
            failure: message.to_string(),
            call_count: AtomicU32::new(0),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl QuestionSource for StaticSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn load(&self) -> anyhow::Result<TestDefinition> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        match &self.definition {
            Some(definition) => Ok(definition.clone()),
            None => Err(anyhow::anyhow!("{}", self.failure)),
        }
    }
}

/// Devices that grant or deny access on demand.
///
/// Counts acquisitions and releases so tests can check that every granted
/// stream is released exactly once.
pub struct SimulatedDevices {
    grant: AtomicBool,
    acquired: AtomicU32,
    released: Arc<AtomicU32>,
}

impl SimulatedDevices {
    pub fn granting() -> Self {
        Self::with_grant(true)
    }

    pub fn denying() -> Self {
        Self::with_grant(false)
    }

    fn with_grant(grant: bool) -> Self {
        Self {
            grant: AtomicBool::new(grant),
            acquired: AtomicU32::new(0),
            released: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Change the answer to subsequent requests.
    pub fn set_grant(&self, grant: bool) {
        self.grant.store(grant, Ordering::SeqCst);
    }

    pub fn acquired(&self) -> u32 {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> u32 {
        self.released.load(Ordering::SeqCst)
    }

    /// Streams currently held.
    pub fn outstanding(&self) -> u32 {
        self.acquired() - self.released()
    }
}

struct SimulatedStream {
    request: MediaRequest,
    released: Arc<AtomicU32>,
}

impl MediaStream for SimulatedStream {
    fn label(&self) -> String {
        match (self.request.camera, self.request.microphone) {
            (true, true) => "simulated camera + simulated microphone".into(),
            (true, false) => "simulated camera".into(),
            (false, true) => "simulated microphone".into(),
            (false, false) => "nothing".into(),
        }
    }

    fn release(self: Box<Self>) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl MediaDevices for SimulatedDevices {
    async fn acquire(&self, request: &MediaRequest) -> Result<Box<dyn MediaStream>, DeviceError> {
        if !self.grant.load(Ordering::SeqCst) {
            return Err(DeviceError::PermissionDenied(
                "access to camera and microphone was refused".into(),
            ));
        }
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SimulatedStream {
            request: *request,
            released: Arc::clone(&self.released),
        }))
    }
}

/// A result sink that keeps records in memory.
#[derive(Default)]
pub struct MemorySink {
    log: Mutex<ResultLog>,
    fail: AtomicBool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose every append fails.
    pub fn failing() -> Self {
        let sink = Self::default();
        sink.fail.store(true, Ordering::SeqCst);
        sink
    }

    pub fn records(&self) -> Vec<ResultRecord> {
        self.log.lock().unwrap().results.clone()
    }

    pub fn len(&self) -> usize {
        self.log.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ResultSink for MemorySink {
    async fn append(&self, record: &ResultRecord) -> anyhow::Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("result storage unavailable");
        }
        self.log.lock().unwrap().push(record.clone());
        Ok(())
    }
}
