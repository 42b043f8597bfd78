//! Camera and microphone access through local device nodes.
//!
//! Holding the device nodes open is the "stream": the camera is the first
//! `video*` node under the device root, the microphone the first capture
//! PCM node (`snd/pcmC*D*c`). Dropping or releasing the stream closes them.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::instrument;

use examguard_core::error::DeviceError;
use examguard_core::traits::{MediaDevices, MediaRequest, MediaStream};

const DEFAULT_DEVICE_ROOT: &str = "/dev";

/// Media devices backed by the local device tree.
#[derive(Debug, Clone)]
pub struct LocalDevices {
    root: PathBuf,
}

impl LocalDevices {
    pub fn new() -> Self {
        Self::with_root(DEFAULT_DEVICE_ROOT)
    }

    /// Look for device nodes under `root` instead of `/dev`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Default for LocalDevices {
    fn default() -> Self {
        Self::new()
    }
}

/// First entry of `dir` (sorted by name) whose file name satisfies `matches`.
fn first_node(dir: &Path, matches: impl Fn(&str) -> bool) -> Option<PathBuf> {
    let mut nodes: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(&matches)
        })
        .collect();
    nodes.sort();
    nodes.into_iter().next()
}

fn is_camera(name: &str) -> bool {
    name.strip_prefix("video")
        .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
}

fn is_capture_pcm(name: &str) -> bool {
    name.starts_with("pcmC") && name.ends_with('c')
}

fn open_node(kind: &str, path: &Path) -> Result<File, DeviceError> {
    File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::PermissionDenied => {
            DeviceError::PermissionDenied(format!("{kind} {}: {e}", path.display()))
        }
        _ => DeviceError::Unavailable(format!("{kind} {}: {e}", path.display())),
    })
}

fn acquire_blocking(root: &Path, request: MediaRequest) -> Result<LocalStream, DeviceError> {
    let mut nodes = Vec::new();

    if request.camera {
        let path = first_node(root, is_camera)
            .ok_or_else(|| DeviceError::Unavailable(format!("no camera under {}", root.display())))?;
        let file = open_node("camera", &path)?;
        nodes.push((path, file));
    }

    if request.microphone {
        let snd = root.join("snd");
        let path = first_node(&snd, is_capture_pcm).ok_or_else(|| {
            DeviceError::Unavailable(format!("no microphone under {}", snd.display()))
        })?;
        // On failure the camera handle opened above is dropped with `nodes`.
        let file = open_node("microphone", &path)?;
        nodes.push((path, file));
    }

    Ok(LocalStream { nodes })
}

#[async_trait]
impl MediaDevices for LocalDevices {
    #[instrument(skip(self), fields(root = %self.root.display()))]
    async fn acquire(&self, request: &MediaRequest) -> Result<Box<dyn MediaStream>, DeviceError> {
        let root = self.root.clone();
        let request = *request;
        let stream = tokio::task::spawn_blocking(move || acquire_blocking(&root, request))
            .await
            .map_err(|e| DeviceError::Unavailable(format!("device lookup failed: {e}")))??;
        Ok(Box::new(stream))
    }
}

/// Open handles on the acquired device nodes.
struct LocalStream {
    nodes: Vec<(PathBuf, File)>,
}

impl MediaStream for LocalStream {
    fn label(&self) -> String {
        self.nodes
            .iter()
            .map(|(path, _)| path.display().to_string())
            .collect::<Vec<_>>()
            .join(" + ")
    }

    fn release(self: Box<Self>) {
        for (path, file) in self.nodes {
            tracing::debug!(node = %path.display(), "closing device node");
            drop(file);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_tree(camera: bool, microphone: bool) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("snd")).unwrap();
        std::fs::write(dir.path().join("snd").join("pcmC0D0p"), b"").unwrap();
        std::fs::write(dir.path().join("snd").join("controlC0"), b"").unwrap();
        if camera {
            std::fs::write(dir.path().join("video1"), b"").unwrap();
            std::fs::write(dir.path().join("video0"), b"").unwrap();
        }
        if microphone {
            std::fs::write(dir.path().join("snd").join("pcmC0D0c"), b"").unwrap();
        }
        dir
    }

    #[test]
    fn node_name_matching() {
        assert!(is_camera("video0"));
        assert!(is_camera("video12"));
        assert!(!is_camera("video"));
        assert!(!is_camera("videodev"));
        assert!(is_capture_pcm("pcmC0D0c"));
        assert!(!is_capture_pcm("pcmC0D0p"));
    }

    #[tokio::test]
    async fn acquires_first_camera_and_capture_node() {
        let dir = fake_tree(true, true);
        let devices = LocalDevices::with_root(dir.path());
        let stream = devices
            .acquire(&MediaRequest::CAMERA_AND_MICROPHONE)
            .await
            .unwrap();
        let label = stream.label();
        assert!(label.contains("video0"));
        assert!(label.contains("pcmC0D0c"));
        stream.release();
    }

    #[tokio::test]
    async fn missing_microphone_is_unavailable() {
        let dir = fake_tree(true, false);
        let devices = LocalDevices::with_root(dir.path());
        let err = devices
            .acquire(&MediaRequest::CAMERA_AND_MICROPHONE)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, DeviceError::Unavailable(_)));
        assert!(!err.is_retriable());
    }

    #[tokio::test]
    async fn missing_camera_is_unavailable() {
        let dir = fake_tree(false, true);
        let devices = LocalDevices::with_root(dir.path());
        let err = devices
            .acquire(&MediaRequest::CAMERA_AND_MICROPHONE)
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("no camera"));
    }
}
