//! Diagram extraction and out-of-process rendering. The rendering engine is a
//! separate tool-chain component; this module locates the block, invokes the
//! tool, and consumes its output with cleanup on every exit path.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::error::RelayError;

pub const START_MARKER: &str = "@startuml";
pub const END_MARKER: &str = "@enduml";

const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(30);

/// First delimited diagram block in `text`, both markers included. Non-greedy:
/// the block ends at the first end marker after the first start marker.
/// Absence is a normal "nothing to render" outcome, not an error.
pub fn extract(text: &str) -> Option<&str> {
    let start = text.find(START_MARKER)?;
    let rest = &text[start..];
    let end = rest.find(END_MARKER)?;
    Some(&rest[..end + END_MARKER.len()])
}

/// Invokes an external renderer on diagram source and reads back the raster
/// file it produces next to its input.
pub struct DiagramRenderer {
    command: String,
    timeout: Duration,
    scratch_root: Option<PathBuf>,
}

impl Default for DiagramRenderer {
    fn default() -> Self {
        Self::new("plantuml")
    }
}

impl DiagramRenderer {
    pub fn new(command: impl Into<String>) -> Self {
        DiagramRenderer {
            command: command.into(),
            timeout: DEFAULT_RENDER_TIMEOUT,
            scratch_root: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Place scratch directories under `root` instead of the system temp dir.
    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(root.into());
        self
    }

    /// Render a diagram block to raster bytes.
    ///
    /// The block is written into a uniquely-named scratch directory that is
    /// removed when this call returns, whether the renderer succeeded, exited
    /// non-zero, or timed out. The renderer is expected to write
    /// `<input stem>.png` next to its input; a missing output file is a
    /// [`RelayError::Render`] like any other renderer failure. No retries.
    pub async fn render(&self, block: &str) -> Result<Vec<u8>, RelayError> {
        let scratch = self
            .scratch_dir()
            .map_err(|e| RelayError::Render(format!("scratch dir: {}", e)))?;

        let source = scratch.path().join("diagram.puml");
        tokio::fs::write(&source, block)
            .await
            .map_err(|e| RelayError::Render(format!("write diagram source: {}", e)))?;

        debug!(command = self.command.as_str(), source = %source.display(), "rendering diagram");

        let child = Command::new(&self.command)
            .arg("-tpng")
            .arg(&source)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RelayError::Render(format!("spawn {}: {}", self.command, e)))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                RelayError::Render(format!(
                    "{} timed out after {}s",
                    self.command,
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| RelayError::Render(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RelayError::Render(format!(
                "{} exited with {:?}: {}",
                self.command,
                output.status.code(),
                stderr.trim()
            )));
        }

        let raster = source.with_extension("png");
        tokio::fs::read(&raster)
            .await
            .map_err(|_| RelayError::Render("renderer produced no output file".to_string()))
        // `scratch` dropped here removes the directory on every path.
    }

    fn scratch_dir(&self) -> std::io::Result<tempfile::TempDir> {
        let builder_prefix = "diagram-";
        match &self.scratch_root {
            Some(root) => tempfile::Builder::new().prefix(builder_prefix).tempdir_in(root),
            None => tempfile::Builder::new().prefix(builder_prefix).tempdir(),
        }
    }
}

/// Decode raster bytes into a displayable image. Empty input means "no
/// image"; undecodable bytes are a [`RelayError::Decode`].
pub fn decode(bytes: &[u8]) -> Result<Option<image::DynamicImage>, RelayError> {
    if bytes.is_empty() {
        return Ok(None);
    }
    image::load_from_memory(bytes)
        .map(Some)
        .map_err(|e| RelayError::Decode(e.to_string()))
}
