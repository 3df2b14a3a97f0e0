//! Frame capture primitive.
//!
//! Camera acquisition is outside the orchestration core: "capture the
//! current frame as an encoded image" is delegated to an external
//! still-capture command (fswebcam by default) writing JPEG bytes to
//! stdout.

use std::future::Future;
use thiserror::Error;
use tokio::process::Command;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("capture command is empty")]
    EmptyCommand,
    #[error("failed to run capture command: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("capture command exited with {status}: {stderr}")]
    CommandFailed { status: String, stderr: String },
    #[error("capture command produced no image data")]
    EmptyFrame,
}

/// Source of encoded still frames for the capture scheduler.
pub trait FrameSource: Send + Sync + 'static {
    fn capture(&self) -> impl Future<Output = Result<Vec<u8>, CaptureError>> + Send;
}

/// Captures stills by running an external command per frame.
pub struct StillCamera {
    argv: Vec<String>,
}

impl StillCamera {
    pub fn new(argv: Vec<String>) -> Result<Self, CaptureError> {
        if argv.is_empty() {
            return Err(CaptureError::EmptyCommand);
        }
        Ok(Self { argv })
    }
}

impl FrameSource for StillCamera {
    fn capture(&self) -> impl Future<Output = Result<Vec<u8>, CaptureError>> + Send {
        let argv = self.argv.clone();
        async move {
            let output = Command::new(&argv[0]).args(&argv[1..]).output().await?;
            if !output.status.success() {
                return Err(CaptureError::CommandFailed {
                    status: output.status.to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr)
                        .chars()
                        .take(200)
                        .collect(),
                });
            }
            if output.stdout.is_empty() {
                return Err(CaptureError::EmptyFrame);
            }
            Ok(output.stdout)
        }
    }
}
