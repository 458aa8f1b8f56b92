//! Durable output sinks for a spawned process
//!
//! Each stream is redirected into its own temporary file rather than a pipe.
//! The file keeps every byte the process writes whether or not anything is
//! reading, so nothing is lost when the process exits before a reader
//! attaches or writes more than a pipe buffer holds.

use crate::error::{AppError, Result};
use std::path::Path;
use std::process::Stdio;
use tempfile::{Builder, NamedTempFile, TempPath};

/// The two sinks allocated for one process invocation
#[derive(Debug)]
pub struct OutputCapture {
    stdout: NamedTempFile,
    stderr: NamedTempFile,
}

/// Finalized contents of one stream
#[derive(Debug)]
pub struct StreamCapture {
    bytes: Vec<u8>,
    path: TempPath,
}

/// Finalized contents of both streams
#[derive(Debug)]
pub struct CapturedOutput {
    pub stdout: StreamCapture,
    pub stderr: StreamCapture,
}

impl OutputCapture {
    /// Allocate sinks in the system temporary directory
    pub fn allocate() -> Result<Self> {
        Self::allocate_in(&std::env::temp_dir())
    }

    /// Allocate sinks inside `dir`
    pub fn allocate_in(dir: &Path) -> Result<Self> {
        Ok(Self {
            stdout: sink("iperf3-stdout-", dir)?,
            stderr: sink("iperf3-stderr-", dir)?,
        })
    }

    /// Handles to give the child as its stdout and stderr
    pub fn stdio(&self) -> Result<(Stdio, Stdio)> {
        let stdout = self.stdout.as_file().try_clone()
            .map_err(|e| AppError::capture(format!("Failed to share stdout sink: {}", e)))?;
        let stderr = self.stderr.as_file().try_clone()
            .map_err(|e| AppError::capture(format!("Failed to share stderr sink: {}", e)))?;
        Ok((Stdio::from(stdout), Stdio::from(stderr)))
    }

    pub fn stdout_path(&self) -> &Path {
        self.stdout.path()
    }

    pub fn stderr_path(&self) -> &Path {
        self.stderr.path()
    }

    /// Close the sinks and read back everything written to them.
    ///
    /// Must only be called once the process has exited; consuming `self`
    /// guarantees the sinks are never reused for another invocation.
    pub async fn finalize(self) -> Result<CapturedOutput> {
        Ok(CapturedOutput {
            stdout: read_back(self.stdout).await?,
            stderr: read_back(self.stderr).await?,
        })
    }
}

impl StreamCapture {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Lossy text view for logging
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    /// Storage location; the file is removed when this capture is dropped
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn sink(prefix: &str, dir: &Path) -> Result<NamedTempFile> {
    Builder::new()
        .prefix(prefix)
        .suffix(".log")
        .tempfile_in(dir)
        .map_err(|e| AppError::capture(format!("Failed to allocate sink in {}: {}", dir.display(), e)))
}

async fn read_back(file: NamedTempFile) -> Result<StreamCapture> {
    // Dropping our write handle leaves only the path; the child's copy
    // closed when it exited.
    let path = file.into_temp_path();
    let bytes = tokio::fs::read(&path).await
        .map_err(|e| AppError::capture(format!("Failed to read {}: {}", path.display(), e)))?;
    Ok(StreamCapture { bytes, path })
}
