//! Shell process with process group support
//!
//! Thin wrapper over process-wrap's `ChildWrapper` so the native terminal can
//! keep the child behind a `tokio::sync::Mutex` and poll it without blocking.

use std::io;
use std::pin::Pin;

use process_wrap::tokio::ChildWrapper;
use tokio::process::{ChildStdin, ChildStdout};

/// Owned shell process spawned through process-wrap
#[derive(Debug)]
pub struct WrappedChild {
    inner: Box<dyn ChildWrapper>,
}

impl WrappedChild {
    /// Wrap a spawned process-wrap child
    pub fn new(inner: Box<dyn ChildWrapper>) -> Self {
        Self { inner }
    }

    /// Take the piped stdin and stdout handles
    ///
    /// Returns `None` if either was not piped or was already taken.
    pub fn take_stdio(&mut self) -> Option<(ChildStdin, ChildStdout)> {
        let stdin = self.inner.stdin().take()?;
        let stdout = self.inner.stdout().take()?;
        Some((stdin, stdout))
    }

    /// Kill the whole process group and wait for it to exit
    pub async fn kill(&mut self) -> io::Result<()> {
        Pin::from(self.inner.kill()).await
    }

    /// Non-blocking exit check
    ///
    /// Returns `Some(status)` once the shell has exited.
    pub fn try_wait(&mut self) -> io::Result<Option<std::process::ExitStatus>> {
        self.inner.try_wait()
    }

    /// Process id, or 0 once the process has been reaped
    pub fn id(&self) -> u32 {
        self.inner.id().unwrap_or(0)
    }
}
