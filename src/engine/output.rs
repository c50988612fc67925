//! Serialized output sinks.
//!
//! Each line is written and flushed under one lock, so lines from
//! different workers never interleave.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::EngineError;

/// Blocking writer shared by worker threads.
pub(crate) struct SharedWriter<W> {
    inner: Arc<Mutex<W>>,
}

impl<W> Clone for SharedWriter<W> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<W: Write> SharedWriter<W> {
    pub(crate) fn new(writer: W) -> Self {
        Self {
            inner: Arc::new(Mutex::new(writer)),
        }
    }

    pub(crate) fn write_line(&self, line: &[u8]) -> io::Result<()> {
        // a panicking writer leaves the sink usable for the rest of the drain
        let mut writer = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_all(line)?;
        writer.flush()
    }

    /// Take the writer back once every other clone is gone.
    pub(crate) fn into_inner(self) -> Result<W, EngineError> {
        let mutex = Arc::try_unwrap(self.inner).map_err(|_| EngineError::OutputInUse)?;
        Ok(mutex.into_inner().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Async writer shared by worker tasks.
pub(crate) struct AsyncSharedWriter<W> {
    inner: Arc<tokio::sync::Mutex<W>>,
}

impl<W> Clone for AsyncSharedWriter<W> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<W: AsyncWrite + Unpin> AsyncSharedWriter<W> {
    pub(crate) fn new(writer: W) -> Self {
        Self {
            inner: Arc::new(tokio::sync::Mutex::new(writer)),
        }
    }

    pub(crate) async fn write_line(&self, line: &[u8]) -> io::Result<()> {
        let mut writer = self.inner.lock().await;
        writer.write_all(line).await?;
        writer.flush().await
    }

    pub(crate) fn into_inner(self) -> Result<W, EngineError> {
        let mutex = Arc::try_unwrap(self.inner).map_err(|_| EngineError::OutputInUse)?;
        Ok(mutex.into_inner())
    }
}
