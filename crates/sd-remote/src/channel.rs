//! Command channel abstraction

use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use sd_core::error::ExecutionError;

/// Output of a command that ran to completion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    /// Combined stdout and stderr, in arrival order
    pub bytes: Bytes,
}

impl ExecOutput {
    /// Create output from raw bytes
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    /// Output decoded lossily as UTF-8
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    /// Output with surrounding whitespace removed
    pub fn trimmed(&self) -> String {
        self.text().trim().to_string()
    }
}

/// Sink for streamed output chunks
pub type OutputFn<'a> = &'a mut (dyn FnMut(&[u8]) + Send);

/// A channel that runs one command line at a time on a remote host
///
/// Every method takes `&mut self`: a channel is single-owner and never has
/// more than one command in flight. The channel performs no escaping or
/// interpretation of the command line.
#[async_trait]
pub trait CommandChannel: Send {
    /// Run a command to completion and return its combined output
    ///
    /// A non-zero exit is reported as [`ExecutionError::RemoteNonZeroExit`]
    /// with the captured output attached.
    async fn execute(&mut self, command_line: &str) -> Result<ExecOutput, ExecutionError>;

    /// Run a command, forwarding output as it arrives
    ///
    /// Returns when the remote process ends. Cancelling `cancel` closes the
    /// sub-session and yields [`ExecutionError::Cancelled`].
    async fn stream(
        &mut self,
        command_line: &str,
        on_stdout: OutputFn<'_>,
        on_stderr: OutputFn<'_>,
        cancel: &CancellationToken,
    ) -> Result<(), ExecutionError>;

    /// Release the transport; calling it again is a no-op
    async fn close(&mut self);

    /// Whether [`close`](Self::close) has been called or the transport dropped
    fn is_closed(&self) -> bool;
}

#[async_trait]
impl<C: CommandChannel + ?Sized> CommandChannel for &mut C {
    async fn execute(&mut self, command_line: &str) -> Result<ExecOutput, ExecutionError> {
        (**self).execute(command_line).await
    }

    async fn stream(
        &mut self,
        command_line: &str,
        on_stdout: OutputFn<'_>,
        on_stderr: OutputFn<'_>,
        cancel: &CancellationToken,
    ) -> Result<(), ExecutionError> {
        (**self).stream(command_line, on_stdout, on_stderr, cancel).await
    }

    async fn close(&mut self) {
        (**self).close().await
    }

    fn is_closed(&self) -> bool {
        (**self).is_closed()
    }
}

/// A channel that was never connected
///
/// Every call fails with [`ExecutionError::ChannelClosed`]. Dry runs use it
/// to plan a deployment without reaching the remote host.
#[derive(Debug, Clone, Copy, Default)]
pub struct Detached;

#[async_trait]
impl CommandChannel for Detached {
    async fn execute(&mut self, _command_line: &str) -> Result<ExecOutput, ExecutionError> {
        Err(ExecutionError::ChannelClosed)
    }

    async fn stream(
        &mut self,
        _command_line: &str,
        _on_stdout: OutputFn<'_>,
        _on_stderr: OutputFn<'_>,
        _cancel: &CancellationToken,
    ) -> Result<(), ExecutionError> {
        Err(ExecutionError::ChannelClosed)
    }

    async fn close(&mut self) {}

    fn is_closed(&self) -> bool {
        true
    }
}
