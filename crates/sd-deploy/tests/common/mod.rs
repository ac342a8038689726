//! Scripted in-memory command channel

#![allow(dead_code)]

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use sd_core::error::ExecutionError;
use sd_remote::channel::OutputFn;
use sd_remote::{CommandChannel, ExecOutput};

/// How the channel answers a matching command
#[derive(Debug, Clone)]
pub enum Reply {
    /// Exit 0 with this output
    Ok(String),
    /// Exit with this status and output
    Exit(u32, String),
    /// Fail at the transport level
    Transport(String),
    /// Never finish; only cancellation ends it
    Hang,
}

/// Records every command line and answers from a list of rules
///
/// The first rule whose pattern is contained in the command line wins;
/// commands matching no rule succeed with empty output.
#[derive(Debug, Default)]
pub struct ScriptedChannel {
    rules: Vec<(String, Reply)>,
    pub calls: Vec<String>,
    closed: bool,
}

impl ScriptedChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, pattern: &str, reply: Reply) -> Self {
        self.rules.push((pattern.to_string(), reply));
        self
    }

    fn reply_for(&self, command_line: &str) -> Reply {
        self.rules
            .iter()
            .find(|(pattern, _)| command_line.contains(pattern.as_str()))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| Reply::Ok(String::new()))
    }
}

#[async_trait]
impl CommandChannel for ScriptedChannel {
    async fn execute(&mut self, command_line: &str) -> Result<ExecOutput, ExecutionError> {
        if self.closed {
            return Err(ExecutionError::ChannelClosed);
        }
        self.calls.push(command_line.to_string());

        match self.reply_for(command_line) {
            Reply::Ok(output) => Ok(ExecOutput::new(output.into_bytes())),
            Reply::Exit(status, output) => Err(ExecutionError::RemoteNonZeroExit {
                command: command_line.to_string(),
                status,
                output,
            }),
            Reply::Transport(reason) => Err(ExecutionError::Transport {
                command: command_line.to_string(),
                reason,
            }),
            Reply::Hang => std::future::pending().await,
        }
    }

    async fn stream(
        &mut self,
        command_line: &str,
        on_stdout: OutputFn<'_>,
        on_stderr: OutputFn<'_>,
        cancel: &CancellationToken,
    ) -> Result<(), ExecutionError> {
        if self.closed {
            return Err(ExecutionError::ChannelClosed);
        }
        self.calls.push(command_line.to_string());

        match self.reply_for(command_line) {
            Reply::Ok(output) => {
                for line in output.split_inclusive('\n') {
                    on_stdout(line.as_bytes());
                }
                Ok(())
            }
            Reply::Exit(status, output) => {
                on_stderr(output.as_bytes());
                Err(ExecutionError::RemoteNonZeroExit {
                    command: command_line.to_string(),
                    status,
                    output,
                })
            }
            Reply::Transport(reason) => Err(ExecutionError::Transport {
                command: command_line.to_string(),
                reason,
            }),
            Reply::Hang => {
                cancel.cancelled().await;
                Err(ExecutionError::Cancelled {
                    command: command_line.to_string(),
                })
            }
        }
    }

    async fn close(&mut self) {
        self.closed = true;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
