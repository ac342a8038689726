//! sd-remote: Remote command channel for syno-deploy
//!
//! Owns a single authenticated SSH session to the remote host and runs
//! container-engine command lines over it, either to completion with the
//! combined output captured or streamed until the process ends or the
//! caller cancels.

pub mod channel;
pub mod ssh;

pub use channel::{CommandChannel, Detached, ExecOutput};
pub use ssh::{ConnectOptions, SshChannel};
