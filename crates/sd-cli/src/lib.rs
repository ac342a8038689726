//! sd-cli: Command-line interface for syno-deploy
//!
//! Provides the `syno-deploy` CLI for deploying compose files and managing
//! single containers on a remote NAS.

pub mod commands;
pub mod output;
