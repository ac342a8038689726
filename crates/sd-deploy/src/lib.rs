//! sd-deploy: Deployment over a command channel
//!
//! The [`Deployer`] walks a descriptor service by service, pulling images
//! and creating containers over a single [`CommandChannel`], and stops at
//! the first failure. [`Engine`] wraps the single-container operations the
//! command-line front end exposes.
//!
//! [`CommandChannel`]: sd_remote::CommandChannel

pub mod container;
pub mod driver;

pub use container::{ContainerSummary, Engine};
pub use driver::{DeployOptions, DeployReport, DeployedService, Deployer, RunState};
