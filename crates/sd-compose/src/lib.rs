//! sd-compose: Compose descriptors and their translation into remote actions
//!
//! Parses a compose-style YAML descriptor and an optional variable file,
//! expands `${NAME}` / `$NAME` placeholders, and maps each service onto a
//! fully resolved container-engine action.

pub mod descriptor;
pub mod envfile;
pub mod expand;
pub mod parser;
pub mod project;
pub mod translate;
pub mod validation;

pub use descriptor::{Command, Descriptor, Environment, ServiceDescriptor};
pub use envfile::{load_variable_file, load_variable_file_path, VariableSet};
pub use expand::{expand, expand_service};
pub use parser::{parse_descriptor, parse_descriptor_file};
pub use project::project_name_from_path;
pub use translate::{translate, translate_all, ActionKind, Defaults, RemoteAction, TranslateContext};
