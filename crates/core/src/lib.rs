pub mod config;
pub mod error;
pub mod logging;

pub mod binding;
pub mod descriptor;
pub mod diagnostics;
pub mod graph;
pub mod processor;
pub mod resolver;
pub mod validation;

pub use config::{CompilerOptions, ValidationType};
pub use error::{BindscopeError, Result};
pub use graph::BindingGraph;
pub use processor::{RoundProcessor, ValidationReport, roots};
pub use resolver::BindingGraphFactory;
