//! Binding graph validators.
//!
//! Each validator is a plain function over a finished [`BindingGraph`]. The
//! graph is never modified, so the order validators run in only affects the
//! order of the diagnostics they produce.

mod cycles;
mod duplicates;
mod hierarchy;
mod map_keys;
mod missing;
mod modules;
mod nullable;
mod scoping;
mod subcomponents;

pub use cycles::validate_dependency_cycles;
pub use duplicates::validate_duplicate_bindings;
pub use hierarchy::validate_component_hierarchy;
pub use map_keys::validate_map_keys;
pub use missing::validate_missing_bindings;
pub use modules::validate_modules;
pub use nullable::validate_nullable_dependencies;
pub use scoping::validate_binding_scopes;
pub use subcomponents::validate_subcomponent_factory_methods;

use crate::config::CompilerOptions;
use crate::error::Result;
use crate::graph::BindingGraph;
use bindscope_api::Diagnostic;

pub type Validator = fn(&BindingGraph, &CompilerOptions) -> Result<Vec<Diagnostic>>;

/// Every built-in validator, in reporting order.
pub fn default_validators() -> Vec<Validator> {
    vec![
        validate_modules,
        validate_component_hierarchy,
        validate_dependency_cycles,
        validate_duplicate_bindings,
        validate_missing_bindings,
        validate_nullable_dependencies,
        validate_binding_scopes,
        validate_map_keys,
        validate_subcomponent_factory_methods,
    ]
}

/// Runs `validators` over `graph` and concatenates their findings.
pub fn validate(
    graph: &BindingGraph,
    options: &CompilerOptions,
    validators: &[Validator],
) -> Result<Vec<Diagnostic>> {
    let mut diagnostics = Vec::new();
    for validator in validators {
        diagnostics.extend(validator(graph, options)?);
    }
    tracing::debug!(
        "validated {}: {} diagnostics",
        graph.root(),
        diagnostics.len()
    );
    Ok(diagnostics)
}
