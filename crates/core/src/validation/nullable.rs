//! Nullable bindings injected where null is not allowed.

use crate::config::CompilerOptions;
use crate::diagnostics::{DiagnosticReporter, format_binding};
use crate::error::Result;
use crate::graph::{BindingGraph, Node};
use bindscope_api::{Diagnostic, RequestKind};

pub const PLUGIN: &str = "bindscope/Nullable";

pub fn validate_nullable_dependencies(graph: &BindingGraph, options: &CompilerOptions) -> Result<Vec<Diagnostic>> {
    let mut reporter = DiagnosticReporter::new(graph, options, PLUGIN);
    let Some(severity) = options.nullable_validation.diagnostic_kind() else {
        return Ok(Vec::new());
    };
    for edge in graph.dependency_edges() {
        let Some(request) = edge.request() else {
            continue;
        };
        // Framework wrappers may hand out null freely.
        if request.nullable || request.kind != RequestKind::Instance {
            continue;
        }
        let Node::Binding(target) = graph.node(edge.target)? else {
            continue;
        };
        if !target.binding.nullable {
            continue;
        }
        let message = format!(
            "{} is not nullable, but is being provided by {}",
            target.binding.key,
            format_binding(&target.binding)
        );
        reporter.report_dependency(severity, &edge, message)?;
    }
    Ok(reporter.into_diagnostics())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValidationType;
    use crate::validation::test_support::*;
    use bindscope_api::Severity;
    use bindscope_plugin::InMemoryRepository;
    use bindscope_plugin::testing::*;

    fn repo(greeter_param: &[&str]) -> InMemoryRepository {
        InMemoryRepository::new()
            .with(
                component("App")
                    .install("NameModule")
                    .install("GreeterModule")
                    .entry_point("greeter", "Greeter")
                    .build(),
            )
            .and_then(|r| r.with(module("NameModule").method(provides("name", "String").annotated("Nullable")).build()))
            .and_then(|r| {
                r.with(
                    module("GreeterModule")
                        .method(provides("greeter", "Greeter").param_annotated("name", "String", greeter_param))
                        .build(),
                )
            })
            .and_then(|r| r.with(interface("Greeter").build()))
            .unwrap()
    }

    #[test]
    fn test_nullable_provision_into_non_nullable_parameter() {
        let repo = repo(&[]);
        let diagnostics = validate_nullable_dependencies(&graph(&repo, "App"), &defaults()).unwrap();
        assert_eq!(
            messages(&diagnostics),
            vec![
                "String is not nullable, but is being provided by @Provides @Nullable String NameModule.name()\
                 \n    String is injected at\
                 \n        GreeterModule.greeter(name)\
                 \n    Greeter is provided at\
                 \n        App.greeter()"
            ]
        );
        assert_eq!(diagnostics[0].severity, Severity::Error);
    }

    #[test]
    fn test_nullable_parameter_accepts_null() {
        let repo = repo(&["Nullable"]);
        assert!(validate_nullable_dependencies(&graph(&repo, "App"), &defaults()).unwrap().is_empty());
    }

    #[test]
    fn test_warning_severity() {
        let repo = repo(&[]);
        let options = CompilerOptions {
            nullable_validation: ValidationType::Warning,
            ..CompilerOptions::default()
        };
        let diagnostics = validate_nullable_dependencies(&graph(&repo, "App"), &options).unwrap();
        assert_eq!(diagnostics[0].severity, Severity::Warning);
    }
}
