//! Diagnostic reporting for validators.
//!
//! A [`DiagnosticReporter`] turns a validator's finding into a [`Diagnostic`]
//! whose message ends with a dependency trace: the chain of requests from the
//! offending binding back to the entry point that needs it. Formatting of
//! requests and declarations lives here so every validator renders them the
//! same way.

use crate::config::CompilerOptions;
use crate::error::Result;
use crate::graph::{BindingGraph, BindingNode, EdgeView, Node};
use bindscope_api::{
    Binding, BindingKind, ComponentPath, ContributionType, DependencyRequest, Diagnostic,
    ElementKind, ElementRef, RequestKind, Severity,
};
use petgraph::stable_graph::NodeIndex;
use smol_str::SmolStr;
use std::collections::HashSet;

pub const INDENT: &str = "    ";
pub const DOUBLE_INDENT: &str = "        ";

/// Lists longer than this are cut off with "and N others".
pub const LIST_LIMIT: usize = 10;

/// Collects the diagnostics of one validator run over one graph.
pub struct DiagnosticReporter<'g> {
    graph: &'g BindingGraph,
    options: &'g CompilerOptions,
    plugin: SmolStr,
    diagnostics: Vec<Diagnostic>,
}

impl<'g> DiagnosticReporter<'g> {
    pub fn new(graph: &'g BindingGraph, options: &'g CompilerOptions, plugin: &str) -> Self {
        Self {
            graph,
            options,
            plugin: SmolStr::from(plugin),
            diagnostics: Vec::new(),
        }
    }

    pub fn graph(&self) -> &'g BindingGraph {
        self.graph
    }

    /// A finding about a component as a whole.
    pub fn report_component(&mut self, severity: Severity, path: &ComponentPath, message: impl Into<String>) {
        let mut message = message.into();
        if !path.at_root() {
            message.push_str(&format!(" [{}]", path));
        }
        let element = ElementRef::of_type(path.current().clone());
        self.push(severity, message, Some(element), path.clone());
    }

    /// A finding about a binding or missing key, traced to the entry points
    /// that depend on it.
    pub fn report_binding(&mut self, severity: Severity, node: NodeIndex, message: impl Into<String>) -> Result<()> {
        let mut message = message.into();
        self.append_trace(&mut message, node)?;
        let path = self.graph.node(node)?.component_path().clone();
        self.push(severity, message, Some(self.root_element()), path);
        Ok(())
    }

    /// A finding about one request, traced from the requesting binding.
    pub fn report_dependency(&mut self, severity: Severity, edge: &EdgeView<'_>, message: impl Into<String>) -> Result<()> {
        let mut message = message.into();
        if edge.edge.is_entry_point() {
            message.push_str(&self.format_entry_point(edge)?);
        } else {
            message.push_str(&self.format_edge(edge)?);
            self.append_trace(&mut message, edge.source)?;
        }
        let path = self.graph.node(edge.source)?.component_path().clone();
        self.push(severity, message, Some(self.root_element()), path);
        Ok(())
    }

    /// A finding about `node` as reached from one particular entry point.
    ///
    /// Unlike [`report_binding`](Self::report_binding) the other entry points
    /// depending on `node` are not listed.
    pub fn report_from_entry_point(
        &mut self,
        severity: Severity,
        entry_point: &EdgeView<'_>,
        node: NodeIndex,
        message: impl Into<String>,
    ) -> Result<()> {
        let mut message = message.into();
        if !self.graph.is_full_binding_graph() {
            let path = self.graph.shortest_path(entry_point.target, node)?;
            message.push_str(&self.format_path(entry_point, &path)?);
        }
        let path = self.graph.node(entry_point.source)?.component_path().clone();
        self.push(severity, message, Some(self.root_element()), path);
        Ok(())
    }

    /// A finding about the parent method that creates the component at `child`.
    pub fn report_subcomponent_factory_method(
        &mut self,
        severity: Severity,
        method: &ElementRef,
        child: &ComponentPath,
        message: impl Into<String>,
    ) {
        let path = child.parent().unwrap_or_else(|| child.clone());
        self.push(severity, message.into(), Some(method.clone()), path);
    }

    /// A finding about a declaration that never made it into the graph.
    pub fn report_at(&mut self, severity: Severity, element: &ElementRef, path: &ComponentPath, message: impl Into<String>) {
        self.push(severity, message.into(), Some(element.clone()), path.clone());
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    fn root_element(&self) -> ElementRef {
        ElementRef::of_type(self.graph.root().current().clone())
    }

    fn push(&mut self, severity: Severity, message: String, element: Option<ElementRef>, path: ComponentPath) {
        // Full binding graphs report errors at the configured severity.
        let severity = if self.graph.is_full_binding_graph() && severity == Severity::Error {
            match self.options.full_binding_graph_validation.diagnostic_kind() {
                Some(kind) => kind,
                None => return,
            }
        } else {
            severity
        };
        tracing::trace!("[{}] {}: {}", self.plugin, severity, message);
        self.diagnostics.push(Diagnostic {
            severity,
            plugin: self.plugin.clone(),
            message,
            primary_element: element,
            component_path: path,
        });
    }

    /// Appends the path from the nearest entry point to `node`, then every
    /// other entry point depending on it.
    fn append_trace(&self, message: &mut String, node: NodeIndex) -> Result<()> {
        if self.graph.is_full_binding_graph() {
            return Ok(());
        }
        let mut candidates = Vec::new();
        for entry_point in self.graph.entry_point_edges_depending_on(node) {
            let path = self.graph.shortest_path(entry_point.target, node)?;
            if path.is_empty() {
                continue;
            }
            let depth = self.graph.node(entry_point.source)?.component_path().depth();
            candidates.push((depth, path, entry_point));
        }
        candidates.sort_by_key(|(depth, path, ep)| (*depth, path.len(), ep.id.index()));
        let Some((_, path, nearest)) = candidates.first() else {
            return Ok(());
        };
        message.push_str(&self.format_path(nearest, path)?);

        let others: Vec<String> = candidates[1..]
            .iter()
            .map(|(_, _, ep)| self.entry_point_name(ep))
            .collect::<Result<_>>()?;
        let mut others: Vec<String> = others.into_iter().filter(|o| !o.is_empty()).collect();
        let mut seen = HashSet::new();
        others.retain(|o| seen.insert(o.clone()));
        if !others.is_empty() {
            message.push_str("\n\nThe following other entry points also depend on it:");
            message.push_str(&format_indented_list(&others, 1));
        }
        Ok(())
    }

    /// Requests along `path` (which starts at the entry point's target),
    /// innermost first, followed by the entry point itself.
    fn format_path(&self, entry_point: &EdgeView<'_>, path: &[NodeIndex]) -> Result<String> {
        let mut out = String::new();
        for pair in path.windows(2).rev() {
            if let Some(edge) = self.graph.dependency_edge_between(pair[0], pair[1]) {
                out.push_str(&self.format_edge(&edge)?);
            }
        }
        out.push_str(&self.format_entry_point(entry_point)?);
        Ok(out)
    }

    fn format_entry_point(&self, entry_point: &EdgeView<'_>) -> Result<String> {
        let mut out = entry_point.request().map(format_request).unwrap_or_default();
        let path = self.graph.node(entry_point.source)?.component_path();
        if !out.is_empty() && !path.at_root() {
            out.push_str(&format!(" [{}]", path));
        }
        Ok(out)
    }

    fn entry_point_name(&self, entry_point: &EdgeView<'_>) -> Result<String> {
        let Some(element) = entry_point.request().and_then(|r| r.element.as_ref()) else {
            return Ok(String::new());
        };
        let path = self.graph.node(entry_point.source)?.component_path();
        Ok(if path.at_root() {
            element.to_string()
        } else {
            format!("{} [{}]", element, path)
        })
    }

    /// One request line. Requests made by `Optional` bindings point at the
    /// `@BindsOptionalOf` declaration instead.
    pub fn format_edge(&self, edge: &EdgeView<'_>) -> Result<String> {
        if let Node::Binding(source) = self.graph.node(edge.source)?
            && source.binding.is_optional()
            && let Some(first) = source.optional_declarations.first()
        {
            let mut out = format!(
                "\n{INDENT}@BindsOptionalOf {} is declared at\n{DOUBLE_INDENT}{}",
                first.key.ty, first.element
            );
            if source.optional_declarations.len() > 1 {
                out.push_str(", among others");
            }
            return Ok(out);
        }
        Ok(edge.request().map(format_request).unwrap_or_default())
    }

    /// The declarations behind binding nodes, sorted and deduplicated.
    ///
    /// Synthetic multibindings are expanded into their declarations and their
    /// contributions.
    pub fn format_declarations(&self, nodes: &[NodeIndex]) -> Result<Vec<String>> {
        let mut lines = Vec::new();
        let mut visited = HashSet::new();
        for &node in nodes {
            self.collect_declarations(node, &mut visited, &mut lines)?;
        }
        lines.sort_by(|a, b| {
            (a.module.is_none(), &a.module, &a.name, &a.text).cmp(&(b.module.is_none(), &b.module, &b.name, &b.text))
        });
        let mut seen = HashSet::new();
        Ok(lines
            .into_iter()
            .filter(|l| seen.insert(l.text.clone()))
            .map(|l| l.text)
            .collect())
    }

    fn collect_declarations(
        &self,
        node: NodeIndex,
        visited: &mut HashSet<NodeIndex>,
        lines: &mut Vec<DeclarationLine>,
    ) -> Result<()> {
        if !visited.insert(node) {
            return Ok(());
        }
        let Node::Binding(binding_node) = self.graph.node(node)? else {
            return Ok(());
        };
        lines.extend(node_declarations(binding_node));
        if binding_node.binding.is_multibinding() {
            for successor in self.graph.successors(node) {
                self.collect_declarations(successor, visited, lines)?;
            }
        }
        Ok(())
    }
}

struct DeclarationLine {
    module: Option<SmolStr>,
    name: SmolStr,
    text: String,
}

fn node_declarations(node: &BindingNode) -> Vec<DeclarationLine> {
    let binding = &node.binding;
    match &binding.kind {
        BindingKind::MultiboundSet | BindingKind::MultiboundMap => node
            .multibinding_declarations
            .iter()
            .map(|d| DeclarationLine {
                module: Some(d.module.clone()),
                name: d.element.name.clone(),
                text: format!("@Multibinds {} {}", d.key.ty, d.element),
            })
            .collect(),
        BindingKind::OptionalPresent | BindingKind::OptionalAbsent => node
            .optional_declarations
            .iter()
            .map(|d| DeclarationLine {
                module: Some(d.module.clone()),
                name: d.element.name.clone(),
                text: format!("@BindsOptionalOf {} {}", d.key.ty, d.element),
            })
            .collect(),
        BindingKind::SubcomponentCreator { subcomponent } if !node.subcomponent_declarations.is_empty() => node
            .subcomponent_declarations
            .iter()
            .map(|d| DeclarationLine {
                module: Some(d.module.clone()),
                name: subcomponent.clone(),
                text: format!("@Module(subcomponents = {}) for {}", d.subcomponent, d.module),
            })
            .collect(),
        _ => vec![DeclarationLine {
            module: binding.contributing_module().cloned(),
            name: binding
                .binding_element()
                .map(|e| e.name.clone())
                .unwrap_or_default(),
            text: format_binding(binding),
        }],
    }
}

/// A binding as its declaration reads in source.
pub fn format_binding(binding: &Binding) -> String {
    match &binding.kind {
        BindingKind::Provision { method, .. }
        | BindingKind::Production { method, .. }
        | BindingKind::Delegate { method, .. } => {
            let annotation = match binding.kind {
                BindingKind::Production { .. } => "@Produces",
                BindingKind::Delegate { .. } => "@Binds",
                _ => "@Provides",
            };
            let mut out = String::from(annotation);
            if let Some(scope) = &binding.scope {
                out.push_str(&format!(" {}", scope));
            }
            if binding.nullable {
                out.push_str(" @Nullable");
            }
            let key = &binding.key;
            let returned = match binding.contribution_type() {
                ContributionType::Unique => &key.ty,
                ContributionType::IntoSet => {
                    out.push_str(" @IntoSet");
                    key.ty.set_element().unwrap_or(&key.ty)
                }
                ContributionType::ElementsIntoSet => {
                    out.push_str(" @ElementsIntoSet");
                    &key.ty
                }
                ContributionType::IntoMap => {
                    out.push_str(" @IntoMap");
                    if let Some(map_key) = binding.map_key() {
                        out.push_str(&format!(" {}", map_key));
                    }
                    key.ty.map_entry().map(|(_, v)| v).unwrap_or(&key.ty)
                }
            };
            if let Some(qualifier) = &key.qualifier {
                out.push_str(&format!(" {}", qualifier));
            }
            out.push_str(&format!(" {} {}", returned, method));
            out
        }
        BindingKind::Injection { constructor } => format!("@Inject {}", constructor),
        BindingKind::BoundInstance { element } => format!("@BindsInstance {}", element),
        BindingKind::ComponentProvision { method, .. } => format!("{} {}", binding.key.ty, method),
        BindingKind::ComponentInstance { component } => component.to_string(),
        BindingKind::ComponentDependency { dependency } => dependency.to_string(),
        _ => binding.key.to_string(),
    }
}

/// One line of a dependency trace, or an empty string for requests with no
/// source element to point at.
pub fn format_request(request: &DependencyRequest) -> String {
    let Some(element) = &request.element else {
        return String::new();
    };
    match &element.kind {
        ElementKind::Type => String::new(),
        ElementKind::Method { .. } => {
            let verb = match request.kind {
                RequestKind::Future | RequestKind::Producer | RequestKind::Produced => "produced",
                RequestKind::MembersInjection => "injected",
                _ => "provided",
            };
            format!("\n{INDENT}{} is {verb} at\n{DOUBLE_INDENT}{}", request.key, element)
        }
        ElementKind::Parameter { .. } | ElementKind::Field | ElementKind::Constructor { .. } => {
            format!(
                "\n{INDENT}{} is injected at\n{DOUBLE_INDENT}{}",
                requested_type(request),
                element
            )
        }
    }
}

/// The type as written at the request site: qualifier, framework wrapper and key type.
fn requested_type(request: &DependencyRequest) -> String {
    let ty = &request.key.ty;
    let written = match request.kind {
        RequestKind::Instance | RequestKind::MembersInjection => ty.to_string(),
        RequestKind::Provider => format!("Provider<{}>", ty),
        RequestKind::Lazy => format!("Lazy<{}>", ty),
        RequestKind::ProviderOfLazy => format!("Provider<Lazy<{}>>", ty),
        RequestKind::Producer => format!("Producer<{}>", ty),
        RequestKind::Produced => format!("Produced<{}>", ty),
        RequestKind::Future => format!("ListenableFuture<{}>", ty),
    };
    match &request.key.qualifier {
        Some(qualifier) => format!("{} {}", qualifier, written),
        None => written,
    }
}

/// Each item on its own line, indented `level` times, capped at [`LIST_LIMIT`].
pub fn format_indented_list(items: &[String], level: usize) -> String {
    let indent = INDENT.repeat(level);
    let mut out = String::new();
    for item in items.iter().take(LIST_LIMIT) {
        out.push('\n');
        out.push_str(&indent);
        out.push_str(item);
    }
    if items.len() > LIST_LIMIT {
        let rest = items.len() - LIST_LIMIT;
        out.push('\n');
        out.push_str(&indent);
        out.push_str(&format!("and {} other{}", rest, if rest == 1 { "" } else { "s" }));
    }
    out
}
