//! Converts a [`ResolvedHierarchy`] into a [`BindingGraph`].
//!
//! Starting from every entry point, each request is followed to the bindings
//! resolved for it, and each binding's own requests are followed from the
//! component that owns it.

use super::{BindingGraph, BindingGraphInner, BindingNode, ComponentEntry, Edge, Node};
use crate::error::{BindscopeError, Result};
use crate::resolver::{OwnedBinding, ResolvedBindings, ResolvedHierarchy};
use bindscope_api::{Binding, BindingKind, ComponentPath, DependencyRequest, Key, RequestKind};
use indexmap::IndexMap;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use smol_str::SmolStr;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// Mutable graph builder
pub(crate) struct GraphBuilder {
    topology: StableDiGraph<Node, Edge>,
    components: IndexMap<ComponentPath, ComponentEntry>,
    binding_index: HashMap<(ComponentPath, Arc<Binding>), NodeIndex>,
    missing_index: HashMap<(ComponentPath, Key), NodeIndex>,
    edges: HashSet<(NodeIndex, NodeIndex, Edge)>,
    /// Binding nodes whose dependencies have not been followed yet.
    pending: VecDeque<NodeIndex>,
}

impl GraphBuilder {
    pub(crate) fn build(hierarchy: ResolvedHierarchy) -> Result<BindingGraph> {
        let root = hierarchy
            .root()
            .map(|c| c.path.clone())
            .ok_or_else(|| BindscopeError::Internal("resolved an empty hierarchy".to_string()))?;

        let mut builder = GraphBuilder {
            topology: StableDiGraph::new(),
            components: IndexMap::new(),
            binding_index: HashMap::new(),
            missing_index: HashMap::new(),
            edges: HashSet::new(),
            pending: VecDeque::new(),
        };

        for component in hierarchy.components {
            let node = builder.topology.add_node(Node::Component {
                path: component.path.clone(),
                real: component.descriptor.is_real_component(),
                subcomponent: component.descriptor.is_subcomponent(),
            });
            builder.components.insert(
                component.path.clone(),
                ComponentEntry {
                    node,
                    resolved: component,
                },
            );
        }

        let paths: Vec<ComponentPath> = builder.components.keys().cloned().collect();
        for path in &paths {
            builder.add_child_factory_edge(path);
            builder.add_entry_points(path);
            if hierarchy.full_binding_graph {
                builder.add_local_bindings(path);
            }
            builder.drain_pending();
        }

        tracing::debug!(
            "built binding graph for {}: {} nodes, {} edges",
            root,
            builder.topology.node_count(),
            builder.topology.edge_count()
        );
        Ok(BindingGraph::from_inner(BindingGraphInner {
            topology: builder.topology,
            root,
            components: builder.components,
            binding_index: builder.binding_index,
            missing_index: builder.missing_index,
            dependency_components: hierarchy.dependency_components,
            malformed: hierarchy.malformed,
            missing_hints: hierarchy.missing_hints,
            full_binding_graph: hierarchy.full_binding_graph,
        }))
    }

    fn add_edge(&mut self, from: NodeIndex, to: NodeIndex, edge: Edge) {
        if self.edges.insert((from, to, edge.clone())) {
            self.topology.add_edge(from, to, edge);
        }
    }

    fn add_child_factory_edge(&mut self, path: &ComponentPath) {
        let Some(entry) = self.components.get(path) else {
            return;
        };
        let (Some(parent), Some(method)) = (entry.parent(), entry.factory_method()) else {
            return;
        };
        let child = entry.node;
        let method = method.method.clone();
        if let Some(parent) = self.components.get(parent).map(|p| p.node) {
            self.add_edge(parent, child, Edge::ChildFactoryMethod { method });
        }
    }

    fn add_entry_points(&mut self, path: &ComponentPath) {
        let Some(entry) = self.components.get(path) else {
            return;
        };
        let source = entry.node;
        let requests: Vec<DependencyRequest> = entry
            .descriptor()
            .entry_points
            .iter()
            .map(|e| e.request.clone())
            .collect();
        for request in requests {
            for target in self.nodes_for(path, &request) {
                self.add_edge(
                    source,
                    target,
                    Edge::Dependency {
                        request: request.clone(),
                        entry_point: true,
                    },
                );
            }
        }
    }

    /// Every binding resolved locally, reachable or not.
    fn add_local_bindings(&mut self, path: &ComponentPath) {
        let Some(entry) = self.components.get(path) else {
            return;
        };
        let local: Vec<(OwnedBinding, Arc<ResolvedBindings>)> = entry
            .resolved
            .resolved
            .values()
            .filter(|r| &r.path == path)
            .flat_map(|r| r.bindings.iter().map(move |b| (b.clone(), r.clone())))
            .collect();
        for (owned, resolved) in local {
            self.binding_node(&owned, &resolved);
        }
    }

    fn drain_pending(&mut self) {
        while let Some(node) = self.pending.pop_front() {
            let Some(binding_node) = self.topology.node_weight(node).and_then(Node::as_binding) else {
                continue;
            };
            let owner = binding_node.path.clone();
            let binding = binding_node.binding.clone();
            let declaring_modules: Vec<SmolStr> = binding_node
                .subcomponent_declarations
                .iter()
                .map(|d| d.module.clone())
                .collect();

            for request in &binding.dependencies {
                for target in self.nodes_for(&owner, request) {
                    self.add_edge(
                        node,
                        target,
                        Edge::Dependency {
                            request: request.clone(),
                            entry_point: false,
                        },
                    );
                }
            }

            if let BindingKind::SubcomponentCreator { subcomponent } = &binding.kind
                && let Some(child) = self.components.get(&owner.child(subcomponent.clone()))
            {
                let child = child.node;
                self.add_edge(node, child, Edge::Subcomponent { declaring_modules });
            }
        }
    }

    /// The nodes satisfying `request` as seen from component `path`.
    fn nodes_for(&mut self, path: &ComponentPath, request: &DependencyRequest) -> Vec<NodeIndex> {
        match self.lookup(path, request) {
            Some(resolved) if !resolved.is_empty() => resolved
                .bindings
                .iter()
                .map(|owned| self.binding_node(owned, &resolved))
                .collect(),
            Some(resolved) => vec![self.missing_node(&resolved.path, &request.key)],
            None => vec![self.missing_node(path, &request.key)],
        }
    }

    fn lookup(&self, path: &ComponentPath, request: &DependencyRequest) -> Option<Arc<ResolvedBindings>> {
        if request.kind == RequestKind::MembersInjection {
            return self
                .components
                .get(path)
                .and_then(|c| c.resolved.members_injection.get(&request.key))
                .cloned();
        }
        let mut current = Some(path.clone());
        while let Some(p) = current {
            let entry = self.components.get(&p)?;
            if let Some(resolved) = entry.resolved.resolved.get(&request.key) {
                return Some(resolved.clone());
            }
            current = entry.parent().cloned();
        }
        None
    }

    fn binding_node(&mut self, owned: &OwnedBinding, resolved: &ResolvedBindings) -> NodeIndex {
        let index_key = (owned.owner.clone(), owned.binding.clone());
        if let Some(&idx) = self.binding_index.get(&index_key) {
            return idx;
        }
        let binding = &owned.binding;
        let node = BindingNode {
            path: owned.owner.clone(),
            binding: binding.clone(),
            multibinding_declarations: if binding.is_multibinding() {
                resolved.multibinding_declarations.clone()
            } else {
                Vec::new()
            },
            optional_declarations: if binding.is_optional() {
                resolved.optional_declarations.clone()
            } else {
                Vec::new()
            },
            subcomponent_declarations: if matches!(binding.kind, BindingKind::SubcomponentCreator { .. }) {
                resolved.subcomponent_declarations.clone()
            } else {
                Vec::new()
            },
        };
        let idx = self.topology.add_node(Node::Binding(node));
        self.binding_index.insert(index_key, idx);
        self.pending.push_back(idx);
        idx
    }

    fn missing_node(&mut self, path: &ComponentPath, key: &Key) -> NodeIndex {
        let index_key = (path.clone(), key.clone());
        if let Some(&idx) = self.missing_index.get(&index_key) {
            return idx;
        }
        let idx = self.topology.add_node(Node::Missing {
            path: path.clone(),
            key: key.clone(),
        });
        self.missing_index.insert(index_key, idx);
        idx
    }
}

#[cfg(test)]
mod tests {
    use crate::graph::Edge;
    use crate::resolver::BindingGraphFactory;
    use bindscope_api::{ComponentPath, Key, TypeRef};
    use bindscope_plugin::InMemoryRepository;
    use bindscope_plugin::testing::*;
    use smol_str::SmolStr;

    #[test]
    fn test_subcomponent_edge_from_creator_binding() {
        let repo = InMemoryRepository::new()
            .with(
                component("App")
                    .install("AppModule")
                    .entry_point("builder", "Child.Builder")
                    .build(),
            )
            .and_then(|r| r.with(module("AppModule").declares_subcomponent("Child").build()))
            .and_then(|r| r.with(subcomponent("Child").with_creator("Child.Builder").build()))
            .and_then(|r| r.with(creator("Child.Builder", "Child").build()))
            .unwrap();
        let graph = BindingGraphFactory::new(&repo).create("App", false).unwrap();
        let (creator, node) = graph.bindings(&Key::new(TypeRef::declared("Child.Builder")))[0];
        assert_eq!(node.subcomponent_declarations.len(), 1);
        let child = graph
            .component_node(&ComponentPath::root("App").child("Child"))
            .unwrap();
        let edges = graph.out_edges(creator);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].target, child);
        assert!(matches!(
            edges[0].edge,
            Edge::Subcomponent { declaring_modules } if declaring_modules == &vec![SmolStr::from("AppModule")]
        ));
    }

    #[test]
    fn test_members_injection_entry_point() {
        let repo = InMemoryRepository::new()
            .with(
                component("App")
                    .method(method("inject", "void").param("activity", "MainActivity").abstract_method())
                    .build(),
            )
            .and_then(|r| r.with(class("MainActivity").inject_field("presenter", "Presenter").build()))
            .and_then(|r| r.with(class("Presenter").inject_constructor(&[]).build()))
            .unwrap();
        let graph = BindingGraphFactory::new(&repo).create("App", false).unwrap();
        assert_eq!(graph.binding_nodes().count(), 2);
        assert_eq!(graph.missing_binding_nodes().count(), 0);
    }

    #[test]
    fn test_full_graph_includes_unreachable_bindings() {
        let repo = InMemoryRepository::new()
            .with(module("NetModule").provides("client", "HttpClient", &[("dns", "Dns")]).build())
            .unwrap();
        let graph = BindingGraphFactory::new(&repo).create("NetModule", true).unwrap();
        assert!(graph.is_full_binding_graph());
        assert_eq!(graph.binding_nodes().count(), 1);
        let missing: Vec<_> = graph.missing_binding_nodes().map(|(_, _, k)| k.to_string()).collect();
        assert_eq!(missing, vec!["Dns"]);
        assert!(!graph.root_component().descriptor().is_real_component());
    }
}
