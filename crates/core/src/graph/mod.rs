//! Arc-wrapped immutable binding graph
//!
//! A [`BindingGraph`] is a cheap-to-clone view of one resolved component
//! hierarchy. Nodes are components, bindings and missing keys; edges are
//! dependency requests, child factory methods and module-declared
//! subcomponents. Validators only ever read it.

mod builder;

use crate::binding::{Declaration, MalformedDeclaration, SubcomponentDeclaration};
use crate::descriptor::{ChildFactoryMethod, ComponentDescriptor, DependencyComponent};
use crate::error::{BindscopeError, Result};
use crate::resolver::{MissingBindingHints, ResolvedBindings, ResolvedComponent, ResolvedHierarchy};
use bindscope_api::{Binding, ComponentPath, DependencyRequest, ElementRef, Key};
use indexmap::IndexMap;
use petgraph::Direction;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use smol_str::SmolStr;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// A binding as it appears in the graph, owned by exactly one component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingNode {
    /// The owning component.
    pub path: ComponentPath,
    pub binding: Arc<Binding>,
    pub multibinding_declarations: Vec<Declaration>,
    pub optional_declarations: Vec<Declaration>,
    pub subcomponent_declarations: Vec<SubcomponentDeclaration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Component {
        path: ComponentPath,
        /// False for a module validated on its own.
        real: bool,
        subcomponent: bool,
    },
    Binding(BindingNode),
    /// A key nothing binds, at the component that requested it.
    Missing { path: ComponentPath, key: Key },
}

impl Node {
    pub fn component_path(&self) -> &ComponentPath {
        match self {
            Node::Component { path, .. } | Node::Missing { path, .. } => path,
            Node::Binding(node) => &node.path,
        }
    }

    pub fn as_binding(&self) -> Option<&BindingNode> {
        match self {
            Node::Binding(node) => Some(node),
            _ => None,
        }
    }

    pub fn key(&self) -> Option<&Key> {
        match self {
            Node::Binding(node) => Some(&node.binding.key),
            Node::Missing { key, .. } => Some(key),
            Node::Component { .. } => None,
        }
    }

    pub fn is_component(&self) -> bool {
        matches!(self, Node::Component { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Edge {
    /// From a component (entry point) or a binding to what satisfies the request.
    Dependency {
        request: DependencyRequest,
        entry_point: bool,
    },
    /// From a parent component to a child it creates through `method`.
    ChildFactoryMethod { method: ElementRef },
    /// From a subcomponent creator binding to the subcomponent.
    Subcomponent { declaring_modules: Vec<SmolStr> },
}

impl Edge {
    pub fn as_dependency(&self) -> Option<&DependencyRequest> {
        match self {
            Edge::Dependency { request, .. } => Some(request),
            _ => None,
        }
    }

    pub fn is_entry_point(&self) -> bool {
        matches!(self, Edge::Dependency { entry_point: true, .. })
    }
}

/// A borrowed edge together with its endpoints.
#[derive(Debug, Clone, Copy)]
pub struct EdgeView<'g> {
    pub id: EdgeIndex,
    pub source: NodeIndex,
    pub target: NodeIndex,
    pub edge: &'g Edge,
}

impl EdgeView<'_> {
    pub fn request(&self) -> Option<&DependencyRequest> {
        self.edge.as_dependency()
    }
}

/// A component of the graph and everything resolution recorded for it.
#[derive(Debug, Clone)]
pub struct ComponentEntry {
    pub node: NodeIndex,
    pub resolved: ResolvedComponent,
}

impl ComponentEntry {
    pub fn path(&self) -> &ComponentPath {
        &self.resolved.path
    }

    pub fn parent(&self) -> Option<&ComponentPath> {
        self.resolved.parent.as_ref()
    }

    pub fn descriptor(&self) -> &Arc<ComponentDescriptor> {
        &self.resolved.descriptor
    }

    pub fn factory_method(&self) -> Option<&ChildFactoryMethod> {
        self.resolved.factory_method.as_ref()
    }
}

/// Immutable binding graph (cheap to clone via Arc)
#[derive(Debug, Clone)]
pub struct BindingGraph {
    inner: Arc<BindingGraphInner>,
}

#[derive(Debug)]
pub(crate) struct BindingGraphInner {
    pub(crate) topology: StableDiGraph<Node, Edge>,
    pub(crate) root: ComponentPath,
    pub(crate) components: IndexMap<ComponentPath, ComponentEntry>,
    /// (owner, binding) -> node
    pub(crate) binding_index: HashMap<(ComponentPath, Arc<Binding>), NodeIndex>,
    /// (requesting component, key) -> node
    pub(crate) missing_index: HashMap<(ComponentPath, Key), NodeIndex>,
    pub(crate) dependency_components: Vec<DependencyComponent>,
    pub(crate) malformed: Vec<MalformedDeclaration>,
    pub(crate) missing_hints: HashMap<Key, MissingBindingHints>,
    pub(crate) full_binding_graph: bool,
}

impl BindingGraph {
    /// Converts a resolved hierarchy into its graph.
    pub fn from_hierarchy(hierarchy: ResolvedHierarchy) -> Result<Self> {
        builder::GraphBuilder::build(hierarchy)
    }

    pub(crate) fn from_inner(inner: BindingGraphInner) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    // ---- Hierarchy ----

    pub fn root(&self) -> &ComponentPath {
        &self.inner.root
    }

    pub fn root_component(&self) -> &ComponentEntry {
        // The builder refuses empty hierarchies, and the root is inserted first.
        &self.inner.components[0]
    }

    pub fn is_full_binding_graph(&self) -> bool {
        self.inner.full_binding_graph
    }

    /// Every component, root first and children depth first.
    pub fn components(&self) -> impl Iterator<Item = &ComponentEntry> {
        self.inner.components.values()
    }

    pub fn component(&self, path: &ComponentPath) -> Option<&ComponentEntry> {
        self.inner.components.get(path)
    }

    pub fn component_node(&self, path: &ComponentPath) -> Option<NodeIndex> {
        self.component(path).map(|c| c.node)
    }

    /// Paths of every component below the root.
    pub fn subgraph_paths(&self) -> Vec<&ComponentPath> {
        self.inner
            .components
            .keys()
            .filter(|p| *p != &self.inner.root)
            .collect()
    }

    pub fn child_components(&self, path: &ComponentPath) -> Vec<&ComponentEntry> {
        self.components()
            .filter(|c| c.parent() == Some(path))
            .collect()
    }

    /// Components the root depends on through `dependencies = ...`, root included.
    pub fn dependency_components(&self) -> &[DependencyComponent] {
        &self.inner.dependency_components
    }

    pub fn malformed(&self) -> &[MalformedDeclaration] {
        &self.inner.malformed
    }

    /// What the declarations say about a key nothing binds.
    pub fn missing_binding_hints(&self, key: &Key) -> MissingBindingHints {
        self.inner.missing_hints.get(key).copied().unwrap_or_default()
    }

    /// The bindings visible for `key` from `path`, looking through ancestors.
    pub fn resolved_bindings(&self, path: &ComponentPath, key: &Key) -> Option<&Arc<ResolvedBindings>> {
        let mut current = Some(path.clone());
        while let Some(p) = current {
            let entry = self.component(&p)?;
            if let Some(resolved) = entry.resolved.resolved.get(key) {
                return Some(resolved);
            }
            current = entry.parent().cloned();
        }
        None
    }

    // ---- Nodes ----

    pub fn topology(&self) -> &StableDiGraph<Node, Edge> {
        &self.inner.topology
    }

    pub fn node(&self, idx: NodeIndex) -> Result<&Node> {
        self.inner
            .topology
            .node_weight(idx)
            .ok_or_else(|| BindscopeError::NodeNotInGraph(format!("{:?}", idx)))
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeIndex, &Node)> {
        self.inner
            .topology
            .node_indices()
            .filter_map(|idx| self.inner.topology.node_weight(idx).map(|n| (idx, n)))
    }

    pub fn binding_nodes(&self) -> impl Iterator<Item = (NodeIndex, &BindingNode)> {
        self.nodes().filter_map(|(idx, n)| n.as_binding().map(|b| (idx, b)))
    }

    pub fn missing_binding_nodes(&self) -> impl Iterator<Item = (NodeIndex, &ComponentPath, &Key)> {
        self.nodes().filter_map(|(idx, n)| match n {
            Node::Missing { path, key } => Some((idx, path, key)),
            _ => None,
        })
    }

    /// Binding nodes for `key`, in whichever components own them.
    pub fn bindings(&self, key: &Key) -> Vec<(NodeIndex, &BindingNode)> {
        self.binding_nodes()
            .filter(|(_, b)| &b.binding.key == key)
            .collect()
    }

    pub fn binding_node(&self, owner: &ComponentPath, binding: &Arc<Binding>) -> Option<NodeIndex> {
        self.inner
            .binding_index
            .get(&(owner.clone(), binding.clone()))
            .copied()
    }

    pub fn missing_node(&self, path: &ComponentPath, key: &Key) -> Option<NodeIndex> {
        self.inner
            .missing_index
            .get(&(path.clone(), key.clone()))
            .copied()
    }

    pub fn node_count(&self) -> usize {
        self.inner.topology.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.topology.edge_count()
    }

    // ---- Edges ----

    pub fn edge(&self, id: EdgeIndex) -> Result<EdgeView<'_>> {
        let (source, target) = self
            .inner
            .topology
            .edge_endpoints(id)
            .ok_or_else(|| BindscopeError::NodeNotInGraph(format!("{:?}", id)))?;
        let edge = self
            .inner
            .topology
            .edge_weight(id)
            .ok_or_else(|| BindscopeError::NodeNotInGraph(format!("{:?}", id)))?;
        Ok(EdgeView {
            id,
            source,
            target,
            edge,
        })
    }

    fn edges_directed(&self, idx: NodeIndex, direction: Direction) -> Vec<EdgeView<'_>> {
        // StableGraph yields adjacent edges newest first.
        let mut edges: Vec<EdgeView<'_>> = self
            .inner
            .topology
            .edges_directed(idx, direction)
            .map(|e| EdgeView {
                id: e.id(),
                source: e.source(),
                target: e.target(),
                edge: e.weight(),
            })
            .collect();
        edges.sort_by_key(|e| e.id.index());
        edges
    }

    /// Outgoing edges in insertion order.
    pub fn out_edges(&self, idx: NodeIndex) -> Vec<EdgeView<'_>> {
        self.edges_directed(idx, Direction::Outgoing)
    }

    /// Incoming edges in insertion order.
    pub fn in_edges(&self, idx: NodeIndex) -> Vec<EdgeView<'_>> {
        self.edges_directed(idx, Direction::Incoming)
    }

    pub fn successors(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut seen = HashSet::new();
        self.out_edges(idx)
            .into_iter()
            .map(|e| e.target)
            .filter(|n| seen.insert(*n))
            .collect()
    }

    pub fn predecessors(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut seen = HashSet::new();
        self.in_edges(idx)
            .into_iter()
            .map(|e| e.source)
            .filter(|n| seen.insert(*n))
            .collect()
    }

    fn all_edges(&self) -> Vec<EdgeView<'_>> {
        let mut edges: Vec<EdgeView<'_>> = self
            .inner
            .topology
            .edge_indices()
            .filter_map(|id| self.edge(id).ok())
            .collect();
        edges.sort_by_key(|e| e.id.index());
        edges
    }

    pub fn dependency_edges(&self) -> Vec<EdgeView<'_>> {
        self.all_edges()
            .into_iter()
            .filter(|e| e.request().is_some())
            .collect()
    }

    pub fn entry_point_edges(&self) -> Vec<EdgeView<'_>> {
        self.all_edges()
            .into_iter()
            .filter(|e| e.edge.is_entry_point())
            .collect()
    }

    /// Entry point edges from which `node` is reachable through dependency edges.
    pub fn entry_point_edges_depending_on(&self, node: NodeIndex) -> Vec<EdgeView<'_>> {
        let mut visited = HashSet::from([node]);
        let mut queue = VecDeque::from([node]);
        let mut entry_points = Vec::new();
        while let Some(current) = queue.pop_front() {
            for edge in self.in_edges(current) {
                if edge.request().is_none() {
                    continue;
                }
                if edge.edge.is_entry_point() {
                    entry_points.push(edge);
                } else if visited.insert(edge.source) {
                    queue.push_back(edge.source);
                }
            }
        }
        entry_points.sort_by_key(|e| e.id.index());
        entry_points
    }

    /// Nodes on a shortest dependency path from `from` to `to`, both included.
    ///
    /// Ties are broken by edge insertion order. Returns an empty path when `to`
    /// is unreachable.
    pub fn shortest_path(&self, from: NodeIndex, to: NodeIndex) -> Result<Vec<NodeIndex>> {
        self.bfs_path(from, to, |e| e.request().is_some())
    }

    /// Like [`shortest_path`](Self::shortest_path), but also through child
    /// factory methods and subcomponent edges.
    pub fn shortest_network_path(&self, from: NodeIndex, to: NodeIndex) -> Result<Vec<NodeIndex>> {
        self.bfs_path(from, to, |_| true)
    }

    fn bfs_path(
        &self,
        from: NodeIndex,
        to: NodeIndex,
        follow: impl Fn(&EdgeView<'_>) -> bool,
    ) -> Result<Vec<NodeIndex>> {
        self.node(from)?;
        self.node(to)?;
        if from == to {
            return Ok(vec![from]);
        }
        let mut previous: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        let mut visited = HashSet::from([from]);
        let mut queue = VecDeque::from([from]);
        while let Some(current) = queue.pop_front() {
            for edge in self.out_edges(current) {
                if !follow(&edge) || !visited.insert(edge.target) {
                    continue;
                }
                previous.insert(edge.target, current);
                if edge.target == to {
                    let mut path = vec![to];
                    let mut cursor = to;
                    while let Some(&p) = previous.get(&cursor) {
                        path.push(p);
                        cursor = p;
                    }
                    path.reverse();
                    return Ok(path);
                }
                queue.push_back(edge.target);
            }
        }
        Ok(Vec::new())
    }

    /// The first dependency edge from `source` to `target`.
    pub fn dependency_edge_between(&self, source: NodeIndex, target: NodeIndex) -> Option<EdgeView<'_>> {
        self.out_edges(source)
            .into_iter()
            .find(|e| e.target == target && e.request().is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::BindingGraphFactory;
    use bindscope_api::{BindingKind, TypeRef};
    use bindscope_plugin::InMemoryRepository;
    use bindscope_plugin::testing::*;

    fn key(ty: &str) -> Key {
        Key::new(TypeRef::parse(ty).unwrap())
    }

    fn app_repo() -> InMemoryRepository {
        InMemoryRepository::new()
            .with(
                component("App")
                    .install("NetModule")
                    .entry_point("cache", "Cache")
                    .entry_point("api", "Api")
                    .method(method("child", "Child").abstract_method())
                    .build(),
            )
            .and_then(|r| r.with(module("NetModule").provides("client", "HttpClient", &[]).build()))
            .and_then(|r| {
                r.with(
                    class("Cache")
                        .inject_constructor(&[("client", "HttpClient"), ("clock", "Clock")])
                        .build(),
                )
            })
            .and_then(|r| r.with(class("Clock").inject_constructor(&[]).build()))
            .and_then(|r| r.with(interface("Api").build()))
            .and_then(|r| r.with(subcomponent("Child").entry_point("cache", "Cache").build()))
            .unwrap()
    }

    fn graph(repo: &InMemoryRepository) -> BindingGraph {
        BindingGraphFactory::new(repo).create("App", false).unwrap()
    }

    #[test]
    fn test_predecessors() {
        let repo = app_repo();
        let graph = graph(&repo);
        let (client, _) = graph.bindings(&key("HttpClient"))[0];
        let (cache, _) = graph.bindings(&key("Cache"))[0];
        assert_eq!(graph.predecessors(client), vec![cache]);

        let repo = InMemoryRepository::new()
            .with(component("App").install("NetModule").entry_point("store", "Store").build())
            .and_then(|r| r.with(module("NetModule").provides("client", "HttpClient", &[]).build()))
            .and_then(|r| {
                r.with(
                    class("Store")
                        .inject_constructor(&[("primary", "HttpClient"), ("backup", "HttpClient")])
                        .build(),
                )
            })
            .unwrap();
        let graph = self::graph(&repo);
        let (client, _) = graph.bindings(&key("HttpClient"))[0];
        let (store, _) = graph.bindings(&key("Store"))[0];
        assert_eq!(graph.in_edges(client).len(), 2);
        assert_eq!(graph.predecessors(client), vec![store]);
        assert_eq!(graph.successors(store), vec![client]);
    }

    #[test]
    fn test_nodes_and_edges() {
        let repo = app_repo();
        let graph = graph(&repo);
        assert_eq!(graph.root(), &ComponentPath::root("App"));
        assert!(!graph.is_full_binding_graph());

        // App, Child, Cache, HttpClient, Clock and the missing Api.
        assert_eq!(graph.node_count(), 6);
        assert_eq!(graph.binding_nodes().count(), 3);
        let missing: Vec<_> = graph.missing_binding_nodes().map(|(_, _, k)| k.to_string()).collect();
        assert_eq!(missing, vec!["Api"]);

        let entry_points: Vec<_> = graph
            .entry_point_edges()
            .iter()
            .map(|e| e.request().unwrap().key.to_string())
            .collect();
        assert_eq!(entry_points, vec!["Cache", "Api", "Cache"]);

        let root = graph.component_node(graph.root()).unwrap();
        let child = graph.component_node(&graph.root().child("Child")).unwrap();
        assert!(graph.out_edges(root).iter().any(|e| e.target == child
            && matches!(e.edge, Edge::ChildFactoryMethod { .. })));
    }

    #[test]
    fn test_inherited_binding_is_shared() {
        let repo = app_repo();
        let graph = graph(&repo);
        let caches = graph.bindings(&key("Cache"));
        assert_eq!(caches.len(), 1);
        let (cache, node) = caches[0];
        assert_eq!(node.path, ComponentPath::root("App"));
        assert!(matches!(node.binding.kind, BindingKind::Injection { .. }));
        // Both the root and the child entry point reach the same node.
        assert_eq!(graph.entry_point_edges_depending_on(cache).len(), 2);
        assert_eq!(graph.successors(cache).len(), 2);
    }

    #[test]
    fn test_shortest_path() {
        let repo = app_repo();
        let graph = graph(&repo);
        let root = graph.component_node(graph.root()).unwrap();
        let (clock, _) = graph.bindings(&key("Clock"))[0];
        let (cache, _) = graph.bindings(&key("Cache"))[0];
        assert_eq!(graph.shortest_path(root, clock).unwrap(), vec![root, cache, clock]);
        assert!(graph.shortest_path(clock, root).unwrap().is_empty());
        assert_eq!(graph.shortest_path(clock, clock).unwrap(), vec![clock]);
    }

    #[test]
    fn test_shortest_network_path_crosses_into_children() {
        let repo = app_repo();
        let graph = graph(&repo);
        let root = graph.component_node(graph.root()).unwrap();
        let child = graph.component_node(&graph.root().child("Child")).unwrap();
        assert!(graph.shortest_path(root, child).unwrap().is_empty());
        assert_eq!(graph.shortest_network_path(root, child).unwrap(), vec![root, child]);
        assert_eq!(graph.subgraph_paths(), vec![&graph.root().child("Child")]);
    }

    #[test]
    fn test_missing_binding_hints() {
        let repo = app_repo();
        let graph = graph(&repo);
        // Api is an interface: no constructor could ever satisfy it.
        let hints = graph.missing_binding_hints(&key("Api"));
        assert!(!hints.implicitly_injectable);
        assert!(!hints.has_injection_sites);
    }

    #[test]
    fn test_unknown_node() {
        let repo = app_repo();
        let graph = graph(&repo);
        let bogus = NodeIndex::new(999);
        assert!(matches!(graph.node(bogus), Err(BindscopeError::NodeNotInGraph(_))));
        assert!(graph.shortest_path(bogus, bogus).is_err());
    }

    #[test]
    fn test_resolved_bindings_walks_ancestors() {
        let repo = app_repo();
        let graph = graph(&repo);
        let child = graph.root().child("Child");
        let resolved = graph.resolved_bindings(&child, &key("HttpClient")).unwrap();
        assert_eq!(resolved.path, ComponentPath::root("App"));
        assert!(graph.resolved_bindings(&child, &key("Unrelated")).is_none());
    }
}
