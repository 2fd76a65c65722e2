use std::collections::{HashMap, HashSet};

use anyhow::{bail, Result};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::stack::{Declaration, ObjectIdentity, ResourceSpec, PROVIDER_ADDRESS};

/// A node in the resource-level dependency graph.
#[derive(Debug, Clone)]
pub enum DagNode {
    /// Cluster connection. Root of every graph built from a declaration.
    Provider { address: String, context: String },
    /// A declared resource with its full desired state.
    Resource { address: String, spec: ResourceSpec },
    /// A resource known only from recorded state (teardown, orphans).
    Stored {
        address: String,
        identity: ObjectIdentity,
    },
}

impl DagNode {
    pub fn address(&self) -> &str {
        match self {
            DagNode::Provider { address, .. } => address,
            DagNode::Resource { address, .. } => address,
            DagNode::Stored { address, .. } => address,
        }
    }

    pub fn identity(&self) -> Option<&ObjectIdentity> {
        match self {
            DagNode::Provider { .. } => None,
            DagNode::Resource { spec, .. } => Some(&spec.identity),
            DagNode::Stored { identity, .. } => Some(identity),
        }
    }

    pub fn is_provider(&self) -> bool {
        matches!(self, DagNode::Provider { .. })
    }
}

/// The type of dependency between nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyEdge {
    /// Declared with `depends_on`.
    Explicit,
    /// Namespaced object inside a declared namespace it does not
    /// otherwise reach through explicit edges.
    Containment,
    /// Root resource hanging off the provider.
    ProviderDep,
}

impl DependencyEdge {
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyEdge::Explicit => "explicit",
            DependencyEdge::Containment => "containment",
            DependencyEdge::ProviderDep => "provider",
        }
    }
}

/// A resource-level dependency graph. Edges point from dependency to dependent.
pub type ResourceGraph = DiGraph<DagNode, DependencyEdge>;

/// Build the dependency graph of a declaration.
///
/// Explicit edges are kept exactly as declared. Resources without explicit
/// dependencies hang off the provider node, and namespaced resources get a
/// containment edge from their namespace when no explicit path already
/// passes through it.
pub fn build_resource_dag(
    declaration: &Declaration,
) -> Result<(ResourceGraph, HashMap<String, NodeIndex>)> {
    let mut graph = DiGraph::new();
    let mut node_map: HashMap<String, NodeIndex> = HashMap::new();

    let provider_idx = graph.add_node(DagNode::Provider {
        address: PROVIDER_ADDRESS.to_string(),
        context: declaration.provider.context.clone(),
    });
    node_map.insert(PROVIDER_ADDRESS.to_string(), provider_idx);

    for spec in declaration.resources() {
        if node_map.contains_key(&spec.address) {
            bail!("Resource '{}' is declared more than once", spec.address);
        }
        let idx = graph.add_node(DagNode::Resource {
            address: spec.address.clone(),
            spec: spec.clone(),
        });
        node_map.insert(spec.address.clone(), idx);
    }

    // Namespace name -> address of the resource declaring it
    let namespaces: HashMap<&str, &str> = declaration
        .resources()
        .iter()
        .filter(|r| r.identity.kind == "Namespace" && r.identity.namespace.is_none())
        .map(|r| (r.identity.name.as_str(), r.address.as_str()))
        .collect();

    for spec in declaration.resources() {
        let to_idx = node_map[&spec.address];

        if spec.depends_on.is_empty() {
            graph.add_edge(provider_idx, to_idx, DependencyEdge::ProviderDep);
        }

        for dep in &spec.depends_on {
            let Some(&from_idx) = node_map.get(dep) else {
                bail!(
                    "Resource '{}' depends on '{}', which is not declared",
                    spec.address,
                    dep
                );
            };
            if from_idx == to_idx {
                bail!("Resource '{}' depends on itself", spec.address);
            }
            graph.add_edge(from_idx, to_idx, DependencyEdge::Explicit);
        }

        let Some(ns) = spec.identity.namespace.as_deref() else {
            continue;
        };
        if let Some(&ns_address) = namespaces.get(ns) {
            if !explicit_ancestors(declaration, &spec.address).contains(ns_address) {
                graph.add_edge(node_map[ns_address], to_idx, DependencyEdge::Containment);
            }
        }
    }

    if petgraph::algo::is_cyclic_directed(&graph) {
        bail!("Dependency cycle detected in stack '{}'", declaration.stack);
    }

    Ok((graph, node_map))
}

/// Build a graph from recorded state. `resources` pairs each stored object
/// with the addresses it depended on when it was applied.
pub fn build_state_dag(
    resources: &[(String, ObjectIdentity, Vec<String>)],
) -> Result<(ResourceGraph, HashMap<String, NodeIndex>)> {
    let mut graph = DiGraph::new();
    let mut node_map: HashMap<String, NodeIndex> = HashMap::new();

    for (address, identity, _) in resources {
        let idx = graph.add_node(DagNode::Stored {
            address: address.clone(),
            identity: identity.clone(),
        });
        node_map.insert(address.clone(), idx);
    }

    for (address, _, deps) in resources {
        let to_idx = node_map[address];
        for dep in deps {
            // Dependencies that have already left state impose no order.
            if let Some(&from_idx) = node_map.get(dep) {
                graph.add_edge(from_idx, to_idx, DependencyEdge::Explicit);
            }
        }
    }

    if petgraph::algo::is_cyclic_directed(&graph) {
        bail!("Recorded dependencies form a cycle; state is corrupt");
    }

    Ok((graph, node_map))
}

/// Copy of `graph` with every edge reversed, so dependents come first.
pub fn reversed(graph: &ResourceGraph) -> ResourceGraph {
    let mut reverse_graph = DiGraph::new();
    let mut idx_map: HashMap<NodeIndex, NodeIndex> = HashMap::new();

    for idx in graph.node_indices() {
        let new_idx = reverse_graph.add_node(graph[idx].clone());
        idx_map.insert(idx, new_idx);
    }

    for edge in graph.edge_references() {
        reverse_graph.add_edge(
            idx_map[&edge.target()],
            idx_map[&edge.source()],
            *edge.weight(),
        );
    }

    reverse_graph
}

/// Direct dependencies of `address` together with the kind of each edge.
pub fn dependencies_of(
    graph: &ResourceGraph,
    node_map: &HashMap<String, NodeIndex>,
    address: &str,
) -> Vec<(String, DependencyEdge)> {
    let Some(&idx) = node_map.get(address) else {
        return Vec::new();
    };
    let mut deps: Vec<(String, DependencyEdge)> = graph
        .edges_directed(idx, petgraph::Direction::Incoming)
        .map(|edge| (graph[edge.source()].address().to_string(), *edge.weight()))
        .collect();
    deps.sort_by(|a, b| a.0.cmp(&b.0));
    deps
}

fn explicit_ancestors<'a>(declaration: &'a Declaration, address: &str) -> HashSet<&'a str> {
    let mut visited = HashSet::new();
    let mut stack: Vec<&str> = declaration
        .explicit_dependencies(address)
        .map(|deps| deps.iter().map(String::as_str).collect())
        .unwrap_or_default();

    while let Some(current) = stack.pop() {
        let Some(spec) = declaration.get(current) else {
            continue;
        };
        if visited.insert(spec.address.as_str()) {
            stack.extend(spec.depends_on.iter().map(String::as_str));
        }
    }

    visited
}

/// Get a topological ordering of the graph (dependencies before dependents).
pub fn topological_order(graph: &ResourceGraph) -> Result<Vec<NodeIndex>> {
    petgraph::algo::toposort(graph, None).map_err(|cycle| {
        anyhow::anyhow!(
            "Cycle detected involving {:?}",
            graph[cycle.node_id()].address()
        )
    })
}

/// Get the reverse topological ordering (for destroy operations).
pub fn reverse_topological_order(graph: &ResourceGraph) -> Result<Vec<NodeIndex>> {
    let mut order = topological_order(graph)?;
    order.reverse();
    Ok(order)
}

/// Generate DOT representation of the resource graph.
pub fn to_dot(graph: &ResourceGraph) -> String {
    let mut dot = String::from("digraph resources {\n");
    dot.push_str("  rankdir=TB;\n");
    dot.push_str("  node [shape=box, style=filled];\n\n");

    for idx in graph.node_indices() {
        let (label, color) = match &graph[idx] {
            DagNode::Provider { address, context } => {
                (format!("{}\\ncontext={}", address, context), "#d8d8a8")
            }
            DagNode::Resource { address, spec } => {
                (format!("{}\\n{}", address, spec.identity.kind), "#a8d8a8")
            }
            DagNode::Stored { address, identity } => {
                (format!("{}\\n{}", address, identity.kind), "#d8a8a8")
            }
        };
        dot.push_str(&format!(
            "  n{} [label=\"{}\", fillcolor=\"{}\"];\n",
            idx.index(),
            label,
            color
        ));
    }

    dot.push('\n');

    for edge in graph.edge_references() {
        let style = match edge.weight() {
            DependencyEdge::Explicit => "solid",
            DependencyEdge::Containment => "dashed",
            DependencyEdge::ProviderDep => "bold",
        };
        dot.push_str(&format!(
            "  n{} -> n{} [style={}];\n",
            edge.source().index(),
            edge.target().index(),
            style
        ));
    }

    dot.push_str("}\n");
    dot
}
