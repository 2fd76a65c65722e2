pub mod resource_graph;
pub mod walker;
