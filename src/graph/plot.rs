use std::collections::HashSet;
use std::fmt::Write;

use super::engine::Engine;
use super::node::{Node, NodeId};
use crate::error::Result;
use crate::number::GradFloat;

/// Renders a computational graph as GraphViz DOT.
#[derive(Debug, Clone, Default)]
pub struct GraphVisualizer {
    pub config: VisualizationConfig,
}

/// Configuration for graph visualization
#[derive(Debug, Clone)]
pub struct VisualizationConfig {
    pub show_shapes: bool,
    pub show_gradients: bool,
    pub show_values: bool,
    /// Values are only printed for tensors with at most this many elements.
    pub max_tensor_display: usize,
    pub node_color: String,
    pub op_color: String,
    pub parameter_color: String,
    pub gradient_color: String,
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            show_shapes: true,
            show_gradients: true,
            show_values: false,
            max_tensor_display: 5,
            node_color: "#E3F2FD".to_string(),
            op_color: "#FFF3E0".to_string(),
            parameter_color: "#F3E5F5".to_string(),
            gradient_color: "#E8F5E8".to_string(),
        }
    }
}

/// DOT rendering of the subgraph reachable from `roots` with the default style.
pub fn to_dot<T: GradFloat>(engine: &Engine<T>, roots: &[NodeId]) -> Result<String> {
    GraphVisualizer::new().to_dot(engine, roots)
}

impl GraphVisualizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: VisualizationConfig) -> Self {
        Self { config }
    }

    /// Generate DOT format representation of the computational graph.
    /// Fails with `NodeNotFound` if a root is not in the engine.
    pub fn to_dot<T: GradFloat>(&self, engine: &Engine<T>, roots: &[NodeId]) -> Result<String> {
        let relevant = self.find_relevant_nodes(engine, roots)?;

        let mut dot = String::new();
        writeln!(dot, "digraph ComputationalGraph {{")?;
        writeln!(dot, "    rankdir=TB;")?;
        writeln!(dot, "    node [shape=box, style=filled];")?;
        writeln!(dot, "    edge [color=gray];")?;

        for &node_id in &relevant {
            let node = engine.node(node_id)?;
            writeln!(
                dot,
                "    n{} [label=\"{}\", fillcolor=\"{}\"];",
                node_id.0,
                self.create_node_label(node)?,
                self.node_color(node)
            )?;
        }

        for &node_id in &relevant {
            for input_id in &engine.node(node_id)?.inputs {
                writeln!(dot, "    n{} -> n{};", input_id.0, node_id.0)?;
            }
        }

        writeln!(dot, "}}")?;
        Ok(dot)
    }

    /// One line per node in topological order, for quick inspection in logs.
    pub fn summary<T: GradFloat>(&self, engine: &Engine<T>, root: NodeId) -> Result<String> {
        let mut out = String::new();
        for node_id in engine.topological_order(root)? {
            let node = engine.node(node_id)?;
            let kind = node.op_name().unwrap_or_else(|| self.leaf_kind(node).to_string());
            write!(out, "{node_id}: {kind} {:?}", node.shape())?;
            if !node.inputs.is_empty() {
                write!(out, " <- {:?}", node.inputs.iter().map(|id| id.0).collect::<Vec<_>>())?;
            }
            out.push('\n');
        }
        Ok(out)
    }

    /// All nodes reachable from the roots, each listed once.
    fn find_relevant_nodes<T: GradFloat>(
        &self,
        engine: &Engine<T>,
        roots: &[NodeId],
    ) -> Result<Vec<NodeId>> {
        let mut visited = HashSet::new();
        let mut relevant = Vec::new();
        let mut stack: Vec<NodeId> = roots.to_vec();

        while let Some(node_id) = stack.pop() {
            if !visited.insert(node_id) {
                continue;
            }
            relevant.push(node_id);
            stack.extend(engine.node(node_id)?.inputs.iter().copied());
        }

        relevant.sort();
        Ok(relevant)
    }

    fn create_node_label<T: GradFloat>(&self, node: &Node<T>) -> Result<String> {
        let mut label = match node.op_name() {
            Some(name) => format!("{}\\n{}", node.id, name),
            None => format!("{}\\n{}", node.id, self.leaf_kind(node)),
        };

        if self.config.show_shapes {
            write!(label, "\\nshape: {:?}", node.shape())?;
        }

        if self.config.show_gradients && node.requires_grad {
            label.push_str("\\nrequires_grad");
            if node.grad.is_some() {
                label.push_str("\\nhas gradient");
            }
        }

        if self.config.show_values && node.data.size() <= self.config.max_tensor_display {
            write!(label, "\\ndata: {:?}", node.data.to_vec())?;
        }

        Ok(label)
    }

    fn leaf_kind<T: GradFloat>(&self, node: &Node<T>) -> &'static str {
        if node.persistent { "Parameter" } else { "Tensor" }
    }

    fn node_color<T: GradFloat>(&self, node: &Node<T>) -> &str {
        if node.op.is_some() {
            &self.config.op_color
        } else if node.persistent {
            &self.config.parameter_color
        } else if node.requires_grad {
            &self.config.gradient_color
        } else {
            &self.config.node_color
        }
    }
}
