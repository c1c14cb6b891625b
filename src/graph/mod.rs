pub mod engine;
pub mod node;
pub mod plot;
mod tests;

pub use engine::Engine;
pub use node::{Node, NodeId};
pub use plot::{GraphVisualizer, VisualizationConfig, to_dot};
