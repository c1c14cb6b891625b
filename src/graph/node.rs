use crate::number::GradFloat;
use crate::ops::Operator;
use crate::tensor::Tensor;
use std::sync::atomic::{AtomicUsize, Ordering};

/// ATOMIC auto incrementing id for all nodes.
static NODE_COUNTER: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl NodeId {
    pub fn new() -> Self {
        // Relaxed is enough: only uniqueness matters, not ordering with other memory.
        Self(NODE_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

/// A value in the computational graph.
/// Leaves hold user data or parameters; every other node is the output of an
/// operator applied to the nodes listed in `inputs`.
#[derive(Debug)]
pub struct Node<T>
where
    T: GradFloat,
{
    pub id: NodeId,
    pub data: Tensor<T>,
    /// Accumulated gradient, same shape as `data`. Only leaves that require grad get one.
    pub grad: Option<Tensor<T>>,
    pub op: Option<Box<dyn Operator<T>>>,
    pub inputs: Vec<NodeId>,
    pub requires_grad: bool,
    /// Persistent nodes (parameters) survive `Engine::clear_graph`.
    pub persistent: bool,
}

impl<T> Node<T>
where
    T: GradFloat,
{
    pub fn new_leaf(data: Tensor<T>, requires_grad: bool) -> Self {
        Self {
            id: NodeId::new(),
            data,
            grad: None,
            op: None,
            inputs: Vec::new(),
            requires_grad,
            persistent: false,
        }
    }

    pub fn new_parameter(data: Tensor<T>) -> Self {
        Self {
            persistent: true,
            ..Self::new_leaf(data, true)
        }
    }

    pub fn from_op(op: Box<dyn Operator<T>>, inputs: Vec<NodeId>, data: Tensor<T>) -> Self {
        Self {
            id: NodeId::new(),
            data,
            grad: None,
            op: Some(op),
            inputs,
            requires_grad: true,
            persistent: false,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.op.is_none()
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn op_name(&self) -> Option<String> {
        self.op.as_ref().map(|op| op.name())
    }
}
