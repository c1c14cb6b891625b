use super::node::{Node, NodeId};
use crate::error::{GradError, Result};
use crate::number::GradFloat;
use crate::ops::{self, Operator};
use crate::tensor::Tensor;
use log::{debug, trace};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

/// Main computational graph engine.
///
/// The engine owns every node of the graph in an arena keyed by [`NodeId`].
/// Operations are evaluated eagerly when they are recorded; the operator and its
/// input ids are stored on the output node so the backward pass can replay them.
#[derive(Debug)]
pub struct Engine<T = f32>
where
    T: GradFloat,
{
    nodes: HashMap<NodeId, Node<T>>,
    grad_enabled: bool,
}

impl<T> Default for Engine<T>
where
    T: GradFloat,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Engine<T>
where
    T: GradFloat,
{
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            grad_enabled: true,
        }
    }

    // LEAF CREATION

    /// Creates a new leaf node in the computational graph.
    pub fn create_variable(&mut self, tensor: Tensor<T>, requires_grad: bool) -> NodeId {
        self.insert(Node::new_leaf(tensor, requires_grad))
    }

    /// Leaf that requires grad.
    pub fn variable(&mut self, tensor: Tensor<T>) -> NodeId {
        self.create_variable(tensor, true)
    }

    /// Leaf that never receives a gradient (inputs, targets).
    pub fn constant(&mut self, tensor: Tensor<T>) -> NodeId {
        self.create_variable(tensor, false)
    }

    pub fn tensor_from_vec(
        &mut self,
        data: Vec<T>,
        shape: &[usize],
        requires_grad: bool,
    ) -> Result<NodeId> {
        let tensor = Tensor::from_vec(data, shape)?;
        Ok(self.create_variable(tensor, requires_grad))
    }

    /// Trainable leaf that survives [`Engine::clear_graph`].
    pub fn parameter(&mut self, tensor: Tensor<T>) -> NodeId {
        self.insert(Node::new_parameter(tensor))
    }

    fn insert(&mut self, node: Node<T>) -> NodeId {
        let id = node.id;
        self.nodes.insert(id, node);
        id
    }

    // NODE ACCESS

    pub fn get_node(&self, node_id: NodeId) -> Option<&Node<T>> {
        self.nodes.get(&node_id)
    }

    pub fn node(&self, node_id: NodeId) -> Result<&Node<T>> {
        self.nodes.get(&node_id).ok_or(GradError::NodeNotFound(node_id))
    }

    fn node_mut(&mut self, node_id: NodeId) -> Result<&mut Node<T>> {
        self.nodes.get_mut(&node_id).ok_or(GradError::NodeNotFound(node_id))
    }

    pub fn contains(&self, node_id: NodeId) -> bool {
        self.nodes.contains_key(&node_id)
    }

    pub fn data(&self, node_id: NodeId) -> Result<&Tensor<T>> {
        Ok(&self.node(node_id)?.data)
    }

    /// Mutable access to a node's value. Used by optimizers to update parameters in place.
    pub fn data_mut(&mut self, node_id: NodeId) -> Result<&mut Tensor<T>> {
        Ok(&mut self.node_mut(node_id)?.data)
    }

    /// Replaces a node's value with a tensor of the same shape.
    pub fn set_data(&mut self, node_id: NodeId, tensor: Tensor<T>) -> Result<()> {
        let node = self.node_mut(node_id)?;
        if node.data.shape() != tensor.shape() {
            return Err(GradError::shape_mismatch("set_data", node.data.shape(), tensor.shape()));
        }
        node.data = tensor;
        Ok(())
    }

    pub fn grad(&self, node_id: NodeId) -> Result<Option<&Tensor<T>>> {
        Ok(self.node(node_id)?.grad.as_ref())
    }

    pub fn grad_mut(&mut self, node_id: NodeId) -> Result<Option<&mut Tensor<T>>> {
        Ok(self.node_mut(node_id)?.grad.as_mut())
    }

    /// Overwrites (or clears, with `None`) the gradient buffer of a node.
    pub fn set_grad(&mut self, node_id: NodeId, grad: Option<Tensor<T>>) -> Result<()> {
        let node = self.node_mut(node_id)?;
        if let Some(g) = &grad {
            if g.shape() != node.data.shape() {
                return Err(GradError::shape_mismatch("set_grad", node.data.shape(), g.shape()));
            }
        }
        node.grad = grad;
        Ok(())
    }

    /// Sets the gradient buffer to zeros of the node's shape.
    pub fn zero_grad(&mut self, node_id: NodeId) -> Result<()> {
        let node = self.node_mut(node_id)?;
        node.grad = Some(node.data.zeros_like());
        Ok(())
    }

    pub fn requires_grad(&self, node_id: NodeId) -> Result<bool> {
        Ok(self.node(node_id)?.requires_grad)
    }

    /// Toggles gradient tracking on a leaf. Recorded operation outputs cannot be changed.
    pub fn set_requires_grad(&mut self, node_id: NodeId, requires_grad: bool) -> Result<()> {
        let node = self.node_mut(node_id)?;
        if !node.is_leaf() {
            return Err(GradError::InvalidArgument(format!(
                "{node_id} is an operation output; use detach instead"
            )));
        }
        node.requires_grad = requires_grad;
        Ok(())
    }

    pub fn is_parameter(&self, node_id: NodeId) -> Result<bool> {
        Ok(self.node(node_id)?.persistent)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node<T>> {
        self.nodes.values()
    }

    // FORWARD RECORDING

    fn validate_inputs(&self, op: &dyn Operator<T>, input_ids: &[NodeId]) -> Result<()> {
        for &input_id in input_ids {
            if !self.nodes.contains_key(&input_id) {
                return Err(GradError::NodeNotFound(input_id));
            }
        }

        if input_ids.len() != op.num_inputs() {
            return Err(GradError::ArityMismatch {
                op: op.name(),
                expected: op.num_inputs(),
                actual: input_ids.len(),
            });
        }

        Ok(())
    }

    /// Evaluates `op` on the input nodes and records the result as a new node.
    ///
    /// The output requires grad when grad mode is on and at least one input
    /// requires grad. Otherwise it is stored as a plain leaf without the
    /// operator, so backward can never reach through it.
    pub fn apply_operation(
        &mut self,
        op: Box<dyn Operator<T>>,
        input_ids: Vec<NodeId>,
    ) -> Result<NodeId> {
        self.validate_inputs(op.as_ref(), &input_ids)?;

        let input_tensors = input_ids
            .iter()
            .map(|&id| self.data(id))
            .collect::<Result<Vec<_>>>()?;
        let result = op.compute(&input_tensors)?;

        let requires_grad = self.grad_enabled
            && input_ids
                .iter()
                .any(|id| self.nodes.get(id).is_some_and(|n| n.requires_grad));

        trace!(
            "recorded {} {:?} -> {:?} (requires_grad={})",
            op.name(),
            input_ids,
            result.shape(),
            requires_grad
        );

        let node = if requires_grad {
            Node::from_op(op, input_ids, result)
        } else {
            Node::new_leaf(result, false)
        };
        Ok(self.insert(node))
    }

    // BACKWARD PASS

    /// Backpropagates from `root`, seeding it with ones of its shape.
    pub fn backward(&mut self, root: NodeId) -> Result<()> {
        self.backward_with_grad(root, None)
    }

    /// Backpropagates from `root` with an explicit output gradient.
    ///
    /// Gradients reaching the same node through several paths are summed. The
    /// total reaching each leaf that requires grad is added to its `grad` buffer,
    /// so repeated calls without zeroing compound.
    pub fn backward_with_grad(&mut self, root: NodeId, grad: Option<Tensor<T>>) -> Result<()> {
        let root_node = self.node(root)?;
        if !root_node.requires_grad {
            return Err(GradError::NoGraph(root));
        }

        let seed = match grad {
            Some(g) => {
                if g.shape() != root_node.shape() {
                    return Err(GradError::shape_mismatch(
                        "backward output gradient",
                        root_node.shape(),
                        g.shape(),
                    ));
                }
                g
            }
            None => Tensor::ones(root_node.shape()),
        };

        let order = self.topological_order(root)?;
        let mut pending: HashMap<NodeId, Tensor<T>> = HashMap::new();
        pending.insert(root, seed);
        let mut leaf_grads = Vec::new();

        for &node_id in order.iter().rev() {
            let Some(grad_output) = pending.remove(&node_id) else {
                continue;
            };
            let node = self.node(node_id)?;

            let Some(op) = &node.op else {
                leaf_grads.push((node_id, grad_output));
                continue;
            };

            let input_tensors = node
                .inputs
                .iter()
                .map(|&id| self.data(id))
                .collect::<Result<Vec<_>>>()?;
            let input_grads = op.gradient(&grad_output, &input_tensors, &node.data)?;

            if input_grads.len() != node.inputs.len() {
                return Err(GradError::ArityMismatch {
                    op: op.name(),
                    expected: node.inputs.len(),
                    actual: input_grads.len(),
                });
            }

            for (&input_id, input_grad) in node.inputs.iter().zip(input_grads) {
                let input = self.node(input_id)?;
                if !input.requires_grad {
                    continue;
                }
                if input_grad.shape() != input.shape() {
                    return Err(GradError::shape_mismatch(
                        "operator gradient",
                        input.shape(),
                        input_grad.shape(),
                    ));
                }
                match pending.entry(input_id) {
                    Entry::Occupied(mut existing) => existing.get_mut().accumulate(&input_grad)?,
                    Entry::Vacant(slot) => {
                        slot.insert(input_grad);
                    }
                }
            }
        }

        let touched = leaf_grads.len();
        for (leaf_id, grad) in leaf_grads {
            let leaf = self.node_mut(leaf_id)?;
            match leaf.grad.as_mut() {
                Some(existing) => existing.accumulate(&grad)?,
                None => leaf.grad = Some(grad),
            }
        }

        debug!(
            "backward from {root}: {} nodes visited, {touched} leaf gradients updated",
            order.len()
        );
        Ok(())
    }

    /// Nodes reachable from `root`, every node listed after all of its inputs.
    /// `root` is always last.
    pub fn topological_order(&self, root: NodeId) -> Result<Vec<NodeId>> {
        self.node(root)?;

        let mut visited = HashSet::new();
        let mut order = Vec::new();
        // Iterative post-order DFS; the flag marks a node whose inputs are done.
        let mut stack = vec![(root, false)];

        while let Some((node_id, expanded)) = stack.pop() {
            if expanded {
                order.push(node_id);
                continue;
            }
            if !visited.insert(node_id) {
                continue;
            }
            stack.push((node_id, true));
            for &input_id in self.node(node_id)?.inputs.iter().rev() {
                if !visited.contains(&input_id) {
                    stack.push((input_id, false));
                }
            }
        }

        Ok(order)
    }

    // GRAD MODE

    pub fn is_grad_enabled(&self) -> bool {
        self.grad_enabled
    }

    /// Switches gradient recording on or off. Returns the previous setting.
    pub fn set_grad_enabled(&mut self, enabled: bool) -> bool {
        std::mem::replace(&mut self.grad_enabled, enabled)
    }

    /// Runs `f` with gradient recording disabled, restoring the previous mode afterwards.
    pub fn no_grad<F, R>(&mut self, f: F) -> R
    where
        F: FnOnce(&mut Self) -> R,
    {
        let previous = self.set_grad_enabled(false);
        let result = f(self);
        self.set_grad_enabled(previous);
        result
    }

    /// New leaf holding a copy of the node's value, cut off from the graph.
    pub fn detach(&mut self, node_id: NodeId) -> Result<NodeId> {
        let data = self.data(node_id)?.clone();
        Ok(self.constant(data))
    }

    // GRAPH LIFECYCLE

    /// Drops every non-persistent node. Parameters and their gradients survive.
    pub fn clear_graph(&mut self) {
        let before = self.nodes.len();
        self.nodes.retain(|_, node| node.persistent);
        debug!("cleared graph: {} nodes dropped, {} kept", before - self.nodes.len(), self.nodes.len());
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_parameters(&self) -> usize {
        self.nodes.values().filter(|node| node.persistent).count()
    }
}

// OPERATION SHORTCUTS
// Thin wrappers over `apply_operation` for the operators used most often.
impl<T> Engine<T>
where
    T: GradFloat,
{
    pub fn add(&mut self, a: NodeId, b: NodeId) -> Result<NodeId> {
        self.apply_operation(Box::new(ops::Add), vec![a, b])
    }

    pub fn sub(&mut self, a: NodeId, b: NodeId) -> Result<NodeId> {
        self.apply_operation(Box::new(ops::Sub), vec![a, b])
    }

    pub fn mul(&mut self, a: NodeId, b: NodeId) -> Result<NodeId> {
        self.apply_operation(Box::new(ops::Mul), vec![a, b])
    }

    pub fn div(&mut self, a: NodeId, b: NodeId) -> Result<NodeId> {
        self.apply_operation(Box::new(ops::Div), vec![a, b])
    }

    pub fn add_scalar(&mut self, a: NodeId, scalar: T) -> Result<NodeId> {
        self.apply_operation(Box::new(ops::AddScalar::new(scalar)), vec![a])
    }

    pub fn mul_scalar(&mut self, a: NodeId, scalar: T) -> Result<NodeId> {
        self.apply_operation(Box::new(ops::MulScalar::new(scalar)), vec![a])
    }

    pub fn pow_scalar(&mut self, a: NodeId, exponent: T) -> Result<NodeId> {
        self.apply_operation(Box::new(ops::PowScalar::new(exponent)), vec![a])
    }

    pub fn neg(&mut self, a: NodeId) -> Result<NodeId> {
        self.apply_operation(Box::new(ops::Neg), vec![a])
    }

    pub fn exp(&mut self, a: NodeId) -> Result<NodeId> {
        self.apply_operation(Box::new(ops::Exp), vec![a])
    }

    pub fn log(&mut self, a: NodeId) -> Result<NodeId> {
        self.apply_operation(Box::new(ops::Log), vec![a])
    }

    pub fn abs(&mut self, a: NodeId) -> Result<NodeId> {
        self.apply_operation(Box::new(ops::Abs), vec![a])
    }

    pub fn relu(&mut self, a: NodeId) -> Result<NodeId> {
        self.apply_operation(Box::new(ops::ReLU), vec![a])
    }

    pub fn sigmoid(&mut self, a: NodeId) -> Result<NodeId> {
        self.apply_operation(Box::new(ops::Sigmoid), vec![a])
    }

    pub fn tanh(&mut self, a: NodeId) -> Result<NodeId> {
        self.apply_operation(Box::new(ops::Tanh), vec![a])
    }

    pub fn matmul(&mut self, a: NodeId, b: NodeId) -> Result<NodeId> {
        self.apply_operation(Box::new(ops::MatMul), vec![a, b])
    }

    pub fn transpose(&mut self, a: NodeId, axes: Option<Vec<usize>>) -> Result<NodeId> {
        let op = match axes {
            Some(axes) => ops::Transpose::with_axes(axes),
            None => ops::Transpose::new(),
        };
        self.apply_operation(Box::new(op), vec![a])
    }

    pub fn sum(&mut self, a: NodeId, axes: Option<Vec<usize>>, keep_dims: bool) -> Result<NodeId> {
        self.apply_operation(Box::new(ops::Sum::new(axes, keep_dims)), vec![a])
    }

    pub fn mean(&mut self, a: NodeId, axes: Option<Vec<usize>>, keep_dims: bool) -> Result<NodeId> {
        self.apply_operation(Box::new(ops::Mean::new(axes, keep_dims)), vec![a])
    }

    pub fn reshape(&mut self, a: NodeId, shape: Vec<usize>) -> Result<NodeId> {
        self.apply_operation(Box::new(ops::Reshape::new(shape)), vec![a])
    }

    pub fn broadcast_to(&mut self, a: NodeId, shape: Vec<usize>) -> Result<NodeId> {
        self.apply_operation(Box::new(ops::BroadcastTo::new(shape)), vec![a])
    }

    pub fn log_softmax(&mut self, a: NodeId) -> Result<NodeId> {
        self.apply_operation(Box::new(ops::LogSoftmax), vec![a])
    }
}
