use crate::error::Result;
use crate::graph::{Engine, NodeId};
use crate::number::GradFloat;
use crate::tensor::Tensor;

/// A Parameter is a handle to a learnable tensor living in an [`Engine`].
///
/// The value itself is a persistent leaf node: it requires grad, survives
/// [`Engine::clear_graph`] and is updated in place by optimizers. The handle only
/// carries the node id and a local name (`"weight"`, `"bias"`); containers add
/// their own prefix when they report parameters.
///
/// # Examples
///
/// ```rust
/// use ferrograd::graph::Engine;
/// use ferrograd::nn::Parameter;
/// use ferrograd::Tensor;
///
/// let mut engine = Engine::<f32>::new();
/// let weight = Parameter::new(&mut engine, Tensor::zeros(&[3, 2]), "weight");
/// assert_eq!(weight.shape(&engine).unwrap(), vec![3, 2]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    id: NodeId,
    name: String,
}

impl Parameter {
    /// Registers `data` as a parameter node in the engine.
    pub fn new<T: GradFloat>(engine: &mut Engine<T>, data: Tensor<T>, name: &str) -> Self {
        Self {
            id: engine.parameter(data),
            name: name.to_string(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data<'a, T: GradFloat>(&self, engine: &'a Engine<T>) -> Result<&'a Tensor<T>> {
        engine.data(self.id)
    }

    pub fn grad<'a, T: GradFloat>(&self, engine: &'a Engine<T>) -> Result<Option<&'a Tensor<T>>> {
        engine.grad(self.id)
    }

    pub fn shape<T: GradFloat>(&self, engine: &Engine<T>) -> Result<Vec<usize>> {
        Ok(self.data(engine)?.shape().to_vec())
    }

    /// Number of scalar elements.
    pub fn numel<T: GradFloat>(&self, engine: &Engine<T>) -> Result<usize> {
        Ok(self.data(engine)?.size())
    }
}

impl From<&Parameter> for NodeId {
    fn from(param: &Parameter) -> Self {
        param.id
    }
}
