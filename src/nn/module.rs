use crate::error::{GradError, Result};
use crate::graph::{Engine, NodeId};
use crate::nn::parameter::Parameter;
use crate::number::GradFloat;
use crate::tensor::Tensor;
use std::collections::BTreeMap;

/// Parameter values keyed by their dotted path (`"fc1.weight"`).
pub type StateDict<T> = BTreeMap<String, Tensor<T>>;

/// The base trait for all neural network modules.
///
/// A module owns [`Parameter`] handles and possibly child modules, and maps an
/// input node to an output node by recording operations on an [`Engine`].
/// Parameters are reported in a deterministic order (declaration order, children
/// in insertion order) with dotted names, so optimizers, state dicts and tests
/// can rely on it.
///
/// # Examples
///
/// ```rust
/// use ferrograd::graph::{Engine, NodeId};
/// use ferrograd::nn::{Module, Parameter};
/// use ferrograd::{Result, Tensor};
///
/// struct Scale {
///     factor: Parameter,
///     training: bool,
/// }
///
/// impl Module<f32> for Scale {
///     fn forward(&self, engine: &mut Engine<f32>, input: NodeId) -> Result<NodeId> {
///         engine.mul(input, self.factor.id())
///     }
///
///     fn named_parameters(&self) -> Vec<(String, &Parameter)> {
///         vec![("factor".to_string(), &self.factor)]
///     }
///
///     fn training(&self) -> bool {
///         self.training
///     }
///
///     fn set_training(&mut self, training: bool) {
///         self.training = training;
///     }
/// }
///
/// let mut engine = Engine::<f32>::new();
/// let factor = Parameter::new(&mut engine, Tensor::full(&[1], 2.0), "factor");
/// let layer = Scale { factor, training: true };
/// let x = engine.constant(Tensor::ones(&[3]));
/// let y = layer.forward(&mut engine, x).unwrap();
/// assert_eq!(engine.data(y).unwrap().to_vec(), vec![2.0, 2.0, 2.0]);
/// ```
pub trait Module<T = f32>
where
    T: GradFloat,
{
    /// Performs the forward pass, returning the output node.
    fn forward(&self, engine: &mut Engine<T>, input: NodeId) -> Result<NodeId>;

    /// All parameters with their dotted names. Empty for stateless layers.
    fn named_parameters(&self) -> Vec<(String, &Parameter)> {
        Vec::new()
    }

    fn parameters(&self) -> Vec<&Parameter> {
        self.named_parameters().into_iter().map(|(_, p)| p).collect()
    }

    /// Node ids of every parameter, in the same order as `parameters`.
    /// This is what optimizers are constructed with.
    fn parameter_ids(&self) -> Vec<NodeId> {
        self.parameters().iter().map(|p| p.id()).collect()
    }

    fn training(&self) -> bool;

    /// Sets the training mode for this module and all submodules.
    fn set_training(&mut self, training: bool);

    fn train(&mut self) {
        self.set_training(true);
    }

    fn eval(&mut self) {
        self.set_training(false);
    }

    /// Sets every parameter's gradient to zeros.
    fn zero_grad(&self, engine: &mut Engine<T>) -> Result<()> {
        for param in self.parameters() {
            engine.zero_grad(param.id())?;
        }
        Ok(())
    }

    /// Total number of scalar parameters, submodules included.
    fn num_parameters(&self, engine: &Engine<T>) -> Result<usize> {
        self.parameters()
            .iter()
            .map(|p| p.numel(engine))
            .sum()
    }

    /// Snapshot of every parameter value.
    fn state_dict(&self, engine: &Engine<T>) -> Result<StateDict<T>> {
        self.named_parameters()
            .into_iter()
            .map(|(name, p)| Ok((name, p.data(engine)?.clone())))
            .collect()
    }

    /// Restores parameter values from a snapshot.
    /// Every parameter must be present with its exact shape; unknown keys are rejected.
    fn load_state_dict(&self, engine: &mut Engine<T>, state: &StateDict<T>) -> Result<()> {
        let named = self.named_parameters();
        if let Some(unknown) = state.keys().find(|k| !named.iter().any(|(n, _)| n == *k)) {
            return Err(GradError::InvalidArgument(format!(
                "unexpected key '{unknown}' in state dict"
            )));
        }
        for (name, param) in named {
            let value = state.get(&name).ok_or_else(|| {
                GradError::InvalidArgument(format!("missing key '{name}' in state dict"))
            })?;
            engine.set_data(param.id(), value.clone())?;
        }
        Ok(())
    }
}

/// Prepends `prefix.` to every name reported by a child module.
pub(crate) fn prefixed<'a>(
    prefix: &str,
    params: Vec<(String, &'a Parameter)>,
) -> Vec<(String, &'a Parameter)> {
    params
        .into_iter()
        .map(|(name, p)| (format!("{prefix}.{name}"), p))
        .collect()
}

/// A sequential container that applies its modules in insertion order.
/// Children are named by their index: `"0.weight"`, `"2.bias"`.
pub struct Sequential<T = f32>
where
    T: GradFloat,
{
    modules: Vec<Box<dyn Module<T>>>,
    training: bool,
}

impl<T> Default for Sequential<T>
where
    T: GradFloat,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Sequential<T>
where
    T: GradFloat,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequential")
            .field("len", &self.modules.len())
            .field("training", &self.training)
            .finish()
    }
}

impl<T> Sequential<T>
where
    T: GradFloat,
{
    pub fn new() -> Self {
        Self {
            modules: Vec::new(),
            training: true,
        }
    }

    pub fn add(&mut self, module: Box<dyn Module<T>>) {
        self.modules.push(module);
    }

    /// Builder-style `add`.
    pub fn with(mut self, module: impl Module<T> + 'static) -> Self {
        self.add(Box::new(module));
        self
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl<T> Module<T> for Sequential<T>
where
    T: GradFloat,
{
    fn forward(&self, engine: &mut Engine<T>, input: NodeId) -> Result<NodeId> {
        self.modules
            .iter()
            .try_fold(input, |current, module| module.forward(engine, current))
    }

    fn named_parameters(&self) -> Vec<(String, &Parameter)> {
        self.modules
            .iter()
            .enumerate()
            .flat_map(|(i, module)| prefixed(&i.to_string(), module.named_parameters()))
            .collect()
    }

    fn training(&self) -> bool {
        self.training
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
        for module in &mut self.modules {
            module.set_training(training);
        }
    }
}
