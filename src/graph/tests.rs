#[cfg(test)]
mod tests {

    use crate::error::{GradError, Result};
    use crate::graph::{Engine, GraphVisualizer, NodeId, VisualizationConfig, to_dot};
    use crate::ops;
    use crate::tensor::Tensor;
    use approx::assert_abs_diff_eq;

    /// Compares backward gradients of a scalar-valued function against central
    /// finite differences on every element of the input.
    fn gradcheck<F>(input: Tensor<f64>, build: F)
    where
        F: Fn(&mut Engine<f64>, NodeId) -> Result<NodeId>,
    {
        let mut engine = Engine::new();
        let x = engine.variable(input.clone());
        let out = build(&mut engine, x).unwrap();
        assert!(engine.data(out).unwrap().is_scalar(), "gradcheck needs a scalar output");
        engine.backward(out).unwrap();
        let analytic = engine.grad(x).unwrap().unwrap().to_vec();

        let eps = 1e-6;
        let base = input.to_vec();
        for i in 0..base.len() {
            let eval = |delta: f64| {
                let mut shifted = base.clone();
                shifted[i] += delta;
                let mut probe = Engine::new();
                let x = probe.variable(Tensor::from_vec(shifted, input.shape()).unwrap());
                let out = build(&mut probe, x).unwrap();
                probe.data(out).unwrap().item().unwrap()
            };
            let numeric = (eval(eps) - eval(-eps)) / (2.0 * eps);
            assert_abs_diff_eq!(analytic[i], numeric, epsilon = 1e-4);
        }
    }

    fn sample(shape: &[usize]) -> Tensor<f64> {
        let size: usize = shape.iter().product();
        let data = (0..size).map(|i| 0.3 + 0.17 * i as f64 - 0.05 * (i % 3) as f64).collect();
        Tensor::from_vec(data, shape).unwrap()
    }

    #[test]
    fn test_autograd_basics_scenario() {
        // y = x + 2; z = y * y * 3; out = mean(z)
        let mut engine = Engine::<f64>::new();
        let x = engine.variable(Tensor::ones(&[2, 2]));
        let y = engine.add_scalar(x, 2.0).unwrap();
        let yy = engine.mul(y, y).unwrap();
        let z = engine.mul_scalar(yy, 3.0).unwrap();
        let out = engine.mean(z, None, false).unwrap();

        assert_abs_diff_eq!(engine.data(out).unwrap().item().unwrap(), 27.0, epsilon = 1e-12);
        engine.backward(out).unwrap();

        let grad = engine.grad(x).unwrap().unwrap();
        assert_eq!(grad.shape(), &[2, 2]);
        for g in grad.to_vec() {
            assert_abs_diff_eq!(g, 4.5, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_gradients_accumulate_across_backward_calls() {
        let mut engine = Engine::<f64>::new();
        let x = engine.variable(Tensor::ones(&[2, 2]));
        let y = engine.add_scalar(x, 2.0).unwrap();
        let yy = engine.mul(y, y).unwrap();
        let z = engine.mul_scalar(yy, 3.0).unwrap();
        let out = engine.mean(z, None, false).unwrap();

        engine.backward(out).unwrap();
        engine.backward(out).unwrap();
        for g in engine.grad(x).unwrap().unwrap().to_vec() {
            assert_abs_diff_eq!(g, 9.0, epsilon = 1e-12);
        }

        engine.zero_grad(x).unwrap();
        assert_eq!(engine.grad(x).unwrap().unwrap(), &Tensor::zeros(&[2, 2]));
        engine.backward(out).unwrap();
        for g in engine.grad(x).unwrap().unwrap().to_vec() {
            assert_abs_diff_eq!(g, 4.5, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_multi_use_gradients_are_summed() {
        // x * x uses the same node twice: d/dx = 2x
        let mut engine = Engine::<f64>::new();
        let x = engine.tensor_from_vec(vec![3.0], &[1], true).unwrap();
        let sq = engine.mul(x, x).unwrap();
        engine.backward(sq).unwrap();
        assert_eq!(engine.grad(x).unwrap().unwrap().to_vec(), vec![6.0]);

        // Diamond: a = 2x, b = x + 1, out = a * b = 2x^2 + 2x, d/dx = 4x + 2
        let mut engine = Engine::<f64>::new();
        let x = engine.tensor_from_vec(vec![1.5], &[1], true).unwrap();
        let a = engine.mul_scalar(x, 2.0).unwrap();
        let b = engine.add_scalar(x, 1.0).unwrap();
        let out = engine.mul(a, b).unwrap();
        engine.backward(out).unwrap();
        assert_abs_diff_eq!(engine.grad(x).unwrap().unwrap().to_vec()[0], 8.0, epsilon = 1e-12);
    }

    #[test]
    fn test_unreachable_leaf_gets_no_gradient() {
        let mut engine = Engine::<f32>::new();
        let x = engine.variable(Tensor::ones(&[3]));
        let unrelated = engine.variable(Tensor::ones(&[3]));
        let other = engine.exp(unrelated).unwrap();
        let out = engine.sum(x, None, false).unwrap();
        engine.backward(out).unwrap();

        assert!(engine.grad(x).unwrap().is_some());
        assert!(engine.grad(unrelated).unwrap().is_none());
        assert!(engine.grad(other).unwrap().is_none());
    }

    #[test]
    fn test_constants_and_intermediates_keep_no_gradient() {
        let mut engine = Engine::<f32>::new();
        let x = engine.variable(Tensor::ones(&[2]));
        let c = engine.constant(Tensor::full(&[2], 2.0));
        let y = engine.mul(x, c).unwrap();
        let out = engine.sum(y, None, false).unwrap();
        engine.backward(out).unwrap();

        assert_eq!(engine.grad(x).unwrap().unwrap().to_vec(), vec![2.0, 2.0]);
        assert!(engine.grad(c).unwrap().is_none());
        assert!(engine.grad(y).unwrap().is_none());
    }

    #[test]
    fn test_backward_without_graph_fails() {
        let mut engine = Engine::<f32>::new();
        let c = engine.constant(Tensor::ones(&[2]));
        assert!(matches!(engine.backward(c), Err(GradError::NoGraph(id)) if id == c));

        let d = engine.constant(Tensor::ones(&[2]));
        let s = engine.add(c, d).unwrap();
        assert!(!engine.requires_grad(s).unwrap());
        assert!(matches!(engine.backward(s), Err(GradError::NoGraph(_))));
    }

    #[test]
    fn test_backward_rejects_mismatched_output_gradient() {
        let mut engine = Engine::<f32>::new();
        let x = engine.variable(Tensor::ones(&[2, 3]));
        let y = engine.relu(x).unwrap();
        let err = engine.backward_with_grad(y, Some(Tensor::ones(&[3, 2]))).unwrap_err();
        assert!(matches!(err, GradError::ShapeMismatch { .. }));

        engine.backward_with_grad(y, Some(Tensor::full(&[2, 3], 0.5))).unwrap();
        assert_eq!(engine.grad(x).unwrap().unwrap(), &Tensor::full(&[2, 3], 0.5));
    }

    #[test]
    fn test_unknown_node_is_reported() {
        let mut engine = Engine::<f32>::new();
        let x = engine.variable(Tensor::ones(&[1]));
        engine.clear_graph();
        assert!(matches!(engine.backward(x), Err(GradError::NodeNotFound(_))));
        assert!(matches!(engine.relu(x), Err(GradError::NodeNotFound(_))));
    }

    #[test]
    fn test_arity_is_validated_on_record() {
        let mut engine = Engine::<f32>::new();
        let x = engine.variable(Tensor::ones(&[1]));
        let err = engine.apply_operation(Box::new(ops::Add), vec![x]).unwrap_err();
        assert!(matches!(err, GradError::ArityMismatch { expected: 2, actual: 1, .. }));
    }

    #[test]
    fn test_no_grad_records_nothing() {
        let mut engine = Engine::<f32>::new();
        let x = engine.variable(Tensor::ones(&[2]));
        let y = engine.no_grad(|e| e.mul_scalar(x, 2.0)).unwrap();

        assert!(engine.is_grad_enabled());
        let node = engine.node(y).unwrap();
        assert!(!node.requires_grad);
        assert!(node.op.is_none());
        assert!(matches!(engine.backward(y), Err(GradError::NoGraph(_))));
    }

    #[test]
    fn test_detach_cuts_the_graph() {
        let mut engine = Engine::<f64>::new();
        let x = engine.variable(Tensor::full(&[1], 3.0));
        let y = engine.mul(x, x).unwrap();
        let d = engine.detach(y).unwrap();
        assert_eq!(engine.data(d).unwrap().to_vec(), vec![9.0]);

        let out = engine.mul(d, x).unwrap();
        engine.backward(out).unwrap();
        // Only the direct path through x counts: d(out)/dx = d = 9
        assert_eq!(engine.grad(x).unwrap().unwrap().to_vec(), vec![9.0]);
    }

    #[test]
    fn test_clear_graph_keeps_parameters() {
        let mut engine = Engine::<f32>::new();
        let w = engine.parameter(Tensor::ones(&[2]));
        let x = engine.constant(Tensor::full(&[2], 3.0));
        let y = engine.mul(w, x).unwrap();
        let out = engine.sum(y, None, false).unwrap();
        engine.backward(out).unwrap();
        assert_eq!(engine.num_nodes(), 4);

        engine.clear_graph();
        assert_eq!(engine.num_nodes(), 1);
        assert_eq!(engine.num_parameters(), 1);
        assert!(engine.contains(w));
        assert!(!engine.contains(out));
        assert_eq!(engine.grad(w).unwrap().unwrap().to_vec(), vec![3.0, 3.0]);
    }

    #[test]
    fn test_topological_order_lists_inputs_first() {
        let mut engine = Engine::<f32>::new();
        let a = engine.variable(Tensor::ones(&[1]));
        let b = engine.variable(Tensor::ones(&[1]));
        let c = engine.add(a, b).unwrap();
        let d = engine.mul(c, a).unwrap();

        let order = engine.topological_order(d).unwrap();
        let pos = |id| order.iter().position(|&n| n == id).unwrap();
        assert_eq!(order.len(), 4);
        assert_eq!(*order.last().unwrap(), d);
        assert!(pos(a) < pos(c));
        assert!(pos(b) < pos(c));
        assert!(pos(c) < pos(d));
    }

    #[test]
    fn test_broadcast_add_gradient_reduces_to_bias_shape() {
        let mut engine = Engine::<f64>::new();
        let x = engine.constant(Tensor::ones(&[4, 3]));
        let b = engine.variable(Tensor::zeros(&[3]));
        let y = engine.add(x, b).unwrap();
        let out = engine.sum(y, None, false).unwrap();
        engine.backward(out).unwrap();
        assert_eq!(engine.grad(b).unwrap().unwrap().to_vec(), vec![4.0, 4.0, 4.0]);
    }

    #[test]
    fn test_gradcheck_elementwise_chain() {
        gradcheck(sample(&[2, 3]), |e, x| {
            let s = e.sigmoid(x)?;
            let t = e.tanh(x)?;
            let p = e.mul(s, t)?;
            let q = e.exp(p)?;
            let r = e.pow_scalar(q, 1.5)?;
            e.sum(r, None, false)
        });
    }

    #[test]
    fn test_gradcheck_division_and_log() {
        gradcheck(sample(&[4]), |e, x| {
            let shifted = e.add_scalar(x, 1.0)?;
            let l = e.log(shifted)?;
            let d = e.div(l, shifted)?;
            let n = e.neg(d)?;
            e.mean(n, None, false)
        });
    }

    #[test]
    fn test_gradcheck_matmul_transpose_and_axis_sum() {
        let w = sample(&[3, 2]);
        gradcheck(sample(&[4, 3]), move |e, x| {
            let w = e.constant(w.clone());
            let h = e.matmul(x, w)?;
            let ht = e.transpose(h, None)?;
            let rows = e.sum(ht, Some(vec![1]), false)?;
            let sq = e.mul(rows, rows)?;
            e.sum(sq, None, false)
        });
    }

    #[test]
    fn test_gradcheck_reshape_broadcast_log_softmax() {
        gradcheck(sample(&[6]), |e, x| {
            let m = e.reshape(x, vec![2, 3])?;
            let b = e.broadcast_to(m, vec![2, 2, 3])?;
            let ls = e.log_softmax(b)?;
            let w = e.constant(sample(&[2, 2, 3]));
            let weighted = e.mul(ls, w)?;
            e.sum(weighted, None, false)
        });
    }

    #[test]
    fn test_gradcheck_convolution_and_pooling() {
        let weight = sample(&[2, 1, 3, 3]);
        gradcheck(sample(&[1, 1, 6, 6]), move |e, x| {
            let w = e.constant(weight.clone());
            let c = e.apply_operation(Box::new(ops::Convolution2d::new(1, 1)), vec![x, w])?;
            let p = e.apply_operation(Box::new(ops::MaxPooling2d::new(2, 2)), vec![c])?;
            let sq = e.mul(p, p)?;
            e.sum(sq, None, false)
        });
    }

    #[test]
    fn test_dot_rendering() {
        let mut engine = Engine::<f32>::new();
        let w = engine.parameter(Tensor::ones(&[2]));
        let x = engine.constant(Tensor::ones(&[2]));
        let y = engine.mul(w, x).unwrap();
        let out = engine.sum(y, None, false).unwrap();

        let dot = to_dot(&engine, &[out]).unwrap();
        assert!(dot.starts_with("digraph ComputationalGraph {"));
        assert!(dot.contains("Mul"));
        assert!(dot.contains("Sum"));
        assert!(dot.contains("Parameter"));
        assert!(dot.contains(&format!("n{} -> n{};", w.0, y.0)));
        assert!(dot.contains(&format!("n{} -> n{};", y.0, out.0)));
        assert!(dot.trim_end().ends_with('}'));
    }

    #[test]
    fn test_dot_labels_with_values_and_gradients() {
        let mut engine = Engine::<f32>::new();
        let w = engine.parameter(Tensor::full(&[2], 3.0));
        let out = engine.sum(w, None, false).unwrap();
        engine.backward(out).unwrap();

        let visualizer = GraphVisualizer::with_config(VisualizationConfig {
            show_values: true,
            ..VisualizationConfig::default()
        });
        let dot = visualizer.to_dot(&engine, &[out]).unwrap();
        assert!(dot.contains("data: [3.0, 3.0]"));
        assert!(dot.contains("has gradient"));
        assert!(dot.contains("shape: [2]"));

        let summary = visualizer.summary(&engine, out).unwrap();
        assert_eq!(summary.lines().count(), 2);
        assert!(summary.contains(&format!("<- [{}]", w.0)));

        let err = GradError::from(std::fmt::Error);
        assert!(matches!(err, GradError::Fmt(_)));
    }
}
