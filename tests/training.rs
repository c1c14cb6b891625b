// End-to-end behaviour of the engine, modules and optimizers through the public API.

use approx::assert_abs_diff_eq;
use ferrograd::dataset::{TensorDataset, synthetic_images, synthetic_regression};
use ferrograd::nn::{
    Adam, CrossEntropyLoss, LeNet, Loss, MSELoss, Module, Optimizer, SGD, TwoLayerNet,
};
use ferrograd::training::{TrainingConfig, evaluate, fit, train_step};
use ferrograd::{Engine, GradError, Tensor};
use rand::SeedableRng;
use rand::rngs::StdRng;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn test_mean_of_scaled_square_gradient() {
    init_logger();
    let mut engine = Engine::<f32>::new();
    let x = engine.variable(Tensor::ones(&[2, 2]));
    let y = engine.add_scalar(x, 2.0).unwrap();
    let z = engine.mul(y, y).unwrap();
    let z = engine.mul_scalar(z, 3.0).unwrap();
    let out = engine.mean(z, None, false).unwrap();
    assert_abs_diff_eq!(engine.data(out).unwrap().item().unwrap(), 27.0);

    engine.backward(out).unwrap();
    let grad = engine.grad(x).unwrap().unwrap();
    assert_eq!(grad.shape(), &[2, 2]);
    for g in grad.to_vec() {
        assert_abs_diff_eq!(g, 4.5, epsilon = 1e-6);
    }
}

#[test]
fn test_backward_twice_doubles_and_zero_grad_resets() {
    init_logger();
    let mut engine = Engine::<f64>::new();
    let x = engine.variable(Tensor::from_vec(vec![0.5, -1.0, 2.0], &[3]).unwrap());
    let y = engine.mul(x, x).unwrap();
    let out = engine.sum(y, None, false).unwrap();

    engine.backward(out).unwrap();
    let single = engine.grad(x).unwrap().unwrap().clone();
    engine.backward(out).unwrap();
    let double = engine.grad(x).unwrap().unwrap().clone();
    assert_eq!(double, single.mul_scalar(2.0));

    engine.zero_grad(x).unwrap();
    engine.backward(out).unwrap();
    assert_eq!(engine.grad(x).unwrap().unwrap(), &single);
}

#[test]
fn test_unrelated_leaf_gets_no_gradient() {
    let mut engine = Engine::<f32>::new();
    let x = engine.variable(Tensor::ones(&[2]));
    let unrelated = engine.variable(Tensor::ones(&[2]));
    let out = engine.sum(x, None, false).unwrap();
    engine.backward(out).unwrap();
    assert!(engine.grad(unrelated).unwrap().is_none());

    let constant = engine.constant(Tensor::ones(&[2]));
    assert!(matches!(engine.backward(constant), Err(GradError::NoGraph(_))));
}

#[test]
fn test_two_layer_relu_loss_decreases_under_gradient_descent() {
    init_logger();
    let mut rng = StdRng::seed_from_u64(2024);
    let mut engine = Engine::<f64>::new();
    let data: TensorDataset<f64> = synthetic_regression(64, 4, 1, 0.0, &mut rng).unwrap();
    let model = TwoLayerNet::new_with_rng(&mut engine, 4, 16, 1, &mut rng).unwrap();
    let mut optimizer = SGD::new(Module::<f64>::parameter_ids(&model), 0.01);
    let loss_fn = MSELoss::new();

    let losses: Vec<f64> = (0..5)
        .map(|_| {
            train_step(
                &mut engine,
                &model,
                &loss_fn,
                &mut optimizer,
                data.inputs(),
                data.targets(),
                None,
            )
            .unwrap()
        })
        .collect();

    for pair in losses.windows(2) {
        assert!(pair[1] < pair[0], "loss did not decrease: {losses:?}");
    }
    // Only the parameters survive between iterations
    assert_eq!(engine.num_nodes(), 4);
}

#[test]
fn test_fit_with_adam_reduces_regression_loss() {
    init_logger();
    let mut rng = StdRng::seed_from_u64(11);
    let mut engine = Engine::<f32>::new();
    let data = synthetic_regression(128, 3, 1, 0.01, &mut rng).unwrap();
    let mut model = TwoLayerNet::new_with_rng(&mut engine, 3, 32, 1, &mut rng).unwrap();
    let loss_fn = MSELoss::new();

    let before = evaluate(&mut engine, &model, &loss_fn, &data, 32).unwrap();
    let config = TrainingConfig {
        learning_rate: 0.01,
        num_epochs: 30,
        ..TrainingConfig::fast()
    }
    .with_batch_size(16);
    let history = fit(&mut engine, &mut model, &loss_fn, &data, &config).unwrap();
    let after = evaluate(&mut engine, &model, &loss_fn, &data, 32).unwrap();

    assert_eq!(history.epoch_losses.len(), 30);
    assert!(after < before * 0.5, "before {before}, after {after}");
}

#[test]
fn test_lenet_single_adam_step_on_synthetic_images() {
    init_logger();
    let mut rng = StdRng::seed_from_u64(5);
    let mut engine = Engine::<f32>::new();
    let data = synthetic_images(8, 3, 0.1, &mut rng).unwrap();
    let model = LeNet::new_with_rng(&mut engine, 3, &mut rng).unwrap();
    let before = model.state_dict(&engine).unwrap();

    let mut optimizer = Adam::new(model.parameter_ids(), 1e-3);
    let loss = train_step(
        &mut engine,
        &model,
        &CrossEntropyLoss::new(),
        &mut optimizer,
        data.inputs(),
        data.targets(),
        Some(5.0),
    )
    .unwrap();

    assert!(loss.is_finite());
    let after = model.state_dict(&engine).unwrap();
    assert_ne!(before["features.0.weight"], after["features.0.weight"]);
    assert_ne!(before["classifier.5.bias"], after["classifier.5.bias"]);
}

#[test]
fn test_no_grad_inference_leaves_gradients_untouched() {
    let mut engine = Engine::<f32>::new();
    let model = TwoLayerNet::new(&mut engine, 2, 4, 3).unwrap();
    let input = engine.constant(Tensor::ones(&[5, 2]));

    let logits = engine
        .no_grad(|engine| model.forward(engine, input))
        .unwrap();
    assert!(!engine.requires_grad(logits).unwrap());
    assert!(matches!(engine.backward(logits), Err(GradError::NoGraph(_))));

    let labels = engine.constant(Tensor::from_vec(vec![0.0, 1.0, 2.0, 0.0, 1.0], &[5]).unwrap());
    let logits = model.forward(&mut engine, input).unwrap();
    let loss = CrossEntropyLoss::new().forward(&mut engine, logits, labels).unwrap();
    engine.backward(loss).unwrap();
    let mut optimizer = SGD::new(Module::<f32>::parameter_ids(&model), 0.1);
    optimizer.step(&mut engine).unwrap();
    assert!(Module::<f32>::parameters(&model)
        .iter()
        .all(|p| p.grad(&engine).unwrap().is_some()));
}
