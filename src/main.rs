// Walkthrough of the engine: autograd basics, a two-layer regressor and LeNet
// on synthetic images. Set RUST_LOG=info (or debug) to see the training logs.

use ferrograd::dataset::{synthetic_images, synthetic_regression};
use ferrograd::graph::GraphVisualizer;
use ferrograd::nn::{CrossEntropyLoss, LeNet, MSELoss, Module, TwoLayerNet};
use ferrograd::training::{TrainingConfig, accuracy, evaluate, fit};
use ferrograd::{Engine, Result, Tensor};
use rand::SeedableRng;
use rand::rngs::StdRng;

fn autograd_basics() -> Result<()> {
    println!("== autograd basics ==");
    let mut engine = Engine::<f32>::new();

    // out = mean(3 * (x + 2)^2), x = ones(2, 2)
    let x = engine.variable(Tensor::ones(&[2, 2]));
    let y = engine.add_scalar(x, 2.0)?;
    let z = engine.mul(y, y)?;
    let z = engine.mul_scalar(z, 3.0)?;
    let out = engine.mean(z, None, false)?;

    println!("out = {}", engine.data(out)?.item()?);
    engine.backward(out)?;
    if let Some(grad) = engine.grad(x)? {
        println!("d(out)/dx = {:?}", grad.to_vec());
    }

    let visualizer = GraphVisualizer::new();
    println!("{}", visualizer.summary(&engine, out)?);
    println!("{}", visualizer.to_dot(&engine, &[out])?);
    Ok(())
}

fn two_layer_regression() -> Result<()> {
    println!("== two-layer regression ==");
    let mut rng = StdRng::seed_from_u64(0);
    let mut engine = Engine::<f32>::new();

    let train = synthetic_regression(256, 4, 1, 0.05, &mut rng)?;
    let mut model = TwoLayerNet::new_with_rng(&mut engine, 4, 16, 1, &mut rng)?;
    println!("parameters: {}", model.num_parameters(&engine)?);

    let config = TrainingConfig {
        num_epochs: 40,
        learning_rate: 0.01,
        ..TrainingConfig::fast()
    }
    .with_batch_size(32);

    let loss_fn = MSELoss::new();
    let history = fit(&mut engine, &mut model, &loss_fn, &train, &config)?;
    if let (Some(first), Some(last)) = (history.epoch_losses.first(), history.last_loss()) {
        println!("train loss: {first:.4} -> {last:.4}");
    }
    println!("eval loss: {:.4}", evaluate(&mut engine, &model, &loss_fn, &train, 64)?);
    Ok(())
}

fn lenet_synthetic() -> Result<()> {
    println!("== LeNet on synthetic images ==");
    let mut rng = StdRng::seed_from_u64(1);
    let mut engine = Engine::<f32>::new();

    let num_classes = 4;
    let train = synthetic_images(64, num_classes, 0.1, &mut rng)?;
    let test = synthetic_images(32, num_classes, 0.1, &mut rng)?;
    let mut model = LeNet::new_with_rng(&mut engine, num_classes, &mut rng)?;
    println!("parameters: {}", model.num_parameters(&engine)?);

    let config = TrainingConfig {
        num_epochs: 5,
        print_every: 1,
        ..TrainingConfig::fast()
    }
    .with_batch_size(16);

    let history = fit(&mut engine, &mut model, &CrossEntropyLoss::new(), &train, &config)?;
    println!("epoch losses: {:?}", history.epoch_losses);

    model.eval();
    println!("test accuracy: {:.2}", accuracy(&mut engine, &model, &test, 16)?);
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    autograd_basics()?;
    two_layer_regression()?;
    lenet_synthetic()?;
    Ok(())
}
