//! Offline batch workflow: ask for a batch, evaluate it elsewhere, tell
//! the results back, and checkpoint the optimizer between rounds.
//!
//! Run with: `cargo run -p po-optimizer --example ask_tell`

use anyhow::Result;
use po_learning::GaussianProcess;
use po_optimizer::{AcquisitionConfig, Optimizer, OptimizerConfig, OptimizerSnapshot};
use po_space::Space;
use po_types::ParamValue;
use tracing_subscriber::EnvFilter;

/// Yield of a made-up process as a function of temperature, catalyst
/// loading and solvent. Lower is better.
fn process_loss(point: &[ParamValue]) -> f64 {
    let temperature = point[0].as_f64().unwrap_or_default();
    let loading = point[1].as_i64().unwrap_or_default() as f64;
    let solvent_penalty = match point[2].as_category().and_then(|c| c.as_str()) {
        Some("water") => 0.0,
        Some("ethanol") => 0.3,
        _ => 0.8,
    };
    ((temperature - 72.0) / 20.0).powi(2) + ((loading - 4.0) / 3.0).powi(2) + solvent_penalty
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let space = Space::builder()
        .real("temperature", 20.0, 120.0)
        .integer("catalyst_loading", 1, 10)
        .categorical("solvent", ["water", "ethanol", "toluene"])
        .build()?;

    let config = OptimizerConfig::new(2024)
        .with_warmup_count(8)
        .with_acquisition(AcquisitionConfig::expected_improvement());
    let mut optimizer = Optimizer::new(space, config)?;

    let mut checkpoint = String::new();
    for round in 0..6 {
        let batch = optimizer.ask(4)?;
        let values: Vec<f64> = batch.iter().map(|p| process_loss(p)).collect();
        optimizer.tell_many(batch, values)?;

        // Persist between rounds, as a lab would between experiment days.
        checkpoint = optimizer.snapshot().to_json()?;
        optimizer = Optimizer::restore(
            OptimizerSnapshot::from_json(&checkpoint)?,
            Box::new(GaussianProcess::default()),
        )?;

        if let Some(best) = optimizer.best() {
            let formatted: Vec<String> = best.point.iter().map(ToString::to_string).collect();
            println!(
                "round {}: {} evaluations, best {:.4} at [{}] ({:?})",
                round + 1,
                optimizer.history().len(),
                best.value,
                formatted.join(", "),
                optimizer.phase(),
            );
        }
    }

    let result = optimizer.result()?;
    println!("checkpoint size: {} bytes", checkpoint.len());
    println!("running minimum: {:?}", result.running_min());
    Ok(())
}
