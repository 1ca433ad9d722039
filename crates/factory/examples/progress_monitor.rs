//! End-to-end tour of the measure adapters around a mock worker loop.

use std::sync::Arc;
use std::time::Duration;

use tracing::Level;

use meterkit_core::{
    CountingMeasure, DurationMeasure, MeasureListener, MeasureValue, PullMeasure, PushMeasure,
};
use meterkit_factory::{MeasureFactory, MeasureRegistry};
use meterkit_introspect::accessors;

struct WorkerStats {
    iterations: Arc<CountingMeasure>,
}

impl WorkerStats {
    fn get_iterations(&self) -> i64 {
        self.iterations.count()
    }
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .init();

    println!("=== Meterkit Progress Monitor ===\n");

    let factory = MeasureFactory::new();
    let registry = MeasureRegistry::new();

    // A counter the worker loop bumps, observed two ways at once.
    let iterations = Arc::new(CountingMeasure::new("iterations", "worker iterations"));
    let iterations_push: Arc<dyn PushMeasure<i64>> = iterations.clone();
    let iterations_pull = Arc::new(factory.pull_from_push(&iterations_push, 0));
    println!("[OK] Iteration counter adapted to pull\n");

    // A wall clock polled in the background, notifying on change.
    let runtime = Arc::new(DurationMeasure::new("runtime", "worker runtime"));
    runtime.start();
    let runtime_pull: Arc<dyn PullMeasure<Duration>> = runtime.clone();
    let runtime_push = factory.push_from_pull(&runtime_pull, Duration::from_millis(200))?;
    runtime_push.register(Arc::new(|elapsed: &Duration| {
        println!("  runtime tick: {:?}", elapsed);
    }) as Arc<dyn MeasureListener<Duration>>);
    println!("[OK] Runtime clock polled every 200ms\n");

    // Accessor measures registered for snapshotting.
    let stats = Arc::new(WorkerStats {
        iterations: Arc::clone(&iterations),
    });
    registry.register_pulls(factory.pulls_from_getters(stats, accessors![get_iterations]));
    println!("[OK] Accessor measures registered: {:?}\n", registry.keys());

    // The worker loop.
    println!("--- Running Worker ---");
    for round in 0..5 {
        tokio::time::sleep(Duration::from_millis(120)).await;
        let count = iterations.increment();
        println!("round {} done, counter at {}", round, count);
    }
    runtime.stop();

    println!("\n--- Results ---");
    println!("counter via pull adapter: {}", iterations_pull.get()?);

    let snapshot = registry.snapshot();
    println!("snapshot at {}:", snapshot.timestamp);
    for (key, value) in &snapshot.values {
        println!("  {} = {}", key, value);
    }
    for (key, error) in &snapshot.failures {
        println!("  {} failed: {}", key, error);
    }

    let final_runtime = runtime_pull.get()?;
    runtime_push.stop();
    println!("\n[OK] Worker ran for {:?}", final_runtime);

    // Field measures over a serializable status report.
    #[derive(serde::Serialize)]
    struct StatusReport {
        completed_rounds: i64,
        healthy: bool,
    }
    let report = Arc::new(StatusReport {
        completed_rounds: iterations.count(),
        healthy: true,
    });
    let fields = factory.pulls_from_fields(report)?;
    let completed = fields["completed_rounds"].get()?;
    println!("[OK] Field measure read: completed_rounds = {}", completed);
    assert_eq!(completed, MeasureValue::Integer(5));

    println!("\n=== Done ===");
    Ok(())
}
