//! Number processing pipeline demonstrating routing and fan-out
//!
//! Pipeline:
//! 1. Generate: Produces numbers 1-100
//! 2. Route: Even numbers are multiplied by 10, odd numbers are negated
//! 3. Mirror: A sampling branch sees whatever it can keep up with
//! 4. Aggregate: Sum all numbers on the main thread
//!
//! Usage: cargo run --example filter_pipeline --release

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use stream_stages::{
    Consumer, LRFilter, Mirror, Pipeline, PipelineBuilder, Producer, Stage, StageExt, Stream,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Number Processing Pipeline");
    println!("==========================");
    println!("Generating numbers 1-100, routing evens and odds, sampling on the side");
    println!();

    let start = Instant::now();
    let sampled = Arc::new(AtomicU64::new(0));
    let sampled_clone = Arc::clone(&sampled);

    let route = LRFilter::new(
        |n: &i64| n % 2 == 0,
        Pipeline::new(vec![Consumer::new(2, |n: i64| n * 10).slot()])?,
        Pipeline::new(vec![Consumer::new(2, |n: i64| -n).slot()])?,
    );

    // The sampler is slow on purpose; it never holds back the main path and
    // tags what it emits with zero so the sum below ignores it.
    let sampler = Consumer::new(1, move |_n: i64| {
        std::thread::sleep(Duration::from_millis(1));
        sampled_clone.fetch_add(1, Ordering::Relaxed);
        0
    });

    let mirror = Arc::new(Mirror::new(
        Consumer::new(1, |n: i64| n).slot(),
        vec![sampler.slot()],
    ));

    let pipeline = PipelineBuilder::new()
        .stage(Producer::from_iter(1, || 1..=100i64))
        .stage(route)
        .stage_ref(mirror.clone())
        .build()?;

    let mut sum = 0i64;
    let mut count = 0u64;
    for n in pipeline.run(Stream::detached()) {
        sum += n;
        count += 1;
        if count % 25 == 0 {
            println!("Running sum: {} (count: {})", sum, count);
        }
    }

    println!("\n=== Final Results ===");
    println!("Values received (including samples): {}", count);
    println!("Sampled by the mirror branch: {}", sampled.load(Ordering::Relaxed));
    println!("Sum: {}", sum);
    println!("Mirror: {}", mirror.metrics().snapshot().format());
    println!("\nPipeline execution time: {:.3}s", start.elapsed().as_secs_f64());

    Ok(())
}
