//! Word frequency counter pipeline
//!
//! Reads lines from stdin, splits them into words, cleans words on several
//! workers, counts frequencies and prints the top words.
//!
//! Usage: cargo run --example word_count --release
//!        (Then type lines of text and press Ctrl-D to finish)

use std::collections::HashMap;
use std::io::{self, BufRead};
use stream_stages::{bounded, Consumer, PipelineBuilder, Scale, Stage, StageExt, StageFn, Stream};

/// Stage that turns each line into its words
fn line_splitter() -> StageFn<impl Fn(Stream<String>) -> Stream<String> + Send + Sync> {
    StageFn::new("line_splitter", |lines: Stream<String>| {
        let (writer, words) = bounded(200);
        std::thread::spawn(move || {
            for line in lines {
                for word in line.split_whitespace() {
                    if writer.send(word.to_lowercase()).is_err() {
                        return;
                    }
                }
            }
        });
        words
    })
}

fn get_top_n(counts: &HashMap<String, usize>, n: usize) -> Vec<(String, usize)> {
    let mut items: Vec<_> = counts.iter().map(|(k, v)| (k.clone(), *v)).collect();
    items.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    items.into_iter().take(n).collect()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Word Frequency Counter Pipeline");
    println!("================================");
    println!("Enter lines of text (Ctrl-D to finish):");
    println!();

    let cleaner = Consumer::new(1, |word: String| {
        word.chars().filter(|c| c.is_alphanumeric()).collect::<String>()
    })
    .named("word_cleaner");
    let cleaner_metrics = cleaner.metrics().clone();

    let pipeline = PipelineBuilder::new()
        .stage(line_splitter())
        .stage(Scale::new(4, cleaner.slot()))
        .build()?;

    let (input, lines) = bounded(100);
    let words = pipeline.run(lines);

    // Spawn a thread to read stdin
    let reader_thread = std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if input.send(line).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });

    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut total = 0usize;
    for word in words {
        if word.len() <= 2 {
            continue;
        }
        *counts.entry(word).or_insert(0) += 1;
        total += 1;

        if total % 100 == 0 {
            println!("\n=== Top 10 Words (after {} words) ===", total);
            for (i, (word, count)) in get_top_n(&counts, 10).iter().enumerate() {
                println!("{:2}. {} ({})", i + 1, word, count);
            }
        }
    }

    reader_thread.join().expect("Reader thread panicked");

    println!("\n=== Top 10 Words ===");
    for (i, (word, count)) in get_top_n(&counts, 10).iter().enumerate() {
        println!("{:2}. {} ({})", i + 1, word, count);
    }
    println!("\nCleaner: {}", cleaner_metrics.snapshot().format());
    println!("\nProcessing complete!");

    Ok(())
}
