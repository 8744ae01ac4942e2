use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gesture_classifier::{Classifier, ClassifierBuilder, ClassifierError, TrainingConfig};
use log::{info, warn};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Train a classifier from a file of labeled feature vectors
    Train {
        /// Lines of `<label> <f1> <f2> ...`; `#` starts a comment
        #[arg(short, long)]
        examples: PathBuf,
        /// Where to write the trained classifier
        #[arg(short, long)]
        output: PathBuf,
        /// Determinant threshold below which the covariance counts as singular
        #[arg(long)]
        epsilon: Option<f64>,
        /// Number of closest class pairs to report after training
        #[arg(long, default_value_t = 5)]
        closest: usize,
    },
    /// Classify feature vectors, one per line
    Classify {
        /// A classifier written by `train`
        #[arg(short, long)]
        model: PathBuf,
        /// Input vectors; read from stdin when omitted
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Print one JSON object per prediction
        #[arg(long)]
        json: bool,
    },
    /// Report the most confusable pairs of classes
    Distances {
        #[arg(short, long)]
        model: PathBuf,
        #[arg(long, default_value_t = 5)]
        closest: usize,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    match args.command {
        Command::Train { examples, output, epsilon, closest } => train(&examples, &output, epsilon, closest),
        Command::Classify { model, input, json } => classify(&model, input.as_deref(), json),
        Command::Distances { model, closest } => {
            let classifier = Classifier::load_from_file(&model)
                .with_context(|| format!("Failed to load classifier from {}", model.display()))?;
            print_closest_pairs(&classifier, closest);
            Ok(())
        }
    }
}

fn parse_numbers<'a>(tokens: impl Iterator<Item = &'a str>) -> Result<Vec<f64>, std::num::ParseFloatError> {
    tokens.map(str::parse::<f64>).collect()
}

/// Strips comments and surrounding whitespace; `None` for lines with nothing left.
fn content(line: &str) -> Option<&str> {
    let line = line.split('#').next().unwrap_or("").trim();
    (!line.is_empty()).then_some(line)
}

fn train(examples: &Path, output: &Path, epsilon: Option<f64>, closest: usize) -> Result<()> {
    let mut config = TrainingConfig::from_env();
    if let Some(epsilon) = epsilon {
        config.singularity_epsilon = epsilon;
    }

    let start_time = Instant::now();
    info!("=== Reading examples from {} ===", examples.display());
    let file = File::open(examples).with_context(|| format!("Failed to open {}", examples.display()))?;

    let mut builder = ClassifierBuilder::new().with_config(config);
    let (mut accepted, mut rejected) = (0usize, 0usize);
    for (lineno, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        let Some(line) = content(&line) else { continue };
        let mut tokens = line.split_whitespace();
        let label = tokens.next().unwrap_or_default();
        let features = match parse_numbers(tokens) {
            Ok(features) => features,
            Err(e) => {
                warn!("Skipping line {}: {}", lineno + 1, e);
                rejected += 1;
                continue;
            }
        };
        match builder.add_example(label, &features) {
            Ok(()) => accepted += 1,
            Err(e @ (ClassifierError::DimensionMismatch { .. } | ClassifierError::ValidationError(_))) => {
                warn!("Skipping line {}: {}", lineno + 1, e);
                rejected += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
    info!("Accepted {} examples, rejected {}", accepted, rejected);

    let classifier = builder.train().context("Training failed")?;
    classifier
        .save_to_file(output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    let info = classifier.info();
    println!("Trained {} classes on {} features", info.num_classes, info.nfeatures);
    if !info.ignored_features.is_empty() {
        println!("Ignored features: {:?}", info.ignored_features);
    }
    print_closest_pairs(&classifier, closest);
    info!("=== Training complete (took {:.2?}) ===", start_time.elapsed());
    Ok(())
}

fn classify(model: &Path, input: Option<&Path>, json: bool) -> Result<()> {
    let classifier = Classifier::load_from_file(model)
        .with_context(|| format!("Failed to load classifier from {}", model.display()))?;

    let reader: Box<dyn BufRead> = match input {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    };

    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        let Some(line) = content(&line) else { continue };
        let features = parse_numbers(line.split_whitespace())
            .with_context(|| format!("Line {}: not a feature vector", lineno + 1))?;
        let prediction = classifier
            .classify_with_metrics(&features)
            .with_context(|| format!("Line {}", lineno + 1))?;

        if json {
            println!("{}", serde_json::to_string(&prediction)?);
        } else {
            println!(
                "{}\tconfidence={:.4}\tdistance={:.4}",
                prediction.label,
                prediction.confidence.unwrap_or_default(),
                prediction.distance.unwrap_or_default()
            );
        }
    }
    Ok(())
}

fn print_closest_pairs(classifier: &Classifier, closest: usize) {
    let pairs = classifier.closest_pairs(closest);
    if pairs.is_empty() {
        return;
    }
    println!("{} closest pairs of classes:", pairs.len());
    for (n, pair) in pairs.iter().enumerate() {
        println!(
            "{:2}) {:>12} to {:<12} d={:.4} nstd={:.4}",
            n + 1,
            pair.first,
            pair.second,
            pair.distance,
            pair.standard_deviations()
        );
    }
}
