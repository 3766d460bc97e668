//! civic-runner: command-line tooling for CivicPulse.
//!
//! Usage:
//!   civic-runner classify "water pipe leaking on main road" [--model model.json]
//!   civic-runner train --csv corpus.csv --out model.json [--holdout-every 5]
//!   civic-runner summary --db civic.db

use anyhow::{Context, Result};
use civicpulse_core::{
    classifier::{Classifier, TrainedModel},
    config::ClassifierConfig,
    store::CivicStore,
    training::{parse_labelled_csv, LabelledSample},
};
use clap::{Parser, Subcommand};
use std::{fs::File, io::BufReader};

#[derive(Parser, Debug)]
#[command(name = "civic-runner")]
#[command(about = "Classify complaints, train the keyword model, summarise a database")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify one complaint text and print the result as JSON
    Classify {
        text: String,

        /// Trained model artifact. Falls back to keywords if absent
        #[arg(long, env = "CIVIC_MODEL_PATH")]
        model: Option<String>,
    },
    /// Train a keyword model from a `text,department` CSV
    Train {
        #[arg(long)]
        csv: String,

        #[arg(long, default_value = "department_model.json")]
        out: String,

        /// Hold out every Nth sample for evaluation (0 = train on all)
        #[arg(long, default_value = "5")]
        holdout_every: usize,
    },
    /// Print complaint counts by status and department
    Summary {
        #[arg(long, env = "CIVIC_DB", default_value = "civic.db")]
        db: String,
    },
}

fn main() -> Result<()> {
    env_logger::init();

    match Args::parse().command {
        Command::Classify { text, model } => classify(&text, model),
        Command::Train { csv, out, holdout_every } => train(&csv, &out, holdout_every),
        Command::Summary { db } => summary(&db),
    }
}

fn classify(text: &str, model_path: Option<String>) -> Result<()> {
    let classifier = Classifier::from_config(&ClassifierConfig {
        model_path,
        ..ClassifierConfig::default()
    })?;
    let result = classifier.classify(text);
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn train(csv: &str, out: &str, holdout_every: usize) -> Result<()> {
    let file = File::open(csv).with_context(|| format!("Cannot open corpus {csv}"))?;
    let samples = parse_labelled_csv(BufReader::new(file))?;

    let (train_set, holdout): (Vec<LabelledSample>, Vec<LabelledSample>) = if holdout_every > 1 {
        let mut train_set = Vec::new();
        let mut holdout = Vec::new();
        for (i, sample) in samples.into_iter().enumerate() {
            if (i + 1) % holdout_every == 0 {
                holdout.push(sample);
            } else {
                train_set.push(sample);
            }
        }
        (train_set, holdout)
    } else {
        (samples, Vec::new())
    };

    let model = TrainedModel::train(train_set.clone())?;
    model.save(out)?;

    println!("=== TRAINING SUMMARY ===");
    println!("  corpus:         {csv}");
    println!("  model:          {out}");
    println!("  version:        {}", model.version);
    println!("  train samples:  {}", train_set.len());
    println!("  train accuracy: {:.1}%", model.accuracy(&train_set) * 100.0);
    if !holdout.is_empty() {
        println!("  held out:       {}", holdout.len());
        println!("  test accuracy:  {:.1}%", model.accuracy(&holdout) * 100.0);
    }
    println!();
    println!("=== DEPARTMENTS ===");
    for (department, entry) in &model.per_department {
        println!(
            "  {:<14} samples: {:>4}  keywords: {:>5}",
            department.label(),
            entry.sample_count,
            entry.keywords.len()
        );
    }
    Ok(())
}

fn summary(db: &str) -> Result<()> {
    let store = CivicStore::open(db)?;
    store.migrate()?;

    println!("=== CIVICPULSE SUMMARY ===");
    println!("  db:          {db}");
    println!("  users:       {}", store.user_count()?);
    println!("  complaints:  {}", store.complaint_count()?);
    println!("  flagged:     {}", store.flagged_complaint_count()?);

    println!();
    println!("=== BY STATUS ===");
    for (status, count) in store.complaint_counts_by_status()? {
        println!("  {:<14} {count}", status.as_str());
    }

    println!();
    println!("=== BY DEPARTMENT ===");
    let by_department = store.complaint_counts_by_department()?;
    if by_department.is_empty() {
        println!("  (No complaints filed yet)");
    }
    for (department, count) in by_department {
        println!("  {:<14} {count}", department.label());
    }
    Ok(())
}
