//! CLI wrapper around the evaluation harness.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use shift_tta_eval::{evaluate, EvalOptions, Phase};

#[derive(Parser, Debug)]
#[command(
    name = "shift-tta-eval",
    about = "Score a SHIFT continual test-time adaptation submission"
)]
struct Args {
    /// Ground-truth annotation archive (.zip).
    annotations: PathBuf,

    /// Participant submission archive (.zip).
    submission: PathBuf,

    /// Challenge phase codename (dev or test).
    #[arg(long, default_value = "dev")]
    phase: String,

    /// Sequence table of the validation split.
    #[arg(long, default_value = "val_front_images_seq.csv")]
    val_table: PathBuf,

    /// Sequence table of the test split.
    #[arg(long, default_value = "test_front_images_seq.csv")]
    test_table: PathBuf,

    /// Restrict evaluation to sequences of one shift type.
    #[arg(long)]
    shift_type: Option<String>,

    /// Evaluate at most this many sequences.
    #[arg(long)]
    max_sequences: Option<usize>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "shift_tta_eval=info".to_string()),
        )
        .init();

    let args = Args::parse();
    let phase = Phase::from_codename(&args.phase)?;
    let options = EvalOptions {
        val_table: args.val_table,
        test_table: args.test_table,
        shift_type: args.shift_type,
        max_sequences: args.max_sequences,
    };

    let output = evaluate(&args.annotations, &args.submission, phase, &options)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
