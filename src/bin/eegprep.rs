use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;

use eegprep::{
    Batch, BatchOptions, ReplayOperator, RunRecord, ScriptedOperator, SelectionMode,
    TextTableReader,
};

#[derive(Parser)]
#[command(name = "eegprep", about = "Batch EEG preprocessing with a replayable run record")]
struct Args {
    /// Tab-separated input recordings (header of channel names, rows of µV samples)
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output root; one subdirectory per input file plus record/log/statistics
    #[arg(long, default_value = "out")]
    output: PathBuf,

    /// Sample rate of the text recordings in Hz
    #[arg(long, default_value_t = 512.0)]
    sample_rate: f64,

    /// Epoch length in seconds
    #[arg(long, default_value_t = 8.0)]
    epoch_length: f64,

    /// Integer downsample divisor applied after the working-rate resample
    #[arg(long, default_value_t = 1)]
    downsample: u32,

    /// Channel names to exclude from all analysis (comma-separated)
    #[arg(long, default_value = "")]
    drop_channels: String,

    /// Bands to export (comma-separated); defaults to the full band table
    #[arg(long)]
    bands: Option<String>,

    /// Skip average re-referencing
    #[arg(long)]
    no_average_ref: bool,

    /// Export the whole signal per band instead of selected epochs
    #[arg(long)]
    no_epoch_selection: bool,

    /// Prefix for the record and log file names
    #[arg(long, default_value = "batch")]
    prefix: String,

    /// Replay a previous run record instead of selecting epochs automatically
    #[arg(long)]
    replay: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let reader = TextTableReader { sample_rate: args.sample_rate };

    if let Some(record_path) = &args.replay {
        let record = RunRecord::load(record_path)?;
        println!(
            "Replaying batch {} ({} recorded file(s))",
            record.batch_id,
            record.files.len()
        );
        let oracle = record.clone();
        let mut operator = ReplayOperator::new(&oracle);
        let mut batch = Batch::resume(record, &reader, &mut operator, None)?;
        let summary = batch.run(&args.inputs)?;
        println!(
            "Replay done: {} completed, {} skipped, {} failed",
            summary.completed, summary.skipped, summary.failed
        );
        if summary.failed > 0 {
            bail!("{} file(s) failed, see the batch log", summary.failed);
        }
        return Ok(());
    }

    let drop: std::collections::BTreeSet<String> = if args.drop_channels.is_empty() {
        Default::default()
    } else {
        args.drop_channels.split(',').map(str::to_string).collect()
    };

    let mut options = BatchOptions {
        apply_average_ref: !args.no_average_ref,
        apply_epoch_selection: !args.no_epoch_selection,
        // No prompts on a terminal batch: epoch vetting is the automatic
        // mask + dispersion pass.
        selection_mode: SelectionMode::Auto,
        epoch_length_secs: args.epoch_length,
        downsample_factor: args.downsample,
        text_sample_rate: Some(args.sample_rate),
        output_root: args.output.clone(),
        batch_prefix: args.prefix.clone(),
        ..BatchOptions::default()
    };
    if let Some(bands) = &args.bands {
        options.bands = bands.split(',').map(str::to_string).collect();
    }

    let mut operator = ScriptedOperator::new(drop);
    let mut batch = Batch::new(options, &reader, &mut operator, None)?;
    println!("Batch {} → {}", batch.record().batch_id, args.output.display());

    let summary = batch.run(&args.inputs)?;
    println!(
        "Done: {} completed, {} skipped, {} failed; record at {}",
        summary.completed,
        summary.skipped,
        summary.failed,
        batch.record_path().display()
    );
    if summary.failed > 0 {
        bail!("{} file(s) failed, see the batch log", summary.failed);
    }
    Ok(())
}
