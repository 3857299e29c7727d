//! Implementation of the `metrics summarize` subcommand.
//!
//! Each per-sample pipeline run leaves a `<name>_metrics.tsv` with coverage
//! and variant counts in its sample directory. This command collects them
//! into one batch-level `metrics.tsv`, with an empty row for every sample
//! directory that has no metrics file.

use std::io::Write;
use std::path::Path;

use crate::common::read_lines;

/// Command line arguments for `metrics summarize` subcommand.
#[derive(Debug, clap::Parser)]
#[command(author, version, about = "collect per-sample metrics into one table", long_about = None)]
pub struct Args {
    /// Path to the pipeline output directory holding one directory per sample.
    #[clap(long)]
    pub path_out_dir: String,
}

/// Header of the batch-level metrics table.
const HEADER: &[&str] = &["name", "breadth", "count", "mean", "variants"];

/// Collect the sample directory names below `root`, sorted by name.
fn sample_names(root: &Path) -> Result<Vec<String>, anyhow::Error> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(root)
        .map_err(|e| anyhow::anyhow!("could not read output directory {:?}: {}", root, e))?
    {
        let entry = entry?;
        if entry.path().is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

/// Main entry point for `metrics summarize` sub command.
pub fn run(args_common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    tracing::info!("args_common = {:#?}", &args_common);
    tracing::info!("args = {:#?}", &args);

    let root = Path::new(&args.path_out_dir);
    let names = sample_names(root)?;
    tracing::info!("found {} sample directories", names.len());

    let path_summary = root.join("metrics.tsv");
    let mut writer = std::io::BufWriter::new(
        std::fs::File::create(&path_summary)
            .map_err(|e| anyhow::anyhow!("could not create {:?}: {}", &path_summary, e))?,
    );
    writeln!(writer, "{}", HEADER.join("\t"))?;
    for name in &names {
        let path_metrics = root.join(name).join(format!("{}_metrics.tsv", name));
        if path_metrics.exists() {
            for line in read_lines(&path_metrics)? {
                writeln!(writer, "{}", line?.trim_end())?;
            }
        } else {
            tracing::warn!("no metrics file for sample {}; writing empty row", name);
            writeln!(writer, "{}\t\t\t\t", name)?;
        }
    }
    writer.flush()?;
    tracing::info!("wrote {:?}", &path_summary);

    Ok(())
}
