//! Implementation of the `primers complete-mask` subcommand.
//!
//! `ivar getmasked` reports the primers whose binding sites are affected by
//! variants in the sample consensus. Reads primed with any other primer of
//! the same amplicon group are unreliable as well, so the flagged set is
//! expanded to complete amplicon groups using the primer info TSV before
//! `ivar removereads` consumes it.

use std::collections::BTreeSet;
use std::io::Write;

use crate::common::{open_write_maybe_gz, read_lines};

/// Command line arguments for `primers complete-mask` subcommand.
#[derive(Debug, clap::Parser)]
#[command(author, version, about = "expand masked primers to amplicon groups", long_about = None)]
pub struct Args {
    /// Path to the single-line `ivar getmasked` output.
    #[clap(long)]
    pub path_getmasked: String,
    /// Path to the primer info TSV (one amplicon group per line).
    #[clap(long)]
    pub path_primer_info: String,
    /// Path to the output primer name list.
    #[clap(long)]
    pub path_out: String,
}

/// Expand `flagged` primer names to complete amplicon groups.
///
/// Every amplicon group containing a flagged primer contributes all of its
/// primer names; the result is sorted and deduplicated.
pub fn complete_mask(flagged: &[String], amplicons: &[Vec<String>]) -> Vec<String> {
    let mut complete = BTreeSet::new();
    for primer in flagged {
        for amplicon in amplicons {
            if amplicon.iter().any(|name| name == primer) {
                complete.extend(amplicon.iter().cloned());
            }
        }
    }
    complete.into_iter().collect()
}

/// Main entry point for `primers complete-mask` sub command.
pub fn run(args_common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    tracing::info!("args_common = {:#?}", &args_common);
    tracing::info!("args = {:#?}", &args);

    let getmasked = std::fs::read_to_string(&args.path_getmasked)
        .map_err(|e| anyhow::anyhow!("could not read {}: {}", &args.path_getmasked, e))?;
    let getmasked = getmasked.lines().next().unwrap_or_default().trim();

    let mut writer = open_write_maybe_gz(&args.path_out)?;
    if getmasked.is_empty() {
        tracing::info!("no affected primer binding sites found");
        writer.flush()?;
        return Ok(());
    }

    let flagged = getmasked
        .split('\t')
        .map(str::to_string)
        .collect::<Vec<_>>();
    let amplicons = read_lines(&args.path_primer_info)
        .map_err(|e| anyhow::anyhow!("could not read {}: {}", &args.path_primer_info, e))?
        .map(|line| {
            line.map(|line| {
                line.trim()
                    .split('\t')
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let complete = complete_mask(&flagged, &amplicons);
    tracing::info!("removing reads primed with any of: {}", complete.join(" "));
    writeln!(writer, "{}", complete.join("\t"))?;
    writer.flush()?;

    Ok(())
}
