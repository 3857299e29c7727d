//! Implementation of the `vars merge` subcommand.
//!
//! Reads the iVar and LoFreq call sets of one sample, reconciles them into a
//! single table keyed by the canonical variant identifier, annotates amino
//! acid consequences against the SARS-CoV-2 gene map, filters by allele
//! frequency, and writes the merged TSV plus an optional comma separated
//! variant list for lineage abundance estimation.

use itertools::Itertools;

use crate::common::open_write_maybe_gz;

use super::calls::{dedup_keep_last, gene_at, VariantCall, VariantClass};
use super::{ivar, lofreq};

/// Minimal allele frequency for iVar-only calls to enter the merge.
const MIN_IVAR_MERGE_FREQ: f64 = 0.01;

/// Command line arguments for `vars merge` subcommand.
#[derive(Debug, clap::Parser)]
#[command(author, version, about = "merge iVar and LoFreq variant calls", long_about = None)]
pub struct Args {
    /// Path to the iVar output TSV.
    #[clap(long)]
    pub path_ivar: String,
    /// Path to the LoFreq output VCF.
    #[clap(long)]
    pub path_lofreq: String,
    /// Path to the merged output TSV.
    #[clap(long)]
    pub path_out: String,
    /// Optional path for the comma separated canonical variant list.
    #[clap(long)]
    pub path_variants_out: Option<String>,
    /// Minimum allele frequency of reported variants (between 0 and 1).
    #[clap(long, default_value_t = 0.05)]
    pub min_af: f64,
}

/// Merge the two call sets with last-write-wins precedence.
///
/// LoFreq rows come first, then the iVar rows above the fixed confidence
/// floor. Deduplication by canonical identifier keeps the last occurrence so
/// that iVar supplies the amino acid fields whenever both callers report the
/// same variant. The result is stably sorted by position.
pub fn merge_calls(ivar: Vec<VariantCall>, lofreq: Vec<VariantCall>) -> Vec<VariantCall> {
    if ivar.is_empty() {
        return lofreq;
    } else if lofreq.is_empty() {
        return ivar;
    }

    let concatenated = lofreq
        .into_iter()
        .chain(ivar.into_iter().filter(|call| {
            call.alternate_frequency
                .map_or(false, |af| af > MIN_IVAR_MERGE_FREQ)
        }))
        .collect::<Vec<_>>();
    let mut merged = dedup_keep_last(concatenated);
    merged.sort_by_key(|call| call.position);
    merged
}

/// Annotate amino acid consequences in place.
///
/// Only calls that passed their caller's own filter, fall into a gene
/// interval, and are not insertions receive a consequence; the codon
/// arithmetic assumes a single-base substitution. The amino acids themselves
/// are taken from the caller-supplied per-record fields.
pub fn annotate_mutations(calls: &mut [VariantCall]) {
    for call in calls.iter_mut() {
        if !call.passes_filter() || call.class == VariantClass::Insertion {
            continue;
        }
        if let Some((gene, first)) = gene_at(call.position) {
            let aa_pos = (call.position - first) / 3 + 1;
            call.consequences.push(format!(
                "{}:{}{}{}",
                gene,
                call.ref_aa.as_deref().unwrap_or_default(),
                aa_pos,
                call.alt_aa.as_deref().unwrap_or_default()
            ));
        }
    }
}

/// Drop calls below `min_af` and calls that explicitly failed iVar's filter.
///
/// The frequency cutoff is a strict less-than so a call exactly at the
/// threshold is retained; calls without a frequency pass through.
pub fn filter_merged_calls(calls: Vec<VariantCall>, min_af: f64) -> Vec<VariantCall> {
    calls
        .into_iter()
        .filter(|call| !call.alternate_frequency.map_or(false, |af| af < min_af))
        .filter(|call| call.pass != Some(false))
        .collect()
}

/// Column header of the merged output TSV.
const OUTPUT_HEADER: &[&str] = &[
    "REGION",
    "POS",
    "REF",
    "ALT",
    "QUAL",
    "FILTER",
    "REF_DP",
    "REF_RV",
    "ALT_DP",
    "ALT_RV",
    "ALT_FREQ",
    "TOTAL_DP",
    "STRAND_BIAS",
    "EFFECT",
    "REF_AA",
    "ALT_AA",
    "PASS",
    "SOURCE",
    "Variant",
    "Mutation",
];

/// Format a numeric column value without float noise.
fn fmt_num(value: f64) -> String {
    let s = format!("{:.6}", value);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    s.to_string()
}

/// Write the merged table to `path`; a header-only file when `calls` is empty.
fn write_merged<P>(calls: &[VariantCall], path: P) -> Result<(), anyhow::Error>
where
    P: AsRef<std::path::Path>,
{
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_writer(open_write_maybe_gz(path.as_ref())?);

    writer.write_record(OUTPUT_HEADER)?;
    for call in calls {
        writer.write_record(&[
            call.region.clone(),
            call.position.to_string(),
            call.reference.clone(),
            call.alternate.clone(),
            call.quality.map(|q| fmt_num(q as f64)).unwrap_or_default(),
            call.filter_status.clone(),
            call.reference_depth.to_string(),
            call.reference_depth_reverse.to_string(),
            call.alternate_depth.to_string(),
            call.alternate_depth_reverse.to_string(),
            call.alternate_frequency.map(fmt_num).unwrap_or_default(),
            call.total_depth.to_string(),
            call.strand_bias.map(|sb| sb.to_string()).unwrap_or_default(),
            call.raw_effect.clone().unwrap_or_default(),
            call.ref_aa.clone().unwrap_or_default(),
            call.alt_aa.clone().unwrap_or_default(),
            call.pass
                .map(|pass| (if pass { "TRUE" } else { "FALSE" }).to_string())
                .unwrap_or_default(),
            call.source.to_string(),
            call.variant_id.clone(),
            call.consequences.iter().join(","),
        ])?;
    }
    writer.flush()?;

    Ok(())
}

/// Write the comma separated canonical variant list consumed by the lineage
/// abundance estimation.
fn write_variant_list<P>(calls: &[VariantCall], path: P) -> Result<(), anyhow::Error>
where
    P: AsRef<std::path::Path>,
{
    use std::io::Write;

    let mut writer = open_write_maybe_gz(path.as_ref())?;
    writeln!(
        writer,
        "{}",
        calls.iter().map(|call| call.variant_id.as_str()).join(",")
    )?;
    writer.flush()?;

    Ok(())
}

/// Main entry point for `vars merge` sub command.
pub fn run(args_common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    tracing::info!("args_common = {:#?}", &args_common);
    tracing::info!("args = {:#?}", &args);

    tracing::info!("reading iVar calls from {}...", &args.path_ivar);
    let ivar_calls = ivar::read_ivar(&args.path_ivar)?;
    tracing::info!("... read {} iVar calls", ivar_calls.len());

    tracing::info!("reading LoFreq calls from {}...", &args.path_lofreq);
    let lofreq_calls = lofreq::read_lofreq(&args.path_lofreq);
    tracing::info!("... read {} LoFreq calls", lofreq_calls.len());

    let mut merged = merge_calls(ivar_calls, lofreq_calls);
    annotate_mutations(&mut merged);
    let filtered = filter_merged_calls(merged, args.min_af);

    tracing::info!(
        "writing {} merged calls to {}",
        filtered.len(),
        &args.path_out
    );
    write_merged(&filtered, &args.path_out)?;
    if let Some(path_variants_out) = &args.path_variants_out {
        tracing::info!("writing variant list to {}", path_variants_out);
        write_variant_list(&filtered, path_variants_out)?;
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::vars::calls::test::test_call;
    use crate::vars::calls::{CallerSource, VariantClass};

    #[test]
    fn merge_empty_inputs() {
        let call = test_call(100, "A", "G");

        assert_eq!(
            super::merge_calls(vec![], vec![call.clone()]),
            vec![call.clone()]
        );
        assert_eq!(super::merge_calls(vec![call.clone()], vec![]), vec![call]);
        assert_eq!(super::merge_calls(vec![], vec![]), vec![]);
    }

    #[test]
    fn merge_is_idempotent() {
        let calls = vec![test_call(100, "A", "G"), test_call(200, "C", "T")];

        let merged = super::merge_calls(calls.clone(), calls.clone());

        assert_eq!(merged, calls);
    }

    #[test]
    fn merge_prefers_ivar_on_tie() {
        let mut lofreq = test_call(23403, "A", "G");
        lofreq.source = CallerSource::Lofreq;
        let mut ivar = test_call(23403, "A", "G");
        ivar.source = CallerSource::Ivar;
        ivar.ref_aa = Some("D".into());
        ivar.alt_aa = Some("G".into());

        let merged = super::merge_calls(vec![ivar.clone()], vec![lofreq]);

        assert_eq!(merged, vec![ivar]);
    }

    #[test]
    fn merge_drops_low_frequency_ivar_calls() {
        let mut low = test_call(100, "A", "G");
        low.alternate_frequency = Some(0.005);
        let kept = test_call(200, "C", "T");
        let lofreq = test_call(300, "G", "A");

        let merged = super::merge_calls(vec![low, kept.clone()], vec![lofreq.clone()]);

        assert_eq!(merged, vec![kept, lofreq]);
    }

    #[test]
    fn merge_sorts_by_position() {
        let ivar = vec![test_call(300, "G", "A"), test_call(100, "A", "G")];
        let lofreq = vec![test_call(200, "C", "T")];

        let merged = super::merge_calls(ivar, lofreq);

        assert_eq!(
            merged.iter().map(|call| call.position).collect::<Vec<_>>(),
            vec![100, 200, 300]
        );
    }

    #[test]
    fn annotate_spike_substitution() {
        let mut call = test_call(21570, "A", "T");
        call.pass = Some(true);
        let mut calls = vec![call];

        super::annotate_mutations(&mut calls);

        // floor((21570 - 21563) / 3) + 1 == 3
        assert_eq!(calls[0].consequences, vec!["S:3".to_string()]);
    }

    #[test]
    fn annotate_with_amino_acid_fields() {
        let mut call = test_call(23403, "A", "G");
        call.pass = Some(true);
        call.ref_aa = Some("D".into());
        call.alt_aa = Some("G".into());
        let mut calls = vec![call];

        super::annotate_mutations(&mut calls);

        assert_eq!(calls[0].consequences, vec!["S:D614G".to_string()]);
    }

    #[test]
    fn annotate_skips_insertions() {
        let mut call = test_call(21570, "A", "+TT");
        call.pass = Some(true);
        assert_eq!(call.class, VariantClass::Insertion);
        let mut calls = vec![call];

        super::annotate_mutations(&mut calls);

        assert_eq!(calls[0].consequences, Vec::<String>::new());
    }

    #[test]
    fn annotate_skips_positions_outside_genes() {
        let mut call = test_call(100, "A", "G");
        call.pass = Some(true);
        let mut calls = vec![call];

        super::annotate_mutations(&mut calls);

        assert_eq!(calls[0].consequences, Vec::<String>::new());
    }

    #[test]
    fn annotate_skips_failed_filter() {
        let mut failed_ivar = test_call(21570, "A", "T");
        failed_ivar.pass = Some(false);
        let mut failed_lofreq = test_call(21580, "C", "T");
        failed_lofreq.filter_status = "min_dp_10".into();
        let mut calls = vec![failed_ivar, failed_lofreq];

        super::annotate_mutations(&mut calls);

        assert_eq!(calls[0].consequences, Vec::<String>::new());
        assert_eq!(calls[1].consequences, Vec::<String>::new());
    }

    #[test]
    fn filter_boundary_is_inclusive() {
        let mut at_threshold = test_call(100, "A", "G");
        at_threshold.alternate_frequency = Some(0.05);
        let mut below = test_call(200, "C", "T");
        below.alternate_frequency = Some(0.049);
        let mut without = test_call(300, "G", "A");
        without.alternate_frequency = None;

        let filtered = super::filter_merged_calls(
            vec![at_threshold.clone(), below, without.clone()],
            0.05,
        );

        assert_eq!(filtered, vec![at_threshold, without]);
    }

    #[test]
    fn filter_drops_explicit_fails() {
        let mut failed = test_call(100, "A", "G");
        failed.pass = Some(false);
        let mut passed = test_call(200, "C", "T");
        passed.pass = Some(true);

        let filtered = super::filter_merged_calls(vec![failed, passed.clone()], 0.05);

        assert_eq!(filtered, vec![passed]);
    }

    #[test]
    fn ivar_only_scenario() {
        let call = test_call(100, "A", "G");
        let mut call = call;
        call.alternate_frequency = Some(0.5);
        call.pass = Some(true);

        let mut merged = super::merge_calls(vec![call], vec![]);
        super::annotate_mutations(&mut merged);
        let filtered = super::filter_merged_calls(merged, 0.05);

        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].variant_id, "A100G");
    }

    #[rstest::rstest]
    #[case(0.5, "0.5")]
    #[case(0.997, "0.997")]
    #[case(0.4000000059604645, "0.4")]
    #[case(1500.0, "1500")]
    #[case(0.0, "0")]
    fn fmt_num(#[case] value: f64, #[case] expected: &str) {
        assert_eq!(super::fmt_num(value), expected);
    }

    #[test]
    fn run_smoke() -> Result<(), anyhow::Error> {
        let tmp_dir = temp_testdir::TempDir::default();
        let path_out = tmp_dir.join("merged.tsv");
        let path_variants_out = tmp_dir.join("variants.txt");

        let args = super::Args {
            path_ivar: "tests/data/vars/merge/sample.ivar.tsv".into(),
            path_lofreq: "tests/data/vars/merge/sample.lofreq.vcf".into(),
            path_out: path_out.to_str().unwrap().into(),
            path_variants_out: Some(path_variants_out.to_str().unwrap().into()),
            min_af: 0.05,
        };

        super::run(&crate::common::Args::default(), &args)?;

        let output = std::fs::read_to_string(&path_out)?;
        let lines = output.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], super::OUTPUT_HEADER.join("\t"));
        // Expected surviving calls in position order: the iVar insertion at
        // 50, the iVar row winning the tie at 210, the iVar D614G row at
        // 23403, the LoFreq-only deletion at 27750, and the LoFreq row at
        // 28000 whose failed FILTER skips annotation but not the frequency
        // filter. The sub-threshold iVar rows are dropped.
        let ids = lines[1..]
            .iter()
            .map(|line| line.split('\t').nth(18).unwrap())
            .collect::<Vec<_>>();
        assert_eq!(
            ids,
            vec!["50:TT", "A210G", "A23403G", "27750-27754", "C28000T"]
        );

        let sources = lines[1..]
            .iter()
            .map(|line| line.split('\t').nth(17).unwrap())
            .collect::<Vec<_>>();
        assert_eq!(sources, vec!["ivar", "ivar", "ivar", "lofreq", "lofreq"]);

        let mutations = lines[1..]
            .iter()
            .map(|line| line.split('\t').nth(19).unwrap())
            .collect::<Vec<_>>();
        assert_eq!(mutations, vec!["", "", "S:D614G", "ORF7a:119", ""]);

        let variants = std::fs::read_to_string(&path_variants_out)?;
        assert_eq!(variants, "50:TT,A210G,A23403G,27750-27754,C28000T\n");

        Ok(())
    }

    #[test]
    fn run_empty_inputs_write_header_only() -> Result<(), anyhow::Error> {
        let tmp_dir = temp_testdir::TempDir::default();
        let path_out = tmp_dir.join("merged.tsv");

        let args = super::Args {
            path_ivar: "tests/data/vars/merge/no-such-file.tsv".into(),
            path_lofreq: "tests/data/vars/merge/no-such-file.vcf".into(),
            path_out: path_out.to_str().unwrap().into(),
            path_variants_out: None,
            min_af: 0.05,
        };

        super::run(&crate::common::Args::default(), &args)?;

        let output = std::fs::read_to_string(&path_out)?;
        assert_eq!(output, format!("{}\n", super::OUTPUT_HEADER.join("\t")));

        Ok(())
    }
}
