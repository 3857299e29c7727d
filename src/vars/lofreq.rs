//! Reading of LoFreq VCF output.

use std::path::Path;

use itertools::Itertools;
use noodles_vcf as vcf;
use vcf::record::info::field::{key, value::Array, Key, Value};

use crate::common::open_read_maybe_gz;

use super::calls::{canonical_id, CallerSource, VariantCall, VariantClass};

/// Pre-parsed INFO keys used by the LoFreq reader.
struct InfoKeys {
    /// Total read depth (`DP`).
    dp: Key,
    /// Allele frequency (`AF`).
    af: Key,
    /// Phred-scaled strand bias (`SB`).
    sb: Key,
    /// Depth by allele and strand (`DP4`).
    dp4: Key,
    /// SnpEff effect annotation (`EFF`).
    eff: Key,
}

impl InfoKeys {
    fn new() -> Result<Self, anyhow::Error> {
        Ok(Self {
            dp: key::TOTAL_DEPTH,
            af: key::ALLELE_FREQUENCIES,
            sb: "SB"
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid key SB: {}", e))?,
            dp4: "DP4"
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid key DP4: {}", e))?,
            eff: "EFF"
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid key EFF: {}", e))?,
        })
    }
}

/// Extract `INFO/DP4` as (ref fwd, ref rev, alt fwd, alt rev).
fn extract_dp4(record: &vcf::Record, keys: &InfoKeys) -> Result<(i32, i32, i32, i32), anyhow::Error> {
    if let Some(Some(Value::Array(Array::Integer(values)))) = record.info().get(&keys.dp4) {
        let values = values
            .iter()
            .map(|value| value.unwrap_or_default())
            .collect::<Vec<_>>();
        if values.len() == 4 {
            return Ok((values[0], values[1], values[2], values[3]));
        }
    }
    anyhow::bail!("missing or invalid INFO/DP4")
}

/// Extract `INFO/AF`; LoFreq writes a single float but the reserved key is
/// typed `Number=A` so both shapes are accepted.
fn extract_af(record: &vcf::Record, keys: &InfoKeys) -> Option<f64> {
    match record.info().get(&keys.af) {
        Some(Some(Value::Float(af))) => Some(*af as f64),
        Some(Some(Value::Array(Array::Float(afs)))) => {
            afs.first().copied().flatten().map(|af| af as f64)
        }
        _ => None,
    }
}

/// Convert one VCF record into a `VariantCall`; `None` when unclassifiable.
fn call_from_record(
    record: &vcf::Record,
    keys: &InfoKeys,
) -> Result<Option<VariantCall>, anyhow::Error> {
    let region = record.chromosome().to_string();
    let position = usize::from(record.position()) as u32;
    let reference = record.reference_bases().to_string();
    let alternate = record
        .alternate_bases()
        .first()
        .ok_or_else(|| anyhow::anyhow!("record at position {} has no alternate allele", position))?
        .to_string();

    let variant_id = match canonical_id(position, &reference, &alternate) {
        Some(variant_id) => variant_id,
        None => return Ok(None),
    };

    let filter_status = match record.filters() {
        None | Some(vcf::record::Filters::Pass) => String::new(),
        Some(vcf::record::Filters::Fail(names)) => {
            names.iter().next().cloned().unwrap_or_default()
        }
    };

    let (ref_fwd, ref_rev, alt_fwd, alt_rev) = extract_dp4(record, keys)?;
    let total_depth = if let Some(Some(Value::Integer(dp))) = record.info().get(&keys.dp) {
        *dp
    } else {
        0
    };
    let strand_bias = if let Some(Some(Value::Integer(sb))) = record.info().get(&keys.sb) {
        Some(*sb)
    } else {
        None
    };
    let raw_effect = match record.info().get(&keys.eff) {
        Some(Some(Value::String(eff))) => Some(eff.clone()),
        Some(Some(Value::Array(Array::String(effs)))) => Some(effs.iter().flatten().join(",")),
        _ => None,
    };

    Ok(Some(VariantCall {
        region,
        position,
        quality: record.quality_score().map(f32::from),
        filter_status,
        reference_depth: ref_fwd + ref_rev,
        reference_depth_reverse: ref_rev,
        alternate_depth: alt_fwd + alt_rev,
        alternate_depth_reverse: alt_rev,
        alternate_frequency: extract_af(record, keys),
        total_depth,
        strand_bias,
        raw_effect,
        ref_aa: None,
        alt_aa: None,
        pass: None,
        source: CallerSource::Lofreq,
        class: VariantClass::classify(&reference, &alternate),
        variant_id,
        reference,
        alternate,
        consequences: Vec::new(),
    }))
}

/// Read LoFreq calls from the VCF file at `path`.
///
/// A missing or unreadable file degrades to an empty record set with a
/// warning; the surrounding pipeline decides what that means for a sample.
/// Records lacking the required depth fields are skipped with a warning.
pub fn read_lofreq<P>(path: P) -> Vec<VariantCall>
where
    P: AsRef<Path>,
{
    match try_read_lofreq(path.as_ref()) {
        Ok(calls) => calls,
        Err(e) => {
            tracing::warn!(
                "could not read LoFreq VCF {:?}: {}; treating as zero records",
                path.as_ref(),
                e
            );
            Vec::new()
        }
    }
}

fn try_read_lofreq(path: &Path) -> Result<Vec<VariantCall>, anyhow::Error> {
    let keys = InfoKeys::new()?;
    let mut reader = vcf::Reader::new(open_read_maybe_gz(path)?);
    let header = reader
        .read_header()
        .map_err(|e| anyhow::anyhow!("problem reading VCF header: {}", e))?;

    let mut calls = Vec::new();
    for result in reader.records(&header) {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("skipping malformed VCF record: {}", e);
                continue;
            }
        };
        match call_from_record(&record, &keys) {
            Ok(Some(call)) => calls.push(call),
            Ok(None) => (),
            Err(e) => tracing::warn!("skipping LoFreq record: {}", e),
        }
    }

    Ok(calls)
}
