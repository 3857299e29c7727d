//! Reading of iVar `variants` TSV output.

use serde::{Deserialize, Deserializer};

use crate::common::open_read_maybe_gz;

use super::calls::{canonical_id, dedup_keep_last, CallerSource, VariantCall, VariantClass};

/// Deserialize iVar's upper case `TRUE`/`FALSE` boolean notation.
fn from_ivar_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    match s.as_str() {
        "TRUE" | "True" | "true" => Ok(true),
        "FALSE" | "False" | "false" => Ok(false),
        _ => Err(serde::de::Error::custom(format!(
            "invalid boolean value: {:?}",
            s
        ))),
    }
}

/// iVar variant record as read from the TSV file.
#[derive(Debug, Deserialize)]
pub struct IvarRecord {
    /// Name of the reference sequence.
    #[serde(rename = "REGION")]
    pub region: String,
    /// 1-based position of the call.
    #[serde(rename = "POS")]
    pub pos: u32,
    /// Reference allele.
    #[serde(rename = "REF")]
    pub reference: String,
    /// Alternate allele in iVar notation (`+`/`-` prefix for indels).
    #[serde(rename = "ALT")]
    pub alternate: String,
    /// Reads supporting the reference allele.
    #[serde(rename = "REF_DP")]
    pub ref_dp: i32,
    /// Reverse-strand reads supporting the reference allele.
    #[serde(rename = "REF_RV")]
    pub ref_rv: i32,
    /// Mean quality of reference-supporting bases.
    #[serde(rename = "REF_QUAL")]
    pub ref_qual: f64,
    /// Reads supporting the alternate allele.
    #[serde(rename = "ALT_DP")]
    pub alt_dp: i32,
    /// Reverse-strand reads supporting the alternate allele.
    #[serde(rename = "ALT_RV")]
    pub alt_rv: i32,
    /// Mean quality of alternate-supporting bases.
    #[serde(rename = "ALT_QUAL")]
    pub alt_qual: f64,
    /// Fraction of reads supporting the alternate allele.
    #[serde(rename = "ALT_FREQ")]
    pub alt_freq: f64,
    /// Total read depth at the position.
    #[serde(rename = "TOTAL_DP")]
    pub total_dp: i32,
    /// p-value of iVar's significance test.
    #[serde(rename = "PVAL")]
    pub pval: f64,
    /// Outcome of iVar's significance filter.
    #[serde(rename = "PASS", deserialize_with = "from_ivar_bool")]
    pub pass: bool,
    /// GFF feature the call falls into, `NA` outside of features.
    #[serde(rename = "GFF_FEATURE")]
    pub gff_feature: String,
    /// Reference codon.
    #[serde(rename = "REF_CODON")]
    pub ref_codon: String,
    /// Reference amino acid.
    #[serde(rename = "REF_AA")]
    pub ref_aa: String,
    /// Alternate codon.
    #[serde(rename = "ALT_CODON")]
    pub alt_codon: String,
    /// Alternate amino acid.
    #[serde(rename = "ALT_AA")]
    pub alt_aa: String,
}

impl IvarRecord {
    /// Convert to the common call model; `None` for unclassifiable rows.
    fn into_call(self) -> Option<VariantCall> {
        let variant_id = canonical_id(self.pos, &self.reference, &self.alternate)?;
        Some(VariantCall {
            region: self.region,
            position: self.pos,
            quality: None,
            filter_status: String::new(),
            reference_depth: self.ref_dp,
            reference_depth_reverse: self.ref_rv,
            alternate_depth: self.alt_dp,
            alternate_depth_reverse: self.alt_rv,
            alternate_frequency: Some(self.alt_freq),
            total_depth: self.total_dp,
            strand_bias: None,
            raw_effect: None,
            ref_aa: Some(self.ref_aa),
            alt_aa: Some(self.alt_aa),
            pass: Some(self.pass),
            source: CallerSource::Ivar,
            class: VariantClass::classify(&self.reference, &self.alternate),
            variant_id,
            reference: self.reference,
            alternate: self.alternate,
            consequences: Vec::new(),
        })
    }
}

/// Read iVar calls from the TSV file at `path`.
///
/// A missing file and an empty table both yield an empty record set.
/// Malformed rows are skipped with a warning so a single bad line cannot
/// poison the join key of the remaining calls. Rows whose alternate allele
/// is a bare deletion marker are excluded. Duplicate canonical identifiers
/// keep the last occurrence.
pub fn read_ivar<P>(path: P) -> Result<Vec<VariantCall>, anyhow::Error>
where
    P: AsRef<std::path::Path>,
{
    if !path.as_ref().exists() {
        tracing::warn!(
            "iVar input {:?} does not exist; treating as zero records",
            path.as_ref()
        );
        return Ok(Vec::new());
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .from_reader(open_read_maybe_gz(path.as_ref())?);

    let mut calls = Vec::new();
    for (idx, result) in reader.deserialize::<IvarRecord>().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("skipping malformed iVar row {}: {}", idx + 2, e);
                continue;
            }
        };
        match record.into_call() {
            Some(call) => calls.push(call),
            None => {
                tracing::debug!("excluding iVar row {} without valid alternate allele", idx + 2)
            }
        }
    }

    Ok(dedup_keep_last(calls))
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::vars::calls::{CallerSource, VariantClass};

    #[test]
    fn read_ivar_fixture() -> Result<(), anyhow::Error> {
        let calls = super::read_ivar("tests/data/vars/merge/sample.ivar.tsv")?;

        // The fixture holds seven rows: one deletion-marker row that must be
        // excluded and two rows sharing the id `A210G` of which the last wins.
        assert_eq!(calls.len(), 5);
        assert_eq!(
            calls
                .iter()
                .map(|call| call.variant_id.as_str())
                .collect::<Vec<_>>(),
            vec!["50:TT", "A23403G", "C28887T", "T29000C", "A210G"]
        );

        let insertion = &calls[0];
        assert_eq!(insertion.class, VariantClass::Insertion);
        assert_eq!(insertion.source, CallerSource::Ivar);

        let dup = calls.last().unwrap();
        assert!(float_cmp::approx_eq!(
            f64,
            dup.alternate_frequency.unwrap(),
            0.8,
            ulps = 2
        ));

        Ok(())
    }

    #[test]
    fn read_ivar_missing_file() -> Result<(), anyhow::Error> {
        let calls = super::read_ivar("tests/data/vars/merge/no-such-file.tsv")?;

        assert_eq!(calls, vec![]);

        Ok(())
    }

    #[test]
    fn read_ivar_header_only() -> Result<(), anyhow::Error> {
        let calls = super::read_ivar("tests/data/vars/merge/empty.ivar.tsv")?;

        assert_eq!(calls, vec![]);

        Ok(())
    }
}
