//! Common variant call model shared by all callers.

use indexmap::IndexMap;

/// Enum for the variant caller that produced a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum CallerSource {
    /// iVar `variants` TSV output.
    Ivar,
    /// LoFreq VCF output.
    Lofreq,
}

/// Three-way classification of an allele pair, computed once per record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantClass {
    /// Single-base (or same-length) replacement.
    Substitution,
    /// Alternate allele inserts bases after the anchor position.
    Insertion,
    /// Reference allele is longer than the alternate allele.
    Deletion,
    /// Row cannot be assigned a canonical identifier and must be excluded.
    Invalid,
}

impl VariantClass {
    /// Classify a `(reference, alternate)` allele pair.
    ///
    /// Handles both notations seen in practice: iVar marks insertions and
    /// deletions with a leading `+`/`-` on the alternate allele, LoFreq
    /// writes anchor-base prefixed alleles. Insertions are checked before
    /// deletions; an alternate allele that is a bare deletion marker has no
    /// valid alternate bases and is `Invalid`.
    pub fn classify(reference: &str, alternate: &str) -> Self {
        if let Some(inserted) = alternate.strip_prefix('+') {
            if inserted.is_empty() {
                VariantClass::Invalid
            } else {
                VariantClass::Insertion
            }
        } else if alternate.starts_with('-') {
            VariantClass::Invalid
        } else if reference.is_empty() || alternate.is_empty() {
            VariantClass::Invalid
        } else if alternate.len() > reference.len() {
            VariantClass::Insertion
        } else if reference.len() > alternate.len() {
            VariantClass::Deletion
        } else {
            VariantClass::Substitution
        }
    }
}

/// Construct the canonical variant identifier that serves as join key
/// across callers.
///
/// - substitution: `"{ref}{position}{alt}"`
/// - insertion: `"{position}:{inserted_bases}"`
/// - deletion: `"{position}-{position + deleted_bases + 1}"`
///
/// Returns `None` for unclassifiable rows.
pub fn canonical_id(position: u32, reference: &str, alternate: &str) -> Option<String> {
    match VariantClass::classify(reference, alternate) {
        VariantClass::Substitution => Some(format!("{}{}{}", reference, position, alternate)),
        VariantClass::Insertion => {
            // The first character is the iVar `+` marker or the anchor base.
            let inserted = alternate.strip_prefix('+').unwrap_or(&alternate[1..]);
            Some(format!("{}:{}", position, inserted))
        }
        VariantClass::Deletion => {
            Some(format!("{}-{}", position, position as usize + reference.len()))
        }
        VariantClass::Invalid => None,
    }
}

/// One detected genomic variant from one caller.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantCall {
    /// Name of the reference sequence.
    pub region: String,
    /// 1-based position on the reference.
    pub position: u32,
    /// Reference allele.
    pub reference: String,
    /// Alternate allele, caller notation preserved.
    pub alternate: String,
    /// Caller-defined quality score.
    pub quality: Option<f32>,
    /// First failed filter name, empty when the record passed all filters.
    pub filter_status: String,
    /// Reads supporting the reference allele.
    pub reference_depth: i32,
    /// Reverse-strand reads supporting the reference allele.
    pub reference_depth_reverse: i32,
    /// Reads supporting the alternate allele.
    pub alternate_depth: i32,
    /// Reverse-strand reads supporting the alternate allele.
    pub alternate_depth_reverse: i32,
    /// Fraction of reads supporting the alternate allele.
    pub alternate_frequency: Option<f64>,
    /// Total read depth at the position.
    pub total_depth: i32,
    /// Phred-scaled strand bias score (LoFreq only).
    pub strand_bias: Option<i32>,
    /// Caller-supplied effect annotation (LoFreq only).
    pub raw_effect: Option<String>,
    /// Reference amino acid of the affected codon (iVar only).
    pub ref_aa: Option<String>,
    /// Alternate amino acid of the affected codon (iVar only).
    pub alt_aa: Option<String>,
    /// Outcome of iVar's own significance filter (iVar only).
    pub pass: Option<bool>,
    /// The caller that produced the call.
    pub source: CallerSource,
    /// Classification of the allele pair.
    pub class: VariantClass,
    /// Canonical variant identifier.
    pub variant_id: String,
    /// Amino acid consequence strings, filled in by annotation.
    pub consequences: Vec<String>,
}

impl VariantCall {
    /// Whether the call passed its caller's own confidence filter.
    ///
    /// iVar carries an explicit boolean, LoFreq signals failure through a
    /// non-empty FILTER column.
    pub fn passes_filter(&self) -> bool {
        match self.pass {
            Some(pass) => pass,
            None => self.filter_status.is_empty(),
        }
    }
}

/// Drop duplicate `variant_id`s from `calls`, keeping the last occurrence.
///
/// Re-inserted identifiers move to the back so that ordering follows the
/// surviving row, matching a last-write-wins append.
pub fn dedup_keep_last(calls: Vec<VariantCall>) -> Vec<VariantCall> {
    let mut by_id: IndexMap<String, VariantCall> = IndexMap::with_capacity(calls.len());
    for call in calls {
        by_id.shift_remove(&call.variant_id);
        by_id.insert(call.variant_id.clone(), call);
    }
    by_id.into_values().collect()
}

/// Gene intervals of the SARS-CoV-2 reference NC_045512.2, 1-based inclusive.
pub const GENES: &[(&str, (u32, u32))] = &[
    ("ORF1a", (266, 13468)),
    ("ORF1b", (13468, 21555)),
    ("S", (21563, 25384)),
    ("ORF3a", (25393, 26220)),
    ("E", (26245, 26472)),
    ("M", (26523, 27191)),
    ("ORF6", (27202, 27387)),
    ("ORF7a", (27394, 27759)),
    ("ORF7b", (27756, 27887)),
    ("ORF8", (27894, 28259)),
    ("N", (28274, 29533)),
    ("ORF10", (29558, 29674)),
];

/// Return name and start position of the first gene containing `position`.
pub fn gene_at(position: u32) -> Option<(&'static str, u32)> {
    GENES
        .iter()
        .find(|(_, (first, last))| (*first..=*last).contains(&position))
        .map(|(name, (first, _))| (*name, *first))
}
