//! Track extraction and clustering stats, and the classified cluster count report
//!

use std::collections::BTreeMap;
use std::fs::File;

use camino::Utf8Path;
use log::info;
use serde::{Deserialize, Serialize};
use unwrap::unwrap;

use crate::discordant_cluster::Classification;
use crate::pair_signature::PairSignature;

/// Pair extraction stats for one sample
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct ExtractionStats {
    pub sample_label: String,
    pub record_count: usize,

    /// Records skipped for unmapped, secondary, supplementary or QC-fail status
    pub filtered_record_count: usize,

    /// Counts of records rejected by each extraction gate rule
    pub ineligible_record_counts: BTreeMap<String, usize>,

    pub signature_pair_counts: BTreeMap<String, usize>,

    /// Eligible records whose mate never appeared in the stream
    pub unpaired_record_count: usize,

    pub bucket_file_count: usize,
}

impl ExtractionStats {
    pub fn new(sample_label: &str) -> Self {
        Self {
            sample_label: sample_label.to_string(),
            ..Default::default()
        }
    }

    pub fn total_pair_count(&self) -> usize {
        self.signature_pair_counts.values().sum()
    }
}

#[derive(Deserialize, Serialize)]
pub struct ExtractRunStats {
    pub samples: Vec<ExtractionStats>,
}

/// Clustering stats for one signature
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct SignatureClusterStats {
    pub find_pair_count: usize,
    pub compare_pair_count: usize,

    /// Find sample pairs rejected by the eligibility filter
    pub ineligible_pair_count: usize,

    /// Find sample pairs with no orientation category for the library pairing type
    pub uncategorized_pair_count: usize,

    /// Eligible find sample pairs where both mates align over a shared position
    pub overlapping_pair_count: usize,

    pub malformed_line_count: usize,
    pub undersized_cluster_count: usize,

    /// Clusters dropped because no breakpoint rule applies
    pub unresolved_cluster_count: usize,
}

impl SignatureClusterStats {
    pub fn merge(&mut self, other: &Self) {
        self.find_pair_count += other.find_pair_count;
        self.compare_pair_count += other.compare_pair_count;
        self.ineligible_pair_count += other.ineligible_pair_count;
        self.uncategorized_pair_count += other.uncategorized_pair_count;
        self.overlapping_pair_count += other.overlapping_pair_count;
        self.malformed_line_count += other.malformed_line_count;
        self.undersized_cluster_count += other.undersized_cluster_count;
        self.unresolved_cluster_count += other.unresolved_cluster_count;
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct ClassificationCounts {
    pub somatic: usize,
    pub germline: usize,
    pub normal_germline: usize,
}

impl ClassificationCounts {
    fn add(&mut self, classification: Classification, count: usize) {
        match classification {
            Classification::Somatic => self.somatic += count,
            Classification::Germline => self.germline += count,
            Classification::NormalGermline => self.normal_germline += count,
            Classification::Unclassified => {}
        }
    }
}

/// Receives classified cluster counts as each signature completes
///
pub trait CountSink {
    fn add_count(&mut self, signature: PairSignature, classification: Classification, count: usize);
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct SignatureReport {
    pub counts: ClassificationCounts,
    pub stats: SignatureClusterStats,
}

/// Per-signature classified cluster counts for one clustering pass
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct ClusterCountReport {
    pub role: String,
    pub totals: ClassificationCounts,
    pub signatures: BTreeMap<String, SignatureReport>,

    /// Signatures whose pipeline failed, these contribute no clusters
    pub failed_signatures: Vec<String>,
}

impl ClusterCountReport {
    pub fn new(role: &str) -> Self {
        Self {
            role: role.to_string(),
            ..Default::default()
        }
    }

    pub fn add_stats(&mut self, signature: PairSignature, stats: &SignatureClusterStats) {
        self.signatures
            .entry(signature.to_string())
            .or_default()
            .stats
            .merge(stats);
    }

    pub fn add_failed_signature(&mut self, signature: PairSignature) {
        self.failed_signatures.push(signature.to_string());
    }
}

impl CountSink for ClusterCountReport {
    fn add_count(
        &mut self,
        signature: PairSignature,
        classification: Classification,
        count: usize,
    ) {
        self.signatures
            .entry(signature.to_string())
            .or_default()
            .counts
            .add(classification, count);
        self.totals.add(classification, count);
    }
}

fn write_json_file<T: Serialize>(filename: &Utf8Path, label: &str, value: &T) {
    info!("Writing {label} to file: '{filename}'");

    let f = unwrap!(
        File::create(filename),
        "Unable to create {label} json file: '{filename}'"
    );

    serde_json::to_writer_pretty(&f, value).unwrap();
}

/// Write extraction stats out in json format
pub fn write_extract_run_stats(filename: &Utf8Path, run_stats: &ExtractRunStats) {
    write_json_file(filename, "extraction statistics", run_stats);
}

/// Write cluster count reports out in json format
pub fn write_cluster_count_reports(filename: &Utf8Path, reports: &[ClusterCountReport]) {
    write_json_file(filename, "cluster count report", &reports);
}
