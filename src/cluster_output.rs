use std::fs::File;
use std::io::{BufWriter, Write};

use camino::{Utf8Path, Utf8PathBuf};
use log::info;
use strum::IntoEnumIterator;
use unwrap::unwrap;

use crate::cluster_classifier::{ClassifiedClusters, ScanRole};
use crate::discordant_cluster::{Classification, DiscordantCluster};

pub const CLUSTER_SUMMARY_FILENAME: &str = "discordant_clusters.tsv";

const CLUSTER_SUMMARY_HEADER: &str = "#id\tclassification\tsignature\tsv_type\tregion_from\tregion_to\tleft_breakpoint\tright_breakpoint\trule\tstrand_orientation\tpair_count\tlow_confidence_support";

pub fn get_cluster_filename(
    output_dir: &Utf8Path,
    role: ScanRole,
    classification: Classification,
) -> Utf8PathBuf {
    output_dir.join(format!("{}.{classification}.clusters.txt", role.label()))
}

/// Filename of the tab-delimited member pairs of each cluster
pub fn get_cluster_pairs_filename(
    output_dir: &Utf8Path,
    role: ScanRole,
    classification: Classification,
) -> Utf8PathBuf {
    output_dir.join(format!("{}.{classification}.cluster_pairs.tsv", role.label()))
}

/// Write the detailed report and the member pairs of each cluster, one file of each type per
/// classification
///
/// Files are written for every classification, including those with no clusters. In the member
/// pair file each cluster starts with a "#label" line.
///
pub fn write_cluster_files(output_dir: &Utf8Path, role: ScanRole, clusters: &ClassifiedClusters) {
    for classification in Classification::iter() {
        if classification == Classification::Unclassified {
            continue;
        }
        let filename = get_cluster_filename(output_dir, role, classification);
        let classified = clusters.get(classification);

        info!(
            "Writing {} {classification} clusters to file: '{filename}'",
            classified.len()
        );

        let f = unwrap!(
            File::create(&filename),
            "Unable to create cluster file: '{filename}'"
        );
        let mut f = BufWriter::new(f);
        for cluster in classified.iter() {
            writeln!(f, "{}", cluster.to_verbose_string()).unwrap();
        }

        let pairs_filename = get_cluster_pairs_filename(output_dir, role, classification);
        let f = unwrap!(
            File::create(&pairs_filename),
            "Unable to create cluster pairs file: '{pairs_filename}'"
        );
        let mut f = BufWriter::new(f);
        for cluster in classified.iter() {
            write!(f, "#{}\n{}", cluster.label(), cluster.to_cluster_string()).unwrap();
        }
    }
}

fn get_summary_line(cluster: &DiscordantCluster) -> String {
    let optional = |x: Option<String>| x.unwrap_or_else(|| ".".to_string());
    let (left_breakpoint, right_breakpoint) = match cluster.breakpoints() {
        Some((left, right)) => (left.to_string(), right.to_string()),
        None => (".".to_string(), ".".to_string()),
    };
    [
        cluster.label(),
        cluster.classification.to_string(),
        cluster.signature.to_string(),
        cluster.signature.sv_type_label().to_string(),
        optional(cluster.region_from()),
        optional(cluster.region_to()),
        left_breakpoint,
        right_breakpoint,
        optional(cluster.breakpoint_rule().map(|x| x.code().to_string())),
        optional(cluster.strand_orientation().map(|x| x.to_string())),
        cluster.len().to_string(),
        cluster.low_confidence_support_count.to_string(),
    ]
    .join("\t")
}

/// Classifications included in the summary for each clustering pass
///
/// The control rescue pass only contributes its normal germline clusters.
///
fn is_summarized(role: ScanRole, classification: Classification) -> bool {
    match role {
        ScanRole::Tumor => classification != Classification::Unclassified,
        ScanRole::ControlRescue => classification == Classification::NormalGermline,
    }
}

/// Write a one line per cluster tab-delimited summary of all clustering passes
///
pub fn write_cluster_summary(output_dir: &Utf8Path, runs: &[(ScanRole, &ClassifiedClusters)]) {
    let filename = output_dir.join(CLUSTER_SUMMARY_FILENAME);

    info!("Writing cluster summary to file: '{filename}'");

    let f = unwrap!(
        File::create(&filename),
        "Unable to create cluster summary file: '{filename}'"
    );
    let mut f = BufWriter::new(f);
    writeln!(f, "{CLUSTER_SUMMARY_HEADER}").unwrap();
    for (role, clusters) in runs {
        for classification in Classification::iter() {
            if !is_summarized(*role, classification) {
                continue;
            }
            for cluster in clusters.get(classification).iter() {
                writeln!(f, "{}", get_summary_line(cluster)).unwrap();
            }
        }
    }
}
