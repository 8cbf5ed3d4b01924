use log::warn;

use crate::bucket_store::BucketStore;
use crate::cli;
use crate::cluster_classifier::{ClassifierSettings, SampleInfo, ScanRole};
use crate::cluster_output::{write_cluster_files, write_cluster_summary};
use crate::errors::PairClusterError;
use crate::extract::{CONTROL_SAMPLE_LABEL, TUMOR_SAMPLE_LABEL};
use crate::orchestrator::{ClusterRunInput, run_all_signatures};
use crate::pair_filter::ReadQualityFilter;
use crate::run_stats::write_cluster_count_reports;

pub const COUNT_REPORT_FILENAME: &str = "cluster.counts.json";
pub const SETTINGS_FILENAME: &str = "cluster.settings.json";

pub fn run_cluster(
    shared_settings: &cli::SharedSettings,
    settings: &cli::ClusterSettings,
) -> Result<(), PairClusterError> {
    cli::write_cluster_settings(&settings.output_dir, settings);

    let store = BucketStore::new(&settings.bucket_dir);
    let classifier_settings = ClassifierSettings {
        pairing_type: settings.pairing_type,
        min_cluster_size: settings.min_cluster_size,
        compare_cluster_size: settings.compare_cluster_size,
        proximity_tolerance: settings.proximity_tolerance,
    };
    let filter = ReadQualityFilter {
        min_aligned_length: settings.min_aligned_length,
        exclude_duplicates: !settings.keep_duplicates,
    };

    let tumor = SampleInfo {
        label: TUMOR_SAMPLE_LABEL.to_string(),
        upper_insert_size: settings.tumor_upper_isize,
    };
    let control = SampleInfo {
        label: CONTROL_SAMPLE_LABEL.to_string(),
        upper_insert_size: settings.control_upper_isize,
    };

    let mut passes = vec![(ScanRole::Tumor, &tumor, &control)];
    if settings.rescue_control_germline {
        passes.push((ScanRole::ControlRescue, &control, &tumor));
    }

    let mut results = Vec::new();
    for (role, find_sample, compare_sample) in passes {
        let input = ClusterRunInput {
            store: &store,
            role,
            settings: &classifier_settings,
            filter: &filter,
            find_sample,
            compare_sample,
        };
        let result = run_all_signatures(&input, shared_settings.thread_count)?;
        write_cluster_files(&settings.output_dir, role, &result.clusters);
        results.push((role, result));
    }

    let summary_input = results
        .iter()
        .map(|(role, result)| (*role, &result.clusters))
        .collect::<Vec<_>>();
    write_cluster_summary(&settings.output_dir, &summary_input);

    let reports = results
        .into_iter()
        .map(|(_, result)| result.report)
        .collect::<Vec<_>>();
    write_cluster_count_reports(&settings.output_dir.join(COUNT_REPORT_FILENAME), &reports);

    let failed_count = reports
        .iter()
        .map(|x| x.failed_signatures.len())
        .sum::<usize>();
    if failed_count > 0 {
        warn!("Clustering failed for {failed_count} signature tasks, see log for details");
    }
    Ok(())
}
