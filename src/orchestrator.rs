//! Run the clustering pipeline for every pair signature and merge the results
//!

use std::sync::mpsc::channel;

use log::{error, info};
use strum::{EnumCount, IntoEnumIterator};
use thousands::Separable;

use crate::bucket_store::BucketStore;
use crate::cluster_classifier::{
    ClassifiedClusters, ClassifierSettings, ClusterClassifier, SampleInfo, ScanRole,
    SignatureClusterResult,
};
use crate::discordant_cluster::Classification;
use crate::errors::PairClusterError;
use crate::pair_filter::PairFilter;
use crate::pair_signature::PairSignature;
use crate::run_stats::{ClusterCountReport, CountSink};

/// Final classified clusters and counts from one clustering pass
pub struct ClusterRunResult {
    pub clusters: ClassifiedClusters,
    pub report: ClusterCountReport,
}

/// Input shared by all signature tasks of one clustering pass
pub struct ClusterRunInput<'a> {
    pub store: &'a BucketStore,
    pub role: ScanRole,
    pub settings: &'a ClassifierSettings,
    pub filter: &'a dyn PairFilter,
    pub find_sample: &'a SampleInfo,
    pub compare_sample: &'a SampleInfo,
}

/// Worker count for a clustering pass, at most one worker per signature task
fn get_worker_count(thread_count: usize) -> usize {
    thread_count.clamp(1, PairSignature::COUNT)
}

/// Cluster and classify every pair signature concurrently
///
/// Each signature runs as an independent task. A task that fails is logged and recorded as a
/// failed signature in the count report, and contributes no clusters. Only failure to start the
/// worker pool is an error for the whole pass.
///
pub fn run_all_signatures(
    input: &ClusterRunInput,
    thread_count: usize,
) -> Result<ClusterRunResult, PairClusterError> {
    info!(
        "Clustering {} sample pairs against {} sample",
        input.find_sample.label, input.compare_sample.label
    );

    let worker_pool = rayon::ThreadPoolBuilder::new()
        .num_threads(get_worker_count(thread_count))
        .build()
        .map_err(|e| PairClusterError::WorkerPool(e.to_string()))?;

    let (tx, rx) = channel();
    worker_pool.scope(move |scope| {
        for signature in PairSignature::iter() {
            let tx = tx.clone();
            scope.spawn(move |_| {
                let classifier = ClusterClassifier::new(
                    signature,
                    input.role,
                    input.settings,
                    input.filter,
                    input.find_sample,
                    input.compare_sample,
                );
                let result = classifier.run(input.store);
                tx.send((signature, result)).unwrap();
            });
        }
    });

    // The scope has joined all tasks, so every result is already in the channel
    let mut signature_results = rx.into_iter().collect::<Vec<_>>();
    signature_results.sort_by_key(|(signature, _)| *signature);

    let mut run_result = ClusterRunResult {
        clusters: ClassifiedClusters::default(),
        report: ClusterCountReport::new(input.role.label()),
    };
    for (signature, result) in signature_results {
        let result = match result {
            Ok(x) => x,
            Err(e) => {
                error!("Clustering failed for signature {signature}: {e}");
                run_result.report.add_failed_signature(signature);
                SignatureClusterResult::default()
            }
        };
        merge_signature_result(signature, result, &mut run_result);
    }

    let totals = &run_result.report.totals;
    info!(
        "Finished {} clustering: {} clusters ({} somatic, {} germline, {} normal-germline)",
        input.role.label(),
        run_result.clusters.total_count().separate_with_commas(),
        totals.somatic.separate_with_commas(),
        totals.germline.separate_with_commas(),
        totals.normal_germline.separate_with_commas()
    );

    Ok(run_result)
}

fn merge_signature_result(
    signature: PairSignature,
    result: SignatureClusterResult,
    run_result: &mut ClusterRunResult,
) {
    for classification in Classification::iter() {
        let count = result.clusters.get(classification).len();
        if count > 0 {
            run_result.report.add_count(signature, classification, count);
        }
    }
    run_result.report.add_stats(signature, &result.stats);
    run_result.clusters.extend(result.clusters);
}
