//! Find discordant pair clusters in one sample and classify them against a compare sample
//!

use log::{info, warn};
use thousands::Separable;

use crate::bucket_store::BucketStore;
use crate::discordant_cluster::{
    Classification, CompareWindow, DiscordantCluster, cmp_cluster_report_order,
};
use crate::errors::PairClusterError;
use crate::log_utils::debug_msg;
use crate::mate_pair::{MatePair, PairSortKey, sort_mate_pairs};
use crate::pair_filter::{PairFilter, is_eligible_pair};
use crate::pair_signature::{OrientationCategory, PairSignature, PairingType};
use crate::run_stats::SignatureClusterStats;

/// Somatic cluster count per signature above which a warning is logged
pub const SOMATIC_CLUSTER_WARNING_COUNT: usize = 10_000;

/// Germline cluster count per signature above which a warning is logged
pub const GERMLINE_CLUSTER_WARNING_COUNT: usize = 50_000;

/// Sample label and insert size bound used to size cluster and compare windows
#[derive(Clone, Debug)]
pub struct SampleInfo {
    pub label: String,
    pub upper_insert_size: i64,
}

/// Which sample is scanned for clusters
///
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ScanRole {
    /// Tumor clusters, unmatched clusters are somatic
    Tumor,

    /// Control clusters, unmatched clusters are rescued as normal germline
    ControlRescue,
}

impl ScanRole {
    pub fn label(&self) -> &'static str {
        match self {
            ScanRole::Tumor => "tumor",
            ScanRole::ControlRescue => "control",
        }
    }

    fn unmatched_classification(&self) -> Classification {
        match self {
            ScanRole::Tumor => Classification::Somatic,
            ScanRole::ControlRescue => Classification::NormalGermline,
        }
    }
}

pub struct ClassifierSettings {
    pub pairing_type: PairingType,

    /// Clusters with fewer member pairs are dropped
    pub min_cluster_size: usize,

    /// Number of eligible compare sample pairs required to classify a cluster as germline
    pub compare_cluster_size: usize,

    /// Maximum gap between a new pair and a cluster envelope for the pair to join the cluster.
    /// Defaults to the find sample's upper insert size.
    pub proximity_tolerance: Option<i64>,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            pairing_type: PairingType::Pe,
            min_cluster_size: 2,
            compare_cluster_size: 1,
            proximity_tolerance: None,
        }
    }
}

/// Classified clusters grouped by classification
///
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClassifiedClusters {
    pub somatic: Vec<DiscordantCluster>,
    pub germline: Vec<DiscordantCluster>,
    pub normal_germline: Vec<DiscordantCluster>,
}

impl ClassifiedClusters {
    pub fn get(&self, classification: Classification) -> &[DiscordantCluster] {
        match classification {
            Classification::Somatic => &self.somatic,
            Classification::Germline => &self.germline,
            Classification::NormalGermline => &self.normal_germline,
            Classification::Unclassified => &[],
        }
    }

    fn get_mut(&mut self, classification: Classification) -> Option<&mut Vec<DiscordantCluster>> {
        match classification {
            Classification::Somatic => Some(&mut self.somatic),
            Classification::Germline => Some(&mut self.germline),
            Classification::NormalGermline => Some(&mut self.normal_germline),
            Classification::Unclassified => None,
        }
    }

    /// Assign the next id in the cluster's classification and store it
    ///
    fn push(&mut self, mut cluster: DiscordantCluster, classification: Classification) {
        if let Some(clusters) = self.get_mut(classification) {
            cluster.set_classification(classification, clusters.len() + 1);
            clusters.push(cluster);
        }
    }

    pub fn total_count(&self) -> usize {
        self.somatic.len() + self.germline.len() + self.normal_germline.len()
    }

    /// Append all clusters from `other`, keeping their existing ids
    ///
    pub fn extend(&mut self, other: ClassifiedClusters) {
        self.somatic.extend(other.somatic);
        self.germline.extend(other.germline);
        self.normal_germline.extend(other.normal_germline);
    }
}

#[derive(Default)]
pub struct SignatureClusterResult {
    pub clusters: ClassifiedClusters,
    pub stats: SignatureClusterStats,
}

/// Compare sample pairs sorted by left mate start, for windowed lookup
///
struct ComparePairIndex {
    pairs: Vec<MatePair>,

    /// Longest left mate alignment, bounds how far before a window a matching pair can start
    max_left_span: i64,
}

impl ComparePairIndex {
    fn new(mut pairs: Vec<MatePair>) -> Self {
        sort_mate_pairs(&mut pairs, PairSortKey::LeftStart);
        let max_left_span = pairs
            .iter()
            .map(|x| x.left.end - x.left.start)
            .max()
            .unwrap_or(0);
        Self {
            pairs,
            max_left_span,
        }
    }

    /// Pairs which could have a left mate end inside the window's left region
    ///
    fn candidates<'a>(&'a self, window: &CompareWindow) -> impl Iterator<Item = &'a MatePair> {
        let min_start = window.left.start - self.max_left_span;
        let max_start = window.left.end;
        let first = self.pairs.partition_point(|x| x.left.start < min_start);
        self.pairs[first..]
            .iter()
            .take_while(move |x| x.left.start <= max_start)
    }
}

/// Sort pairs by chromosome pair, then by mate positions
///
fn get_pair_sort_key(pair: &MatePair) -> (&str, &str, i64, i64, i64, i64) {
    (
        &pair.left.chrom,
        &pair.right.chrom,
        pair.left.start,
        pair.left.end,
        pair.right.start,
        pair.right.end,
    )
}

fn is_same_chrom_pair(cluster: &DiscordantCluster, pair: &MatePair) -> bool {
    cluster.left_chrom == pair.left.chrom && cluster.right_chrom == pair.right.chrom
}

/// Check whether a cluster can no longer accept pairs from the sorted pair stream
///
fn is_cluster_passed(
    cluster: &DiscordantCluster,
    pair: &MatePair,
    tolerance: i64,
    window: i64,
) -> bool {
    if !is_same_chrom_pair(cluster, pair) {
        return true;
    }
    match cluster.bounds() {
        Some(b) => {
            pair.left.start > b.left_end + tolerance || pair.left.start - b.left_start > window
        }
        None => true,
    }
}

fn can_join_cluster(
    cluster: &DiscordantCluster,
    pair: &MatePair,
    category: OrientationCategory,
    tolerance: i64,
    window: i64,
) -> bool {
    if cluster.orientation_category != category
        || is_cluster_passed(cluster, pair, tolerance, window)
    {
        return false;
    }
    let Some(b) = cluster.bounds() else {
        return false;
    };
    if pair.right.start < b.right_start - tolerance || pair.right.start > b.right_end + tolerance {
        return false;
    }

    // Members are ordered by right start, so the last member has the largest right start
    let max_right_start = cluster
        .members()
        .last()
        .map_or(pair.right.start, |x| x.right.start.max(pair.right.start));
    let min_right_start = b.right_start.min(pair.right.start);
    max_right_start - min_right_start <= window
}

pub struct ClusterClassifier<'a> {
    signature: PairSignature,
    role: ScanRole,
    settings: &'a ClassifierSettings,
    filter: &'a dyn PairFilter,
    find_sample: &'a SampleInfo,
    compare_sample: &'a SampleInfo,
}

impl<'a> ClusterClassifier<'a> {
    pub fn new(
        signature: PairSignature,
        role: ScanRole,
        settings: &'a ClassifierSettings,
        filter: &'a dyn PairFilter,
        find_sample: &'a SampleInfo,
        compare_sample: &'a SampleInfo,
    ) -> Self {
        Self {
            signature,
            role,
            settings,
            filter,
            find_sample,
            compare_sample,
        }
    }

    fn proximity_tolerance(&self) -> i64 {
        self.settings
            .proximity_tolerance
            .unwrap_or(self.find_sample.upper_insert_size)
    }

    /// Group eligible find sample pairs into clusters
    ///
    /// The result does not depend on the order of `pairs`. Clusters below the minimum size, or
    /// with no applicable breakpoint rule, are dropped.
    ///
    pub fn find_clusters(
        &self,
        pairs: Vec<MatePair>,
        stats: &mut SignatureClusterStats,
    ) -> Vec<DiscordantCluster> {
        let debug = false;
        let tolerance = self.proximity_tolerance();
        let window = self.find_sample.upper_insert_size;

        let mut pairs = pairs
            .into_iter()
            .filter(|pair| {
                let is_eligible = is_eligible_pair(self.filter, pair);
                if !is_eligible {
                    stats.ineligible_pair_count += 1;
                } else if pair.has_overlap() {
                    stats.overlapping_pair_count += 1;
                }
                is_eligible
            })
            .collect::<Vec<_>>();

        pairs.sort_by(|a, b| {
            get_pair_sort_key(a)
                .cmp(&get_pair_sort_key(b))
                .then_with(|| a.read_name.cmp(&b.read_name))
                .then_with(|| a.pair_order.cmp(&b.pair_order))
                .then_with(|| (a.left.flags, a.right.flags).cmp(&(b.left.flags, b.right.flags)))
        });

        let mut open_clusters: Vec<DiscordantCluster> = Vec::new();
        let mut passed_clusters = Vec::new();
        for pair in pairs {
            let Some(category) = pair.orientation_category(self.settings.pairing_type) else {
                stats.uncategorized_pair_count += 1;
                continue;
            };

            let (passed, open): (Vec<_>, Vec<_>) = open_clusters
                .into_iter()
                .partition(|x| is_cluster_passed(x, &pair, tolerance, window));
            passed_clusters.extend(passed);
            open_clusters = open;

            match open_clusters
                .iter_mut()
                .rev()
                .find(|x| can_join_cluster(x, &pair, category, tolerance, window))
            {
                Some(cluster) => cluster.add_member(pair),
                None => {
                    let mut cluster = DiscordantCluster::new(
                        self.signature,
                        &pair.left.chrom,
                        &pair.right.chrom,
                        category,
                    );
                    cluster.add_member(pair);
                    open_clusters.push(cluster);
                }
            }
        }
        passed_clusters.extend(open_clusters);

        let mut clusters = Vec::new();
        for mut cluster in passed_clusters {
            if cluster.len() < self.settings.min_cluster_size {
                stats.undersized_cluster_count += 1;
                continue;
            }
            cluster.tally_strand_orientations();
            if let Err(e) = cluster.resolve_breakpoint_rule() {
                warn!("Dropping cluster {:?}: {e}", cluster.region_from());
                stats.unresolved_cluster_count += 1;
                continue;
            }
            debug_msg!(
                debug,
                "{} cluster {:?} {:?} size {}",
                self.signature,
                cluster.region_from(),
                cluster.region_to(),
                cluster.len()
            );
            clusters.push(cluster);
        }
        clusters.sort_by(cmp_cluster_report_order);
        clusters
    }

    /// Classify each cluster by searching for supporting pairs in the compare sample
    ///
    /// Clusters are appended to `result` in input order, with ids assigned per classification.
    ///
    pub fn classify_clusters(
        &self,
        clusters: Vec<DiscordantCluster>,
        compare_pairs: Vec<MatePair>,
        result: &mut ClassifiedClusters,
    ) {
        let index = ComparePairIndex::new(compare_pairs);
        let compare_window_size = self.compare_sample.upper_insert_size;

        for mut cluster in clusters {
            let Some(window) = cluster.expanded_compare_window(compare_window_size) else {
                continue;
            };

            let mut matched_pairs = Vec::new();
            let mut low_confidence_count = 0;
            for pair in index.candidates(&window) {
                if !is_same_chrom_pair(&cluster, pair) || !window.matches(pair) {
                    continue;
                }
                if is_eligible_pair(self.filter, pair) {
                    matched_pairs.push(pair.clone());
                } else {
                    low_confidence_count += 1;
                }
            }

            let classification = if matched_pairs.len() >= self.settings.compare_cluster_size {
                Classification::Germline
            } else {
                cluster.low_confidence_support_count = low_confidence_count + matched_pairs.len();
                self.role.unmatched_classification()
            };
            cluster.matched_compare_pairs = matched_pairs;
            result.push(cluster, classification);
        }
    }

    /// Cluster and classify all stored pairs for this signature, one chromosome pair at a time
    ///
    pub fn run(&self, store: &BucketStore) -> Result<SignatureClusterResult, PairClusterError> {
        let mut result = SignatureClusterResult::default();

        let find_label = &self.find_sample.label;
        let compare_label = &self.compare_sample.label;
        for chrom_pair in store.chrom_pairs(self.signature, find_label)? {
            let mut reader = store.read_chrom_pair(self.signature, find_label, &chrom_pair)?;
            let find_pairs = reader.by_ref().collect::<Result<Vec<_>, _>>()?;
            result.stats.malformed_line_count += reader.malformed_line_count();
            result.stats.find_pair_count += find_pairs.len();

            let clusters = self.find_clusters(find_pairs, &mut result.stats);
            if clusters.is_empty() {
                continue;
            }

            let mut reader = store.read_chrom_pair(self.signature, compare_label, &chrom_pair)?;
            let compare_pairs = reader.by_ref().collect::<Result<Vec<_>, _>>()?;
            result.stats.malformed_line_count += reader.malformed_line_count();
            result.stats.compare_pair_count += compare_pairs.len();

            self.classify_clusters(clusters, compare_pairs, &mut result.clusters);
        }

        if result.stats.malformed_line_count > 0 {
            warn!(
                "Skipped {} malformed lines in {} buckets",
                result.stats.malformed_line_count, self.signature
            );
        }
        self.warn_on_large_cluster_counts(&result.clusters);

        let clusters = &result.clusters;
        info!(
            "Finished {} {} clustering: {} pairs, {} somatic, {} germline, {} normal-germline clusters",
            self.role.label(),
            self.signature,
            result.stats.find_pair_count.separate_with_commas(),
            clusters.somatic.len().separate_with_commas(),
            clusters.germline.len().separate_with_commas(),
            clusters.normal_germline.len().separate_with_commas()
        );

        Ok(result)
    }

    fn warn_on_large_cluster_counts(&self, clusters: &ClassifiedClusters) {
        if clusters.somatic.len() > SOMATIC_CLUSTER_WARNING_COUNT {
            warn!(
                "Found {} somatic {} clusters, alignment or pair classification quality may be poor",
                clusters.somatic.len().separate_with_commas(),
                self.signature
            );
        }
        if clusters.germline.len() > GERMLINE_CLUSTER_WARNING_COUNT {
            warn!(
                "Found {} germline {} clusters, alignment or pair classification quality may be poor",
                clusters.germline.len().separate_with_commas(),
                self.signature
            );
        }
    }
}
