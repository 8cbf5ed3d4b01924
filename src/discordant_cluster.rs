//! Clusters of discordant mate pairs supporting one candidate structural variant
//!

use std::cmp::Ordering;
use std::fmt::Write;

use strum::{Display, EnumIter};

use crate::breakpoint_rule::{BreakpointRule, resolve_breakpoint_rule};
use crate::chrom_names::compare_chrom_names;
use crate::errors::PairClusterError;
use crate::int_range::IntRange;
use crate::mate_pair::{MatePair, StrandOrientation};
use crate::pair_signature::{OrientationCategory, PairSignature};

#[derive(Clone, Copy, Debug, Default, Display, EnumIter, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Classification {
    #[default]
    #[strum(to_string = "unclassified")]
    Unclassified,
    #[strum(to_string = "somatic")]
    Somatic,
    #[strum(to_string = "germline")]
    Germline,
    #[strum(to_string = "normal-germline")]
    NormalGermline,
}

/// Envelope of all member mates on each side of a cluster, 1-indexed inclusive
///
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ClusterBounds {
    pub left_start: i64,
    pub left_end: i64,
    pub right_start: i64,
    pub right_end: i64,
}

impl ClusterBounds {
    fn from_pair(pair: &MatePair) -> Self {
        Self {
            left_start: pair.left.start,
            left_end: pair.left.end,
            right_start: pair.right.start,
            right_end: pair.right.end,
        }
    }

    fn add_pair(&mut self, pair: &MatePair) {
        self.left_start = self.left_start.min(pair.left.start);
        self.left_end = self.left_end.max(pair.left.end);
        self.right_start = self.right_start.min(pair.right.start);
        self.right_end = self.right_end.max(pair.right.end);
    }

    pub fn left_range(&self) -> IntRange {
        IntRange::from_pair(self.left_start, self.left_end)
    }

    pub fn right_range(&self) -> IntRange {
        IntRange::from_pair(self.right_start, self.right_end)
    }
}

/// Regions of the compare sample searched for evidence matching a cluster
///
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CompareWindow {
    pub left: IntRange,
    pub right: IntRange,
}

impl CompareWindow {
    /// A pair matches if either end of its left mate lies in the left window, and either end of
    /// its right mate lies in the right window. Chromosomes are not checked here.
    ///
    pub fn matches(&self, pair: &MatePair) -> bool {
        pair.left.touches(&self.left) && pair.right.touches(&self.right)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DiscordantCluster {
    pub signature: PairSignature,
    pub left_chrom: String,
    pub right_chrom: String,

    /// Orientation category shared by all members
    pub orientation_category: OrientationCategory,

    /// Index of the cluster within its classification, 1-based, 0 until classified
    pub id: usize,
    pub classification: Classification,

    /// Sorted by right mate start
    members: Vec<MatePair>,

    /// Undefined until the first member is added
    bounds: Option<ClusterBounds>,

    /// Counts of each strand orientation in the order each was first observed
    strand_orientation_counts: Vec<(StrandOrientation, usize)>,
    strand_orientation: Option<StrandOrientation>,
    breakpoint_rule: Option<BreakpointRule>,

    /// Compare sample pairs found in the compare window which passed the eligibility filter
    pub matched_compare_pairs: Vec<MatePair>,

    /// Compare sample pairs supporting the cluster without enough confidence to classify it as germline
    pub low_confidence_support_count: usize,
}

impl DiscordantCluster {
    pub fn new(
        signature: PairSignature,
        left_chrom: &str,
        right_chrom: &str,
        orientation_category: OrientationCategory,
    ) -> Self {
        Self {
            signature,
            left_chrom: left_chrom.to_string(),
            right_chrom: right_chrom.to_string(),
            orientation_category,
            id: 0,
            classification: Classification::Unclassified,
            members: Vec::new(),
            bounds: None,
            strand_orientation_counts: Vec::new(),
            strand_orientation: None,
            breakpoint_rule: None,
            matched_compare_pairs: Vec::new(),
            low_confidence_support_count: 0,
        }
    }

    pub fn members(&self) -> &[MatePair] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn bounds(&self) -> Option<&ClusterBounds> {
        self.bounds.as_ref()
    }

    /// Position at which `pair` is inserted to keep members ordered by right mate start
    ///
    /// Pairs with equal right start are placed after existing members.
    ///
    pub fn find_insertion_index(&self, pair: &MatePair) -> usize {
        self.members
            .partition_point(|x| x.right.start <= pair.right.start)
    }

    /// Add a pair to the cluster, widening the cluster envelope to include it
    ///
    pub fn add_member(&mut self, pair: MatePair) {
        debug_assert_eq!(pair.left.chrom, self.left_chrom);
        debug_assert_eq!(pair.right.chrom, self.right_chrom);

        match self.bounds.as_mut() {
            Some(bounds) => bounds.add_pair(&pair),
            None => self.bounds = Some(ClusterBounds::from_pair(&pair)),
        }
        let index = self.find_insertion_index(&pair);
        self.members.insert(index, pair);
    }

    /// Count member strand orientations and select the majority orientation
    ///
    /// Ties go to the orientation observed first.
    ///
    pub fn tally_strand_orientations(&mut self) {
        let mut counts: Vec<(StrandOrientation, usize)> = Vec::new();
        for pair in self.members.iter() {
            let orientation = pair.strand_orientation();
            match counts.iter_mut().find(|(x, _)| *x == orientation) {
                Some((_, count)) => *count += 1,
                None => counts.push((orientation, 1)),
            }
        }

        let mut majority: Option<(StrandOrientation, usize)> = None;
        for &(orientation, count) in counts.iter() {
            if majority.is_none_or(|(_, max_count)| count > max_count) {
                majority = Some((orientation, count));
            }
        }

        self.strand_orientation = majority.map(|(x, _)| x);
        self.strand_orientation_counts = counts;
    }

    pub fn strand_orientation(&self) -> Option<StrandOrientation> {
        self.strand_orientation
    }

    pub fn strand_orientation_count(&self, orientation: StrandOrientation) -> usize {
        self.strand_orientation_counts
            .iter()
            .find(|(x, _)| *x == orientation)
            .map_or(0, |(_, count)| *count)
    }

    /// True for same-chromosome clusters where the left envelope reaches into the right envelope
    ///
    pub fn has_overlapping_envelopes(&self) -> bool {
        match &self.bounds {
            Some(b) => self.left_chrom == self.right_chrom && b.left_end >= b.right_start,
            None => false,
        }
    }

    /// Find and store the breakpoint rule for this cluster
    ///
    pub fn resolve_breakpoint_rule(&mut self) -> Result<BreakpointRule, PairClusterError> {
        let rule = resolve_breakpoint_rule(
            self.signature,
            &self.left_chrom,
            &self.right_chrom,
            self.orientation_category,
            self.has_overlapping_envelopes(),
        )?;
        self.breakpoint_rule = Some(rule);
        Ok(rule)
    }

    pub fn breakpoint_rule(&self) -> Option<BreakpointRule> {
        self.breakpoint_rule
    }

    /// Get (left, right) breakpoints, available once the cluster has members and a resolved rule
    ///
    pub fn breakpoints(&self) -> Option<(i64, i64)> {
        let bounds = self.bounds.as_ref()?;
        Some(self.breakpoint_rule?.breakpoints(bounds))
    }

    /// Left envelope formatted as "chrom:start-end"
    ///
    pub fn region_from(&self) -> Option<String> {
        let b = self.bounds.as_ref()?;
        Some(format!("{}:{}-{}", self.left_chrom, b.left_start, b.left_end))
    }

    /// Right envelope formatted as "chrom:start-end"
    ///
    pub fn region_to(&self) -> Option<String> {
        let b = self.bounds.as_ref()?;
        Some(format!("{}:{}-{}", self.right_chrom, b.right_start, b.right_end))
    }

    /// Cluster envelope padded by `window` on both sides of both regions
    ///
    pub fn expanded_compare_window(&self, window: i64) -> Option<CompareWindow> {
        let b = self.bounds.as_ref()?;
        Some(CompareWindow {
            left: b.left_range().expand_by(window),
            right: b.right_range().expand_by(window),
        })
    }

    pub fn set_classification(&mut self, classification: Classification, id: usize) {
        self.classification = classification;
        self.id = id;
    }

    /// Report label, such as "somatic_AAC_3"
    ///
    pub fn label(&self) -> String {
        format!("{}_{}_{}", self.classification, self.signature, self.id)
    }

    /// Member pairs in tab-delimited form, one per line
    ///
    pub fn to_cluster_string(&self) -> String {
        let mut s = String::new();
        for pair in self.members.iter() {
            s.push_str(&pair.to_cluster_line());
            s.push('\n');
        }
        s
    }

    pub fn to_verbose_string(&self) -> String {
        let mut s = String::new();
        let region = |x: Option<String>| x.unwrap_or_default();
        writeln!(
            s,
            ">>{} | {}",
            region(self.region_from()),
            region(self.region_to())
        )
        .unwrap();
        writeln!(
            s,
            "id: {}\tsignature: {}\tsv_type: {}\tcategory: {}",
            self.label(),
            self.signature,
            self.signature.sv_type_label(),
            self.orientation_category
        )
        .unwrap();
        if let (Some(b), Some(rule), Some((left_bp, right_bp))) =
            (self.bounds.as_ref(), self.breakpoint_rule, self.breakpoints())
        {
            writeln!(
                s,
                "breakpoints: {left_bp} {right_bp}\trule: {rule}\tleft_size: {}\tright_size: {}",
                b.left_range().size(),
                b.right_range().size()
            )
            .unwrap();
        }
        if let Some(orientation) = self.strand_orientation {
            writeln!(
                s,
                "strand_orientation: {orientation} ({} of {})",
                self.strand_orientation_count(orientation),
                self.members.len()
            )
            .unwrap();
        }
        writeln!(
            s,
            "low_confidence_support: {}",
            self.low_confidence_support_count
        )
        .unwrap();

        writeln!(s, "find_pairs: {}", self.members.len()).unwrap();
        for pair in self.members.iter() {
            writeln!(s, "{}", pair.to_verbose_line()).unwrap();
        }
        writeln!(s, "compare_pairs: {}", self.matched_compare_pairs.len()).unwrap();
        for pair in self.matched_compare_pairs.iter() {
            writeln!(s, "{}", pair.to_verbose_line()).unwrap();
        }
        s
    }
}

/// Report ordering: left chromosome in natural order, then left start, then right end
///
pub fn cmp_cluster_report_order(a: &DiscordantCluster, b: &DiscordantCluster) -> Ordering {
    let key = |x: &DiscordantCluster| {
        x.bounds
            .as_ref()
            .map(|b| (b.left_start, b.right_end))
            .unwrap_or_default()
    };
    compare_chrom_names(&a.left_chrom, &b.left_chrom).then_with(|| key(a).cmp(&key(b)))
}
