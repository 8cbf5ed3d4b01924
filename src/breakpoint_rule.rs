//! Breakpoint placement rules for discordant pair clusters
//!

use std::cmp::Ordering;

use strum::{Display, FromRepr};

use crate::chrom_names::compare_chrom_names;
use crate::discordant_cluster::ClusterBounds;
use crate::errors::PairClusterError;
use crate::pair_signature::{OrientationCategory, PairSignature};

/// Selects which envelope edge of a cluster is reported as each breakpoint
///
/// | rule | left breakpoint | right breakpoint |
/// |------|-----------------|------------------|
/// | 1    | left end        | right start      |
/// | 2    | left start      | right end        |
/// | 3    | left end        | right end        |
/// | 4    | left start      | right start      |
/// | 5    | left start      | right end        |
///
/// Rule 5 is the duplication-like rule 2 applied to clusters whose left and right envelopes overlap.
///
#[derive(Clone, Copy, Debug, Display, Eq, FromRepr, PartialEq)]
#[repr(u8)]
pub enum BreakpointRule {
    #[strum(to_string = "1")]
    One = 1,
    #[strum(to_string = "2")]
    Two,
    #[strum(to_string = "3")]
    Three,
    #[strum(to_string = "4")]
    Four,
    #[strum(to_string = "5")]
    Five,
}

impl BreakpointRule {
    pub fn code(&self) -> u8 {
        *self as u8
    }

    /// Get the (left, right) breakpoint positions of a cluster envelope
    ///
    pub fn breakpoints(&self, bounds: &ClusterBounds) -> (i64, i64) {
        use BreakpointRule::*;
        let left = match self {
            One | Three => bounds.left_end,
            Two | Four | Five => bounds.left_start,
        };
        let right = match self {
            One | Four => bounds.right_start,
            Two | Three | Five => bounds.right_end,
        };
        (left, right)
    }
}

/// Find the breakpoint rule for a cluster
///
/// Fails when the signature, chromosome context and orientation category do not describe a
/// consistent breakend configuration.
///
pub fn resolve_breakpoint_rule(
    signature: PairSignature,
    left_chrom: &str,
    right_chrom: &str,
    category: OrientationCategory,
    envelopes_overlap: bool,
) -> Result<BreakpointRule, PairClusterError> {
    let unresolved = |detail: String| PairClusterError::UnresolvedBreakpointRule {
        signature,
        left_chrom: left_chrom.to_string(),
        right_chrom: right_chrom.to_string(),
        detail,
    };

    let is_same_chrom = left_chrom == right_chrom;
    if signature.is_cross_chrom() {
        if compare_chrom_names(left_chrom, right_chrom) != Ordering::Less {
            return Err(unresolved(
                "interchromosomal signature requires distinct chromosomes in canonical order"
                    .to_string(),
            ));
        }
    } else if !is_same_chrom {
        return Err(unresolved(
            "intrachromosomal signature requires matching chromosomes".to_string(),
        ));
    }

    if !signature.allowed_categories().contains(&category) {
        return Err(unresolved(format!(
            "orientation category {category} is not observed for this signature"
        )));
    }

    let rule = match category {
        OrientationCategory::One => BreakpointRule::One,
        OrientationCategory::Two => {
            if is_same_chrom && envelopes_overlap {
                BreakpointRule::Five
            } else {
                BreakpointRule::Two
            }
        }
        OrientationCategory::Three => BreakpointRule::Three,
        OrientationCategory::Four => BreakpointRule::Four,
    };
    Ok(rule)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_breakpoints() {
        let bounds = ClusterBounds {
            left_start: 140188227,
            left_end: 140189108,
            right_start: 140191044,
            right_end: 140191629,
        };

        let expected = [
            (1, (140189108, 140191044)),
            (2, (140188227, 140191629)),
            (3, (140189108, 140191629)),
            (4, (140188227, 140191044)),
            (5, (140188227, 140191629)),
        ];
        for (code, breakpoints) in expected {
            let rule = BreakpointRule::from_repr(code).unwrap();
            assert_eq!(rule.code(), code);
            assert_eq!(rule.breakpoints(&bounds), breakpoints);
        }
        assert_eq!(BreakpointRule::from_repr(0), None);
        assert_eq!(BreakpointRule::from_repr(6), None);
    }

    #[test]
    fn test_resolve_same_chrom() {
        use OrientationCategory::*;
        use PairSignature::*;

        let rule = resolve_breakpoint_rule(Aac, "chr7", "chr7", One, false).unwrap();
        assert_eq!(rule, BreakpointRule::One);

        let rule = resolve_breakpoint_rule(Aab, "chr7", "chr7", Two, false).unwrap();
        assert_eq!(rule, BreakpointRule::Two);

        let rule = resolve_breakpoint_rule(Abc, "chr7", "chr7", Two, true).unwrap();
        assert_eq!(rule, BreakpointRule::Five);

        let rule = resolve_breakpoint_rule(Bab, "chr7", "chr7", Three, false).unwrap();
        assert_eq!(rule, BreakpointRule::Three);

        let rule = resolve_breakpoint_rule(Bbc, "chr7", "chr7", Four, true).unwrap();
        assert_eq!(rule, BreakpointRule::Four);
    }

    #[test]
    fn test_resolve_cross_chrom() {
        use OrientationCategory::*;
        use PairSignature::*;

        for (category, expected) in [
            (One, BreakpointRule::One),
            (Two, BreakpointRule::Two),
            (Three, BreakpointRule::Three),
            (Four, BreakpointRule::Four),
        ] {
            let rule = resolve_breakpoint_rule(Cxx, "chr4", "chr15", category, true).unwrap();
            assert_eq!(rule, expected);
        }
    }

    #[test]
    fn test_unresolved() {
        use OrientationCategory::*;
        use PairSignature::*;

        // Category not observed for the signature
        assert!(matches!(
            resolve_breakpoint_rule(Aac, "chr7", "chr7", Two, false),
            Err(PairClusterError::UnresolvedBreakpointRule { .. })
        ));
        assert!(resolve_breakpoint_rule(Baa, "chr7", "chr7", One, false).is_err());

        // Chromosome context
        assert!(resolve_breakpoint_rule(Aac, "chr7", "chr8", One, false).is_err());
        assert!(resolve_breakpoint_rule(Cxx, "chr7", "chr7", One, false).is_err());
        assert!(resolve_breakpoint_rule(Cxx, "chr15", "chr4", One, false).is_err());
    }
}
