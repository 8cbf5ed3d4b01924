//! Read quality eligibility filters applied to mate pairs during clustering
//!

use log::debug;
use simple_error::{SimpleResult, bail};

use crate::alignment_record::{is_duplicate_flag, is_qc_fail_flag};
use crate::errors::PairClusterError;
use crate::mate_pair::{MateEndpoint, MatePair};

/// Decide whether a pair is good enough to count as cluster evidence
///
/// Implementations are shared between signature workers, and may fail on unexpected input.
///
pub trait PairFilter: Send + Sync {
    fn check(&self, pair: &MatePair) -> SimpleResult<bool>;
}

impl<F> PairFilter for F
where
    F: Fn(&MatePair) -> SimpleResult<bool> + Send + Sync,
{
    fn check(&self, pair: &MatePair) -> SimpleResult<bool> {
        self(pair)
    }
}

/// Run the filter on one pair, treating a filter failure as an ineligible pair
///
pub fn is_eligible_pair(filter: &dyn PairFilter, pair: &MatePair) -> bool {
    match filter.check(pair) {
        Ok(x) => x,
        Err(e) => {
            let err = PairClusterError::EligibilityPredicate {
                read_name: pair.read_name.clone(),
                message: e.to_string(),
            };
            debug!("{err}");
            false
        }
    }
}

/// Default read quality filter
///
/// Both mates must have an aligned span of at least `min_aligned_length`, and optionally neither
/// mate may be flagged as a duplicate or QC failure.
///
pub struct ReadQualityFilter {
    pub min_aligned_length: i64,
    pub exclude_duplicates: bool,
}

impl Default for ReadQualityFilter {
    fn default() -> Self {
        Self {
            min_aligned_length: 36,
            exclude_duplicates: true,
        }
    }
}

impl ReadQualityFilter {
    fn check_endpoint(&self, endpoint: &MateEndpoint) -> SimpleResult<bool> {
        if endpoint.end < endpoint.start {
            bail!(
                "Invalid alignment range {}-{} for mate of read '{}'",
                endpoint.start,
                endpoint.end,
                endpoint.read_name
            );
        }
        if endpoint.range().size() < self.min_aligned_length {
            return Ok(false);
        }
        if self.exclude_duplicates && is_duplicate_flag(endpoint.flags) {
            return Ok(false);
        }
        Ok(!is_qc_fail_flag(endpoint.flags))
    }
}

impl PairFilter for ReadQualityFilter {
    fn check(&self, pair: &MatePair) -> SimpleResult<bool> {
        Ok(self.check_endpoint(&pair.left)? && self.check_endpoint(&pair.right)?)
    }
}
