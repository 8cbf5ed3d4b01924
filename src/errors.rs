//! Error taxonomy for pair extraction, bucket storage and cluster classification
//!

use camino::Utf8PathBuf;

use crate::pair_signature::PairSignature;

#[derive(Debug, thiserror::Error)]
pub enum PairClusterError {
    /// A serialized pair line could not be parsed. Readers skip these lines and count them.
    #[error("Malformed mate pair line ({reason}): '{line}'")]
    MalformedPairLine { line: String, reason: String },

    #[error("Can't pair alignment records with different read names: '{left}' and '{right}'")]
    MateMismatch { left: String, right: String },

    /// The breakpoint rule table has no entry for this cluster. The cluster is dropped.
    #[error(
        "No breakpoint rule for signature {signature} on chromosomes '{left_chrom}'/'{right_chrom}': {detail}"
    )]
    UnresolvedBreakpointRule {
        signature: PairSignature,
        left_chrom: String,
        right_chrom: String,
        detail: String,
    },

    /// Fatal for the signature which triggered it, but not for the whole run
    #[error("Bucket I/O error at '{path}': {source}")]
    BucketIo {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Eligibility filter failed on read '{read_name}': {message}")]
    EligibilityPredicate { read_name: String, message: String },

    #[error("Alignment input error: {0}")]
    AlignmentInput(String),

    #[error("Unable to start worker pool: {0}")]
    WorkerPool(String),
}

impl PairClusterError {
    pub fn bucket_io(path: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        Self::BucketIo {
            path: path.into(),
            source,
        }
    }

    pub fn malformed(line: &str, reason: impl Into<String>) -> Self {
        Self::MalformedPairLine {
            line: line.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = PairClusterError::malformed("a,b,c", "expected 15 fields");
        assert_eq!(
            err.to_string(),
            "Malformed mate pair line (expected 15 fields): 'a,b,c'"
        );

        let err = PairClusterError::UnresolvedBreakpointRule {
            signature: PairSignature::Aac,
            left_chrom: "chr1".to_string(),
            right_chrom: "chr2".to_string(),
            detail: "chromosomes must match".to_string(),
        };
        assert!(err.to_string().starts_with("No breakpoint rule for signature AAC"));
    }
}
