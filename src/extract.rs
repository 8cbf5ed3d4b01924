use camino::Utf8Path;
use log::info;
use unwrap::unwrap;

use crate::bucket_store::BucketStore;
use crate::chrom_names::PrimaryChromFilter;
use crate::cli;
use crate::errors::PairClusterError;
use crate::os_utils::create_dir_all;
use crate::pair_extractor::{ExtractorSettings, SampleAlignments, extract_samples};
use crate::run_stats::{ExtractRunStats, write_extract_run_stats};

pub const BUCKET_DIRNAME: &str = "buckets";
pub const RUN_STATS_FILENAME: &str = "extract.stats.json";
pub const SETTINGS_FILENAME: &str = "extract.settings.json";

pub const TUMOR_SAMPLE_LABEL: &str = "TD";
pub const CONTROL_SAMPLE_LABEL: &str = "ND";

/// Create the bucket store under `output_dir`
///
/// A clobbered output directory may still hold buckets from a previous extraction, these are
/// removed first.
///
fn get_empty_bucket_store(output_dir: &Utf8Path) -> Result<BucketStore, PairClusterError> {
    let store = BucketStore::new(&output_dir.join(BUCKET_DIRNAME));
    store.clear()?;
    create_dir_all(store.root(), "bucket");
    Ok(store)
}

pub fn run_extract(
    shared_settings: &cli::SharedSettings,
    settings: &cli::ExtractSettings,
) -> Result<(), PairClusterError> {
    cli::write_extract_settings(&settings.output_dir, settings);

    let primary_chrom_filter = unwrap!(
        PrimaryChromFilter::new(&settings.primary_chrom_regex),
        "Invalid primary chromosome regex: '{}'",
        settings.primary_chrom_regex
    );
    let extractor_settings = ExtractorSettings {
        block_size: settings.block_size,
        min_mapq: settings.min_mapq,
        primary_chrom_filter,
    };

    let store = get_empty_bucket_store(&settings.output_dir)?;

    let mut samples = vec![SampleAlignments {
        label: TUMOR_SAMPLE_LABEL.to_string(),
        bam_filename: settings.tumor_bam_filename.clone(),
    }];
    if let Some(control_bam_filename) = &settings.control_bam_filename {
        samples.push(SampleAlignments {
            label: CONTROL_SAMPLE_LABEL.to_string(),
            bam_filename: control_bam_filename.clone(),
        });
    }

    info!("Extracting discordant pairs from {} samples", samples.len());
    let sample_stats = extract_samples(
        &samples,
        &extractor_settings,
        &store,
        shared_settings.thread_count,
    )?;

    let run_stats = ExtractRunStats {
        samples: sample_stats,
    };
    write_extract_run_stats(&settings.output_dir.join(RUN_STATS_FILENAME), &run_stats);

    info!("Wrote discordant pair buckets to '{}'", store.root());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket_store::BlockKey;
    use crate::bucket_store::test_utils::get_utf8_temp_dir;
    use crate::mate_pair::test_utils::*;
    use crate::pair_signature::PairSignature;

    #[test]
    fn test_stale_buckets_are_removed() {
        let dir = tempfile::tempdir().unwrap();
        let output_dir = get_utf8_temp_dir(&dir);

        let store = get_empty_bucket_store(&output_dir).unwrap();
        let block = BlockKey {
            chrom_pair: "chr7".to_string(),
            index: 3,
        };
        store
            .write(
                PairSignature::Aac,
                TUMOR_SAMPLE_LABEL,
                &block,
                &get_test_pairs(&AAC_TEST_LINES),
            )
            .unwrap();

        let store = get_empty_bucket_store(&output_dir).unwrap();
        assert!(store.root().is_dir());
        assert!(
            store
                .chrom_pairs(PairSignature::Aac, TUMOR_SAMPLE_LABEL)
                .unwrap()
                .is_empty()
        );
        assert!(
            store
                .read_chrom_pair(PairSignature::Aac, TUMOR_SAMPLE_LABEL, "chr7")
                .unwrap()
                .next()
                .is_none()
        );
    }
}
