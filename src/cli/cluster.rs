use camino::{Utf8Path, Utf8PathBuf};
use clap::Args;
use const_format::concatcp;
use serde::{Deserialize, Serialize};
use simple_error::{SimpleResult, bail};
use unwrap::unwrap;

use super::utils::check_required_dirname;
use crate::cluster::SETTINGS_FILENAME;
use crate::pair_signature::PairingType;

#[derive(Args, Default, Deserialize, Serialize)]
pub struct ClusterSettings {
    /// Directory for all cluster command output (must not already exist)
    #[arg(long, value_name = "DIR", default_value = concatcp!(env!("CARGO_PKG_NAME"), "_cluster_output"))]
    pub output_dir: Utf8PathBuf,

    /// Bucket directory written by the extract command
    #[arg(long, value_name = "DIR")]
    pub bucket_dir: Utf8PathBuf,

    /// Upper bound of the tumor library insert size distribution
    #[arg(long, value_name = "SIZE")]
    pub tumor_upper_isize: i64,

    /// Upper bound of the control library insert size distribution
    #[arg(long, value_name = "SIZE")]
    pub control_upper_isize: i64,

    /// Library type, used to map each pair's mate order to an orientation category
    #[arg(long, value_enum, default_value_t = PairingType::Pe)]
    pub pairing_type: PairingType,

    /// Minimum number of pairs in a reported cluster
    #[arg(long, default_value_t = 2)]
    pub min_cluster_size: usize,

    /// Minimum number of supporting pairs in the compared sample for a cluster to be classified
    /// as germline
    #[arg(long, default_value_t = 1)]
    pub compare_cluster_size: usize,

    /// Maximum distance between a pair and a cluster envelope for the pair to join the cluster.
    /// Defaults to the upper insert size of the sample being clustered.
    #[arg(long, value_name = "SIZE")]
    pub proximity_tolerance: Option<i64>,

    /// Pairs with either mate aligned over fewer reference bases are not counted as support
    #[arg(long, default_value_t = 36)]
    pub min_aligned_length: i64,

    /// Count duplicate-marked pairs as support
    #[arg(long)]
    pub keep_duplicates: bool,

    /// Also cluster the control sample, reporting control clusters without tumor support as
    /// normal germline
    #[arg(long)]
    pub rescue_control_germline: bool,
}

/// Validate settings and update to parameters that can't be processed automatically by clap.
///
/// Assumes that the logger is not setup
///
pub fn validate_and_fix_cluster_settings(
    settings: ClusterSettings,
) -> SimpleResult<ClusterSettings> {
    check_required_dirname(&settings.bucket_dir, "bucket")?;

    if settings.tumor_upper_isize <= 0 {
        bail!("--tumor-upper-isize argument must be greater than 0");
    }
    if settings.control_upper_isize <= 0 {
        bail!("--control-upper-isize argument must be greater than 0");
    }
    if settings.min_cluster_size == 0 {
        bail!("--min-cluster-size argument must be greater than 0");
    }
    if settings.compare_cluster_size == 0 {
        bail!("--compare-cluster-size argument must be greater than 0");
    }
    if let Some(tolerance) = settings.proximity_tolerance {
        if tolerance < 0 {
            bail!("--proximity-tolerance argument must not be negative");
        }
    }

    Ok(settings)
}

/// Write cluster settings out in json format
pub fn write_cluster_settings(output_dir: &Utf8Path, settings: &ClusterSettings) {
    use log::info;

    let filename = output_dir.join(SETTINGS_FILENAME);

    info!("Writing cluster settings to file: '{filename}'");

    let f = unwrap!(
        std::fs::File::create(&filename),
        "Unable to create cluster settings json file: '{filename}'"
    );

    serde_json::to_writer_pretty(&f, &settings).unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_test_settings(dir: &tempfile::TempDir) -> ClusterSettings {
        ClusterSettings {
            bucket_dir: Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap(),
            tumor_upper_isize: 3000,
            control_upper_isize: 3000,
            min_cluster_size: 2,
            compare_cluster_size: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_cluster_settings() {
        let dir = tempfile::tempdir().unwrap();
        assert!(validate_and_fix_cluster_settings(get_test_settings(&dir)).is_ok());

        let mut settings = get_test_settings(&dir);
        settings.bucket_dir = settings.bucket_dir.join("missing");
        assert!(validate_and_fix_cluster_settings(settings).is_err());

        let mut settings = get_test_settings(&dir);
        settings.control_upper_isize = 0;
        assert!(validate_and_fix_cluster_settings(settings).is_err());

        let mut settings = get_test_settings(&dir);
        settings.proximity_tolerance = Some(-1);
        assert!(validate_and_fix_cluster_settings(settings).is_err());
    }
}
