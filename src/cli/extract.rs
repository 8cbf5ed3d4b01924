use camino::{Utf8Path, Utf8PathBuf};
use clap::Args;
use const_format::concatcp;
use serde::{Deserialize, Serialize};
use simple_error::{SimpleResult, bail};
use unwrap::unwrap;

use super::utils::{canonicalize_string_path, check_optional_filename, check_required_filename};
use crate::chrom_names::{DEFAULT_PRIMARY_CHROM_REGEX, PrimaryChromFilter};
use crate::extract::SETTINGS_FILENAME;

#[derive(Args, Default, Deserialize, Serialize)]
pub struct ExtractSettings {
    /// Directory for all extract command output (must not already exist)
    #[arg(long, value_name = "DIR", default_value = concatcp!(env!("CARGO_PKG_NAME"), "_extract_output"))]
    pub output_dir: Utf8PathBuf,

    /// Coordinate-sorted alignment file for the tumor sample in BAM format
    #[arg(long = "bam-tumor", value_name = "FILE")]
    pub tumor_bam_filename: String,

    /// Coordinate-sorted alignment file for the matched control sample in BAM format
    #[arg(long = "bam-control", value_name = "FILE")]
    pub control_bam_filename: Option<String>,

    /// Genome block size, discordant pairs are written to a new set of bucket files each time
    /// the input advances to a new block
    #[arg(long, default_value_t = 10_000_000)]
    pub block_size: i64,

    /// Records with MAPQ below this value are not extracted
    #[arg(long, default_value_t = 0)]
    pub min_mapq: u8,

    /// Regex used to select the primary chromosomes from which pairs are extracted
    ///
    /// Pairs with either mate on a mitochondrial chromosome are never extracted.
    ///
    #[arg(long, value_name = "REGEX", default_value = DEFAULT_PRIMARY_CHROM_REGEX)]
    pub primary_chrom_regex: String,

    /// Disable canonicalization of the input alignment file paths
    #[arg(hide = true, long)]
    pub disable_path_canonicalization: bool,
}

/// Validate settings and update to parameters that can't be processed automatically by clap.
///
/// Assumes that the logger is not setup
///
pub fn validate_and_fix_extract_settings(
    mut settings: ExtractSettings,
) -> SimpleResult<ExtractSettings> {
    check_required_filename(&settings.tumor_bam_filename, "tumor alignment")?;
    check_optional_filename(
        settings.control_bam_filename.as_ref(),
        "control alignment",
    )?;

    if settings.block_size <= 0 {
        bail!("--block-size argument must be greater than 0");
    }

    if let Err(e) = PrimaryChromFilter::new(&settings.primary_chrom_regex) {
        bail!(
            "Invalid --primary-chrom-regex '{}': {e}",
            settings.primary_chrom_regex
        );
    }

    if !settings.disable_path_canonicalization {
        settings.tumor_bam_filename = canonicalize_string_path(&settings.tumor_bam_filename)?;
        settings.control_bam_filename = settings
            .control_bam_filename
            .map(|x| canonicalize_string_path(&x))
            .transpose()?;
    }

    Ok(settings)
}

/// Write extract settings out in json format
pub fn write_extract_settings(output_dir: &Utf8Path, settings: &ExtractSettings) {
    use log::info;

    let filename = output_dir.join(SETTINGS_FILENAME);

    info!("Writing extract settings to file: '{filename}'");

    let f = unwrap!(
        std::fs::File::create(&filename),
        "Unable to create extract settings json file: '{filename}'"
    );

    serde_json::to_writer_pretty(&f, &settings).unwrap();
}
