mod alignment_record;
mod breakpoint_rule;
mod bucket_store;
mod chrom_names;
mod cli;
mod cluster;
mod cluster_classifier;
mod cluster_output;
mod discordant_cluster;
mod errors;
mod extract;
mod globals;
mod int_range;
mod log_utils;
mod logger;
mod mate_pair;
mod orchestrator;
mod os_utils;
mod pair_extractor;
mod pair_filter;
mod pair_signature;
mod run_stats;

use std::{error, process};

use hhmmss::Hhmmss;
use log::info;

use crate::cli::Commands;
use crate::cluster::run_cluster;
use crate::extract::run_extract;
use crate::globals::{PROGRAM_NAME, PROGRAM_VERSION};
use crate::logger::setup_output_dir_and_logger;

/// Run system configuration steps prior to starting any other program logic
///
fn system_configuration_prelude() {
    os_utils::attempt_max_open_file_limit();
}

fn run(settings: &cli::Settings) -> Result<(), Box<dyn error::Error>> {
    info!("Starting {PROGRAM_NAME} {PROGRAM_VERSION}");
    info!(
        "cmdline: {}",
        std::env::args().collect::<Vec<_>>().join(" ")
    );
    info!("Running on {} threads", settings.shared.thread_count);

    let start = std::time::Instant::now();

    match &settings.command {
        Commands::Extract(x) => {
            run_extract(&settings.shared, x)?;
        }
        Commands::Cluster(x) => {
            run_cluster(&settings.shared, x)?;
        }
    }

    info!(
        "{PROGRAM_NAME} completed. Total Runtime: {}",
        start.elapsed().hhmmssxxx()
    );
    Ok(())
}

fn main() {
    system_configuration_prelude();

    let settings = cli::validate_and_fix_settings(cli::parse_settings());

    // Setup logger, including creation of the output directory for the log file:
    setup_output_dir_and_logger(
        settings.get_output_dir(),
        settings.shared.clobber,
        settings.shared.debug,
    );

    if let Err(err) = run(&settings) {
        log::error!("{err}");
        process::exit(2);
    }
}
