use clap::Parser;

use log::{error, info};
use std::process::ExitCode;

use food_splitter::{prepare_splits, Args};

fn main() -> ExitCode {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = match args.to_split_config() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    info!(
        "Splitting {} into {} (train {}, validation {}, test {}, seed {})",
        args.source.display(),
        args.destination.display(),
        config.ratios.train,
        config.ratios.validation,
        config.ratios.test,
        config.seed
    );

    match prepare_splits(&args.source, &args.destination, &config) {
        Ok(summary) => {
            summary.print_summary();
            info!("Dataset split completed successfully.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed to split dataset: {}", e);
            ExitCode::FAILURE
        }
    }
}
