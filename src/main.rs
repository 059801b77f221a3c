// src/main.rs
mod cli;
mod config;
mod error;
mod migrate;
mod models;
mod projection;
mod storage;
mod store;

use clap::Parser;

fn main() -> Result<(), error::AppError> {
    env_logger::init();
    log::info!("Starting accounts-rs");

    let cli_args = cli::Cli::parse();
    let config = config::load_config();

    if let Err(e) = cli::handle_cli_command(cli_args, &config) {
        // Context is logged where the error is raised; this only marks termination.
        log::error!("Application failed: {:#?}", e);
        eprintln!("Error: {}", e);
        return Err(e);
    }

    log::info!("accounts-rs finished successfully.");
    Ok(())
}
