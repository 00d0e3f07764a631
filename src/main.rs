use std::{process, str::FromStr};

use decl_schema::cli::CommandLineInterface;
use log::{LevelFilter, error, info};

fn main() {
    let command_line_interface = CommandLineInterface::load();

    let log_level = LevelFilter::from_str(&command_line_interface.log_level).unwrap_or_else(|_| {
        eprintln!(
            "Invalid log level: {}. Using 'warn' instead.",
            command_line_interface.log_level
        );
        LevelFilter::Warn
    });

    env_logger::Builder::from_env(env_logger::Env::default())
        .filter_level(log_level)
        .init();

    info!(log_level:?; "Starting");

    match command_line_interface.run() {
        Ok(true) => info!("Completed successfully"),
        Ok(false) => process::exit(1),
        Err(err) => {
            error!(err:%; "Run failed");
            eprintln!("error: {err:#}");
            process::exit(1);
        }
    }
}
