use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use gantry_config::Config;

/// Hardware-control daemon for the gantry test stand.
#[derive(Debug, Parser)]
#[command(name = "gantryd", version, about)]
struct Cli {
    /// Path to the JSON configuration file.
    config: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("gantryd: {error}");
            return ExitCode::FAILURE;
        }
    };

    let listener = match gantryd::bootstrap(&config) {
        Ok(listener) => listener,
        Err(error) => {
            eprintln!("gantryd: {error}");
            return ExitCode::FAILURE;
        }
    };

    match listener.join() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("gantryd: {error}");
            ExitCode::FAILURE
        }
    }
}
