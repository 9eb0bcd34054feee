use std::process::ExitCode;

use clap::Parser;
use deepextract_lib::cli::{self, Cli};
use deepextract_lib::config;

fn main() -> ExitCode {
    deepextract_lib::init_tracing();
    let cli = Cli::parse();
    tracing::debug!("{} v{}", config::APP_NAME, config::APP_VERSION);

    let stdout = std::io::stdout();
    match cli::run(cli, &mut stdout.lock()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
