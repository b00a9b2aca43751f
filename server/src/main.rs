use std::env;
use std::process::ExitCode;

use dreamcation_server::config::Config;

#[tokio::main]
async fn main() -> ExitCode {
    let log_dir = env::var("ITINERARY_LOG_DIR").unwrap_or_else(|_| "logs".to_string());
    if let Err(e) = rolling_logger::init_logger(&log_dir, "itinerary-server") {
        eprintln!("Failed to initialize logger in {}: {}", log_dir, e);
    }

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Refusing to start: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match dreamcation_server::start_server(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
