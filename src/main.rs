use env_logger::Env;
use sheetboard::app;
use sheetboard::config::Config;

/// Main entry point for the web application
///
/// Initializes logging, reads the configuration from the environment, and
/// runs the HTTP server until it is stopped.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let config = Config::from_env();
    app::run(config).await
}
