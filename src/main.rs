use clap::Parser;
use hl_tape::cli::{Cli, Commands};
use hl_tape::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
            eprintln!("Using default configuration");
            toml::from_str(include_str!("../config.toml.example"))?
        }
    };

    // Initialize telemetry
    hl_tape::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Lags(args) => args.execute(&config).await?,
        Commands::Query(args) => args.execute(&config).await?,
        Commands::Replay(args) => args.execute(&config).await?,
        Commands::Overlay(args) => args.execute(&config).await?,
        Commands::Config => {
            let mut shown = config.clone();
            if shown.database.password.is_some() {
                shown.database.password = Some("********".to_string());
            }
            println!("# Current configuration ({})", cli.config);
            print!("{}", toml::to_string_pretty(&shown)?);
        }
    }

    Ok(())
}
