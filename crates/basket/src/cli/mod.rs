//! Command-line interface for basket.

mod args;
mod config;
mod prompt;
mod start;

use basket_core::BasketConfig;
use clap::Parser;

use args::{Cli, Commands};

/// Parse arguments and run the selected command.
pub fn run_cli() {
    let cli = Cli::parse();

    let config = match BasketConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            return;
        }
    };

    match cli.command {
        Commands::Start { server, basket } => {
            start::handle_start(&config, server, basket);
        }
        Commands::Config {
            server,
            basket,
            reconnect_delay_ms,
            ack_timeout_ms,
            show,
        } => {
            let changes = config::ConfigChanges {
                server,
                basket,
                reconnect_delay_ms,
                ack_timeout_ms,
            };
            config::handle_config(&config, changes, show);
        }
    }
}
