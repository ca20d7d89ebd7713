//! `basket` - share a shopping basket from the terminal.

/// CLI module - argument parsing and command handlers
mod cli;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    cli::run_cli();
}
