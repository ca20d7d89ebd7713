use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "basket")]
#[command(about = "Share a shopping basket with everyone on the same basket id", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Join a basket and edit it interactively
    ///
    /// Reads commands from stdin (`add`, `buy`, `unbuy`, `suggest`, `list`,
    /// `offline`, `online`, `status`, `quit`). Changes made while the server is
    /// unreachable are sent once the connection comes back.
    Start {
        /// Server URL (overrides the config file)
        #[arg(short, long, env = "BASKET_SERVER")]
        server: Option<String>,

        /// Basket id to join (overrides the config file)
        #[arg(short, long, env = "BASKET_ID")]
        basket: Option<String>,
    },

    /// Show or change the saved configuration
    Config {
        /// Server URL to save
        #[arg(long)]
        server: Option<String>,

        /// Basket id to save
        #[arg(long)]
        basket: Option<String>,

        /// Delay between reconnect attempts, in milliseconds
        #[arg(long)]
        reconnect_delay_ms: Option<u64>,

        /// Acknowledgement timeout, in milliseconds
        #[arg(long)]
        ack_timeout_ms: Option<u64>,

        /// Show the current configuration
        #[arg(long)]
        show: bool,
    },
}
