//! `basket start` - join a basket and edit it from stdin.

use std::sync::Arc;

use basket_core::sync::{
    BasketHandle, BasketSession, ConnectionStatus, StatusObserver, SyncClient, SyncClientConfig,
    TokioConnector, TransportError,
};
use basket_core::{BasketConfig, BasketItem, BasketObserver, ItemStatus};
use tokio::io::{AsyncBufReadExt, BufReader};

use super::prompt::{HELP, PromptCommand, parse_line};

const DEFAULT_BASKET: &str = "default";

/// Prints basket transitions as they happen.
struct PrintingObserver;

impl BasketObserver for PrintingObserver {
    fn item_created(&self, item: &BasketItem) {
        println!("+ {}", item.name);
    }

    fn moved_to_buy(&self, item: &BasketItem) {
        println!("{}", format_item(item));
    }

    fn moved_to_bought(&self, item: &BasketItem) {
        println!("{}", format_item(item));
    }
}

/// Prints connection status changes.
struct PrintingStatus;

impl StatusObserver for PrintingStatus {
    fn status_changed(&self, status: ConnectionStatus) {
        println!("({})", status);
    }
}

fn format_item(item: &BasketItem) -> String {
    let mark = match item.status {
        ItemStatus::ToBuy => ' ',
        ItemStatus::Bought => 'x',
    };
    format!("[{}] {}", mark, item.name)
}

/// Handle the start command.
pub fn handle_start(config: &BasketConfig, server: Option<String>, basket: Option<String>) {
    let server_url = server.unwrap_or_else(|| config.server_url.clone());
    let basket_id = basket
        .or_else(|| config.basket_id.clone())
        .unwrap_or_else(|| DEFAULT_BASKET.to_string());

    let session = BasketSession::new(
        config.session_config(),
        Arc::new(PrintingObserver),
        Arc::new(PrintingStatus),
    );
    let client_config = SyncClientConfig::new(server_url, basket_id.clone());
    let (client, handle) = match SyncClient::new(client_config, session, TokioConnector) {
        Ok(pair) => pair,
        Err(e) => {
            eprintln!("{}", e);
            return;
        }
    };

    println!("Joining basket...");
    println!("  Basket: {}", basket_id);
    println!("  Endpoint: {}", client.ws_url());
    println!("Type 'help' for commands.");
    println!();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to create Tokio runtime: {}", e);
            return;
        }
    };

    runtime.block_on(async {
        let client_task = tokio::spawn(client.run());
        run_prompt(&handle).await;
        let _ = handle.shutdown();
        if let Err(e) = client_task.await {
            log::error!("Sync client task failed: {}", e);
        }
    });

    println!("Sync stopped.");
}

/// Read commands until `quit`, end of input or Ctrl+C.
async fn run_prompt(handle: &BasketHandle) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = tokio::signal::ctrl_c() => {
                println!("\nShutting down sync...");
                return;
            }
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => return,
            Err(e) => {
                eprintln!("Failed to read input: {}", e);
                return;
            }
        };

        let command = match parse_line(&line) {
            Ok(PromptCommand::Quit) => return,
            Ok(command) => command,
            Err(e) => {
                eprintln!("{}", e);
                continue;
            }
        };
        if let Err(e) = run_command(handle, command).await {
            eprintln!("{}", e);
            return;
        }
    }
}

async fn run_command(handle: &BasketHandle, command: PromptCommand) -> Result<(), TransportError> {
    match command {
        PromptCommand::Add(name) => handle.add_item(name)?,
        PromptCommand::Buy(name) => handle.mark_bought(name)?,
        PromptCommand::Unbuy(name) => handle.mark_to_buy(name)?,
        PromptCommand::Suggest(query) => match handle.suggest(query).await? {
            Some(item) => println!("-> {}", item.name),
            None => println!("(no suggestion)"),
        },
        PromptCommand::List => {
            let items = handle.items().await?;
            if items.is_empty() {
                println!("(basket is empty)");
            }
            for item in items {
                println!("{}", format_item(&item));
            }
        }
        PromptCommand::Offline => handle.network_offline()?,
        PromptCommand::Online => handle.network_online()?,
        PromptCommand::Status => println!("Status: {}", handle.status().await?),
        PromptCommand::Help => println!("{}", HELP),
        PromptCommand::Quit | PromptCommand::Nothing => {}
    }
    Ok(())
}
