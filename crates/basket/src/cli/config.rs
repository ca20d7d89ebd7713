//! `basket config` - show and update saved settings.

use basket_core::BasketConfig;

/// Values passed on the command line; `None` leaves the setting alone.
#[derive(Debug, Default)]
pub struct ConfigChanges {
    pub server: Option<String>,
    pub basket: Option<String>,
    pub reconnect_delay_ms: Option<u64>,
    pub ack_timeout_ms: Option<u64>,
}

impl ConfigChanges {
    fn is_empty(&self) -> bool {
        self.server.is_none()
            && self.basket.is_none()
            && self.reconnect_delay_ms.is_none()
            && self.ack_timeout_ms.is_none()
    }

    /// Apply to `config`, returning a description of each change.
    fn apply(self, config: &mut BasketConfig) -> Vec<String> {
        let mut changes = Vec::new();
        if let Some(server) = self.server {
            changes.push(format!("Server URL: {}", server));
            config.server_url = server;
        }
        if let Some(basket) = self.basket {
            changes.push(format!("Basket ID: {}", basket));
            config.basket_id = Some(basket);
        }
        if let Some(ms) = self.reconnect_delay_ms {
            changes.push(format!("Reconnect delay: {} ms", ms));
            config.reconnect_delay_ms = ms;
        }
        if let Some(ms) = self.ack_timeout_ms {
            changes.push(format!("Ack timeout: {} ms", ms));
            config.ack_timeout_ms = ms;
        }
        changes
    }
}

/// Handle the config command.
pub fn handle_config(config: &BasketConfig, changes: ConfigChanges, show: bool) {
    if show || changes.is_empty() {
        print_config(config);
        return;
    }

    let mut new_config = config.clone();
    let changes = changes.apply(&mut new_config);

    match new_config.save() {
        Ok(path) => {
            println!("Configuration updated ({}):", path.display());
            for change in changes {
                println!("  {}", change);
            }
        }
        Err(e) => {
            eprintln!("Failed to save configuration: {}", e);
        }
    }
}

fn print_config(config: &BasketConfig) {
    println!("Basket Configuration");
    println!("====================");
    println!();
    if let Some(path) = BasketConfig::config_path() {
        println!("File: {}", path.display());
    }
    println!("Server URL: {}", config.server_url);
    println!(
        "Basket ID: {}",
        config.basket_id.as_deref().unwrap_or("(not set)")
    );
    println!("Reconnect delay: {} ms", config.reconnect_delay_ms);
    println!("Ack timeout: {} ms", config.ack_timeout_ms);
}
