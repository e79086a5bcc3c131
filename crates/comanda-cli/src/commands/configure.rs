//! `comanda configure` — inspect and edit the local config store.

use anyhow::{Context, Result};
use comanda_core::Config;
use console::style;
use dialoguer::{Confirm, Input, Password};

pub async fn run(
    list: bool,
    server: bool,
    encrypt: bool,
    remove: Option<&str>,
    update_key: Option<&str>,
) -> Result<()> {
    let path = Config::default_path();
    let mut config = Config::load(&path, None).context("loading config store")?;

    if list {
        print_summary(&config);
        return Ok(());
    }

    if server {
        edit_server_settings(&mut config)?;
        config.save(&path).context("saving config store")?;
        println!("{}", style("server settings updated").green());
        return Ok(());
    }

    if let Some(model) = remove {
        let mut removed = false;
        for entry in config.providers.values_mut() {
            let before = entry.models.len();
            entry.models.retain(|m| m.name != model);
            removed |= entry.models.len() != before;
        }
        if !removed {
            anyhow::bail!("model '{model}' not found in any provider");
        }
        config.save(&path).context("saving config store")?;
        println!("{}", style(format!("removed model '{model}'")).green());
        return Ok(());
    }

    if let Some(provider) = update_key {
        let key = Password::new()
            .with_prompt(format!("new API key for {provider}"))
            .interact()
            .context("reading API key")?;
        config.providers.entry(provider.to_string()).or_default().api_key = key;
        config.save(&path).context("saving config store")?;
        println!("{}", style(format!("updated key for '{provider}'")).green());
        return Ok(());
    }

    if encrypt {
        let password = Password::new()
            .with_prompt("encryption password")
            .with_confirmation("confirm password", "passwords did not match")
            .interact()
            .context("reading password")?;
        config.save_encrypted(&path, &password).context("encrypting config store")?;
        println!("{}", style("config store encrypted").green());
        return Ok(());
    }

    print_summary(&config);
    Ok(())
}

fn print_summary(config: &Config) {
    println!("providers:");
    for (name, entry) in &config.providers {
        println!("  {name}: {} model(s), key {}", entry.models.len(), if entry.api_key.is_empty() { "unset" } else { "set" });
        for model in &entry.models {
            println!("    - {} ({:?})", model.name, model.kind);
        }
    }
    println!("server:");
    println!("  port: {}", config.server.port);
    println!("  data_dir: {}", config.server.data_dir);
    println!("  enabled: {}", config.server.enabled);
    println!("  cors: {}", config.server.cors);
    println!("databases: {}", config.databases.len());
}

fn edit_server_settings(config: &mut Config) -> Result<()> {
    config.server.port = Input::new()
        .with_prompt("port")
        .default(config.server.port)
        .interact_text()
        .context("reading port")?;

    config.server.data_dir = Input::new()
        .with_prompt("data dir")
        .default(config.server.data_dir.clone())
        .interact_text()
        .context("reading data dir")?;

    config.server.enabled = Confirm::new()
        .with_prompt("enable bearer auth")
        .default(config.server.enabled)
        .interact()
        .context("reading enabled flag")?;

    if config.server.enabled {
        config.server.bearer_token = Password::new()
            .with_prompt("bearer token")
            .interact()
            .context("reading bearer token")?;
    }

    config.server.cors = Confirm::new()
        .with_prompt("enable CORS")
        .default(config.server.cors)
        .interact()
        .context("reading CORS flag")?;

    Ok(())
}
