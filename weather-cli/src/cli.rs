use std::{fmt::Display, sync::Arc};

use anyhow::{Context, bail};
use chrono::{Local, TimeZone};
use clap::{Parser, Subcommand};
use inquire::{Confirm, Password, PasswordDisplayMode};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;
use weather_core::{
    Config, DisplayUpdate, ProviderId, RefreshConfig, RefreshOrchestrator, SubmitOutcome,
    WeatherSource,
    provider::{default_provider_from_config, provider_from_config},
};

use crate::render;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather", version, about = "Weather CLI")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure credentials for a specific provider.
    Configure {
        /// Provider short name, e.g. "openweather" or "weatherapi".
        provider: ProviderId,
    },

    /// Show current weather and the daily forecast for a location.
    Show {
        /// Address or location name.
        location: String,

        /// Provider to use instead of the configured default.
        #[arg(long)]
        provider: Option<ProviderId>,

        /// Number of forecast days (overrides config).
        #[arg(long)]
        days: Option<usize>,
    },

    /// Interactive mode: type locations, keep recent ones refreshed.
    Watch {
        /// Provider to use instead of the configured default.
        #[arg(long)]
        provider: Option<ProviderId>,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure { provider } => configure(provider),
            Command::Show { location, provider, days } => {
                let mut cfg = Config::load()?;
                if let Some(days) = days {
                    cfg.refresh.forecast_days = days;
                }
                let source = resolve_source(&cfg, provider)?;
                match cfg.refresh.time_zone()? {
                    Some(tz) => show(source, &cfg.refresh, tz, &location).await,
                    None => show(source, &cfg.refresh, Local, &location).await,
                }
            }
            Command::Watch { provider } => {
                let cfg = Config::load()?;
                let source = resolve_source(&cfg, provider)?;
                match cfg.refresh.time_zone()? {
                    Some(tz) => watch(source, &cfg.refresh, tz).await,
                    None => watch(source, &cfg.refresh, Local).await,
                }
            }
        }
    }
}

fn configure(id: ProviderId) -> anyhow::Result<()> {
    let mut cfg = Config::load()?;

    let api_key = Password::new(&format!("API key for {id}:"))
        .without_confirmation()
        .with_display_mode(PasswordDisplayMode::Masked)
        .prompt()
        .context("Failed to read API key")?;
    let api_key = api_key.trim().to_string();
    if api_key.is_empty() {
        bail!("API key must not be empty");
    }

    let had_other_default = cfg
        .default_provider_id()
        .map(|current| current != id)
        .unwrap_or(false);
    cfg.upsert_provider_api_key(id, api_key);

    if had_other_default {
        let make_default = Confirm::new(&format!("Make {id} the default provider?"))
            .with_default(false)
            .prompt()
            .context("Failed to read answer")?;
        if make_default {
            cfg.set_default_provider(id);
        }
    }

    cfg.save()?;
    println!("Saved {id} credentials to {}", Config::config_file_path()?.display());
    Ok(())
}

fn resolve_source(
    cfg: &Config,
    provider: Option<ProviderId>,
) -> anyhow::Result<Arc<dyn WeatherSource>> {
    let source = match provider {
        Some(id) => provider_from_config(id, cfg)?,
        None => default_provider_from_config(cfg)?,
    };
    debug!(
        provider = provider.map_or("default", |id| id.as_str()),
        timeout = ?cfg.refresh.fetch_timeout(),
        "weather source ready"
    );
    Ok(source)
}

async fn show<Tz>(
    source: Arc<dyn WeatherSource>,
    settings: &RefreshConfig,
    tz: Tz,
    location: &str,
) -> anyhow::Result<()>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut orchestrator = RefreshOrchestrator::new(source, settings, tz.clone());
    if orchestrator.submit_query(location) == SubmitOutcome::Ignored {
        bail!("Please enter a location.");
    }

    while let Some(update) = orchestrator.next_update().await {
        match update {
            DisplayUpdate::Primary { report, .. } => {
                print!("{}", render::report(&report, &tz));
                return Ok(());
            }
            DisplayUpdate::Failed { label, failure } => {
                let message = render::failure(&label, &failure);
                return Err(anyhow::Error::new(failure).context(message));
            }
            DisplayUpdate::Recent(_) => {}
        }
    }

    bail!("Weather lookup ended without a result")
}

/// Event loop: stdin queries in, display updates out. All display and cache
/// changes happen here.
async fn watch<Tz>(source: Arc<dyn WeatherSource>, settings: &RefreshConfig, tz: Tz) -> anyhow::Result<()>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut orchestrator = RefreshOrchestrator::new(source, settings, tz.clone());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Type a location and press Enter. `:recent` lists recent locations, `:q` quits.");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read from stdin")? else {
                    break;
                };
                let input = line.trim();
                match input {
                    ":q" | ":quit" | "quit" | "exit" => break,
                    ":recent" => print!("{}", render::recent(&orchestrator.recent(), &tz)),
                    _ => match orchestrator.submit_query(input) {
                        SubmitOutcome::Started => println!("Fetching weather for {input}..."),
                        SubmitOutcome::Coalesced => println!("Still fetching {input}..."),
                        SubmitOutcome::Ignored => {}
                    },
                }
            }
            Some(update) = orchestrator.next_update() => match update {
                DisplayUpdate::Primary { report, recent, .. } => {
                    println!();
                    print!("{}", render::report(&report, &tz));
                    println!();
                    print!("{}", render::recent(&recent, &tz));
                }
                DisplayUpdate::Failed { label, failure } => {
                    eprintln!("{}", render::failure(&label, &failure));
                }
                DisplayUpdate::Recent(recent) => {
                    println!();
                    print!("{}", render::recent(&recent, &tz));
                }
            },
        }
    }

    Ok(())
}
