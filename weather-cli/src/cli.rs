use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use inquire::{Password, PasswordDisplayMode, Select, Text};
use weather_core::{
    CacheStore, Config, FixedLocationProvider, LocationSuggestion, SqliteCacheStore,
    WeatherController, WeatherSynchronizer, config::MAX_FORECAST_DAYS,
    controller::MIN_SEARCH_QUERY_CHARS, provider_from_config, sync::purge_stale_snapshots,
};

use crate::output;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather", version, about = "Weather CLI")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Set the weatherapi.com API key and cache settings.
    Configure,

    /// Show weather for an address or place name.
    Show {
        /// Address, place name or "lat,lon".
        address: String,

        /// Number of forecast days to show.
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=MAX_FORECAST_DAYS as i64))]
        days: Option<u8>,
    },

    /// Search for a place and pick one to show.
    Search {
        /// At least three characters of a place name.
        query: String,
    },

    /// Fetch weather for coordinates and remember it as the current location.
    Locate {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
    },

    /// Print cached weather without contacting the API.
    Cached {
        /// Cached place name; defaults to the current location.
        location: Option<String>,
    },

    /// Delete cached entries older than the retention window.
    Purge,

    /// Follow a location and print weather as it changes, until Ctrl-C.
    Watch {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        /// Seconds between location fixes.
        #[arg(long, default_value_t = 10)]
        interval_secs: u64,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let mut config = Config::load()?;

        match self.command {
            Command::Configure => configure(&mut config),
            Command::Show { address, days } => {
                if let Some(days) = days {
                    config.forecast_days = days;
                }
                let sync = synchronizer(&config)?;
                let outcome = sync.fetch_weather(&address, false).await?;
                report_storage_warning(outcome.storage_warning.as_ref());
                print!("{}", output::render_weather(&outcome.document));
                Ok(())
            }
            Command::Search { query } => search(&config, &query).await,
            Command::Locate { lat, lon } => {
                let sync = synchronizer(&config)?;
                let name = sync.resolve_location_name(lat, lon).await;
                tracing::info!(%name, "Resolved current location");
                let outcome = sync.fetch_weather(&name, true).await?;
                report_storage_warning(outcome.storage_warning.as_ref());
                print!("{}", output::render_weather(&outcome.document));
                Ok(())
            }
            Command::Cached { location } => cached(&config, location.as_deref()).await,
            Command::Purge => {
                let (removed, remaining) = purge(&config).await?;
                println!("Removed {removed} stale entries, {remaining} remain.");
                Ok(())
            }
            Command::Watch { lat, lon, interval_secs } => {
                watch(&config, lat, lon, Duration::from_secs(interval_secs.max(1))).await
            }
        }
    }
}

fn configure(config: &mut Config) -> Result<()> {
    let api_key = Password::new("weatherapi.com API key:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()
        .context("API key prompt aborted")?;

    if api_key.trim().is_empty() {
        bail!("API key must not be empty");
    }
    config.set_api_key(api_key.trim().to_string());

    let days = Text::new("Forecast days:")
        .with_default(&config.forecast_days.to_string())
        .prompt()
        .context("Forecast days prompt aborted")?;
    config.forecast_days = days.trim().parse().context("Forecast days must be a number")?;
    if !(1..=MAX_FORECAST_DAYS).contains(&config.forecast_days) {
        bail!("Forecast days must be between 1 and {MAX_FORECAST_DAYS}");
    }

    config.save()?;
    println!("Saved configuration to {}", Config::config_file_path()?.display());
    Ok(())
}

fn open_store(config: &Config) -> Result<Arc<SqliteCacheStore>> {
    let path = config.database_path()?;
    let store = SqliteCacheStore::open(&path)
        .with_context(|| format!("Failed to open weather cache: {}", path.display()))?;
    Ok(Arc::new(store))
}

/// Drop entries past the retention window. Works without an API key.
async fn purge(config: &Config) -> Result<(usize, usize)> {
    let store = open_store(config)?;
    let removed = purge_stale_snapshots(store.as_ref(), config.sync_settings().retention).await?;
    Ok((removed, store.count().await?))
}

fn synchronizer(config: &Config) -> Result<Arc<WeatherSynchronizer>> {
    let provider = Arc::from(provider_from_config(config)?);
    let store = open_store(config)?;
    Ok(Arc::new(WeatherSynchronizer::new(provider, store, config.sync_settings())))
}

fn report_storage_warning(warning: Option<&weather_core::StorageError>) {
    if let Some(e) = warning {
        eprintln!("warning: {}", e.user_message());
    }
}

async fn search(config: &Config, query: &str) -> Result<()> {
    if query.chars().count() < MIN_SEARCH_QUERY_CHARS {
        bail!("Search needs at least {MIN_SEARCH_QUERY_CHARS} characters");
    }

    let sync = synchronizer(config)?;
    let suggestions = sync.search_locations(query).await?;
    if suggestions.is_empty() {
        println!("No places match '{query}'.");
        return Ok(());
    }

    let picked = pick_suggestion(suggestions)?;
    let outcome = sync.fetch_weather(&picked.coordinate_query(), false).await?;
    report_storage_warning(outcome.storage_warning.as_ref());
    print!("{}", output::render_weather(&outcome.document));
    Ok(())
}

fn pick_suggestion(mut suggestions: Vec<LocationSuggestion>) -> Result<LocationSuggestion> {
    if suggestions.len() == 1 {
        return Ok(suggestions.remove(0));
    }

    let labels: Vec<String> = suggestions.iter().map(LocationSuggestion::label).collect();
    let choice = Select::new("Pick a place:", labels)
        .raw_prompt()
        .context("Place selection aborted")?;
    Ok(suggestions.swap_remove(choice.index))
}

async fn cached(config: &Config, location: Option<&str>) -> Result<()> {
    let store = open_store(config)?;

    let snapshot = match location {
        Some(key) => store.read_by_key(key).await?,
        None => store.read_current().borrow().clone(),
    };

    let Some(snapshot) = snapshot else {
        println!("Nothing cached for {}.", location.unwrap_or("the current location"));
        return Ok(());
    };

    let document = snapshot
        .document()
        .with_context(|| format!("Cached entry for '{}' is unreadable", snapshot.location_key))?;
    println!("{}", output::render_cached_at(snapshot.fetched_at_millis));
    print!("{}", output::render_weather(&document));
    Ok(())
}

async fn watch(config: &Config, lat: f64, lon: f64, interval: Duration) -> Result<()> {
    let sync = synchronizer(config)?;
    let location = Arc::new(FixedLocationProvider::new(lat, lon).with_interval(interval));
    let controller = WeatherController::new(sync, location, config.controller_settings());

    let mut weather = controller.state().current_weather.subscribe();
    let mut error = controller.state().error.subscribe();

    controller.on_location_permission_granted().await;
    println!("Watching {lat},{lon}; press Ctrl-C to stop.");

    loop {
        tokio::select! {
            changed = weather.changed() => {
                if changed.is_err() {
                    break;
                }
                if let Some(doc) = weather.borrow_and_update().clone() {
                    print!("{}", output::render_weather(&doc));
                }
            }
            changed = error.changed() => {
                if changed.is_err() {
                    break;
                }
                if let Some(msg) = error.borrow_and_update().clone() {
                    eprintln!("error: {msg}");
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    controller.shutdown().await;
    Ok(())
}
