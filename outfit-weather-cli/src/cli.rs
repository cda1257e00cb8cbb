use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use outfit_weather_core::{Config, ProviderId, RegionDirectory, WeatherEngine, WeatherRecord};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "outfit-weather", version, about = "Weather for the outfit log")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure credentials for a specific provider.
    Configure {
        /// Provider short name, e.g. "kma" or "openweather".
        provider: String,

        /// Override the provider's endpoint (useful against a local stub).
        #[arg(long)]
        base_url: Option<String>,
    },

    /// Show the weather right now.
    Current {
        /// Region id or Korean name, e.g. "seoul" or "부산".
        region: String,

        /// Print the record as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show the weather on a past or upcoming date.
    History {
        /// Date as YYYY-MM-DD.
        date: NaiveDate,

        region: String,

        #[arg(long)]
        json: bool,
    },

    /// List known regions.
    Regions,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Configure { provider, base_url } => configure(&provider, base_url)?,
            Command::Current { region, json } => {
                let engine = engine()?;
                let record = engine.current_weather(&region).await;
                print_record(&region, None, &record, json)?;
            }
            Command::History { date, region, json } => {
                let engine = engine()?;
                let record = engine.historical().get_or_fetch(date, &region).await;
                print_record(&region, Some(date), &record, json)?;
            }
            Command::Regions => {
                for region in RegionDirectory::new().regions() {
                    println!("{:<10} {:<6} {}", region.id, region.localized_name, region.english_name);
                }
            }
        }

        Ok(())
    }
}

fn engine() -> Result<WeatherEngine> {
    let config = Config::load()?;
    let configured: Vec<_> =
        ProviderId::all().iter().filter(|id| config.is_provider_configured(**id)).collect();
    tracing::debug!(?configured, "configuration loaded");
    WeatherEngine::from_config(&config)
}

fn configure(provider: &str, base_url: Option<String>) -> Result<()> {
    let id = ProviderId::try_from(provider)?;
    let mut config = Config::load_file()?;

    let api_key = inquire::Password::new(&format!("API key for {id}:"))
        .without_confirmation()
        .with_display_mode(inquire::PasswordDisplayMode::Masked)
        .prompt()
        .context("Failed to read API key")?;

    if api_key.trim().is_empty() {
        bail!("API key must not be empty");
    }

    config.upsert_provider_api_key(id, api_key.trim().to_string());
    if let Some(url) = base_url {
        config.set_provider_base_url(id, url);
    }
    config.save()?;

    println!("Saved credentials for {id} to {}", Config::config_file_path()?.display());
    Ok(())
}

fn print_record(
    region: &str,
    date: Option<NaiveDate>,
    record: &WeatherRecord,
    json: bool,
) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(record)?);
        return Ok(());
    }

    let name = RegionDirectory::new()
        .resolve(region)
        .map(|r| r.localized_name)
        .unwrap_or(region);

    match date {
        Some(date) => println!("{name} {date} ({})", record.season),
        None => println!("{name} ({})", record.season),
    }
    println!("  {:.1}°C, {}", record.temperature, record.weather_expression);
    if let (Some(min), Some(max)) = (record.min_temperature, record.max_temperature) {
        println!("  range {min:.1}°C .. {max:.1}°C");
    }
    println!("  {} | rain {:.1}mm", record.icon().as_str(), record.rain);
    if let Some(humidity) = record.humidity {
        println!("  humidity {humidity:.0}%");
    }
    println!("  source: {}", record.source);

    Ok(())
}
