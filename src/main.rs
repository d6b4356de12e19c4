//! Command-line front end for the forecast panel
//!
//! Renders the panel to the terminal, or emits JSON snapshots for
//! widget hosts with `--json`.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::exit;
use tracing::info;
use tracing_subscriber::EnvFilter;
use weathergrid::models::popular_cities;
use weathergrid::widget::PanelSnapshot;
use weathergrid::{DisplayMode, PanelService, WeatherGridConfig, WeatherGridError, icons};

/// Glanceable weather forecast grid for widget hosts
#[derive(Parser)]
#[command(name = "weathergrid")]
#[command(version, about = "Glanceable weather forecast grid for widget hosts", long_about = None)]
struct Cli {
    /// Emit JSON instead of rendered text
    #[arg(long, global = true)]
    json: bool,

    /// Use a specific configuration file
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// With no command, the panel is refreshed and rendered
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Switch to the hourly grid and render
    Hourly,

    /// Switch to the daily grid and render
    Daily,

    /// Search for places by name
    Search {
        /// Free-text place query
        #[arg(required = true)]
        query: Vec<String>,
    },

    /// Pin the panel to an explicit place
    Use {
        /// Latitude in decimal degrees
        #[arg(allow_negative_numbers = true)]
        latitude: f64,

        /// Longitude in decimal degrees
        #[arg(allow_negative_numbers = true)]
        longitude: f64,

        /// Display name for the place
        #[arg(required = true)]
        city: Vec<String>,
    },

    /// Return to automatic location detection
    Auto,

    /// List the curated city presets
    Cities,

    /// Show the weather icon legend
    Legend,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        report_error(&e);
        exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let json = cli.json;

    match cli.command {
        // Neither configuration nor network needed
        Some(Commands::Legend) => print_legend(json),
        Some(Commands::Cities) => print_cities(json),

        None => render(&boot(cli.config)?, json).await,
        Some(Commands::Hourly) => {
            let service = boot(cli.config)?;
            service.set_mode(DisplayMode::Hourly).await?;
            render(&service, json).await
        }
        Some(Commands::Daily) => {
            let service = boot(cli.config)?;
            service.set_mode(DisplayMode::Daily).await?;
            render(&service, json).await
        }
        Some(Commands::Search { query }) => {
            let query = query.join(" ");
            let service = boot(cli.config)?;
            let results = service.search(&query).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else if results.is_empty() {
                println!("No places found for '{}'", query.trim());
            } else {
                for result in &results {
                    println!(
                        "{} ({:.4}, {:.4})",
                        result.display_name, result.latitude, result.longitude
                    );
                }
            }
            Ok(())
        }
        Some(Commands::Use {
            latitude,
            longitude,
            city,
        }) => {
            let service = boot(cli.config)?;
            service
                .set_custom_location(latitude, longitude, &city.join(" "))
                .await?;
            render(&service, json).await
        }
        Some(Commands::Auto) => {
            let service = boot(cli.config)?;
            service.clear_custom_location().await?;
            render(&service, json).await
        }
    }
}

/// Load configuration, start logging, build the panel service
fn boot(config_path: Option<PathBuf>) -> Result<PanelService> {
    let config = WeatherGridConfig::load_from_path(config_path)?;
    init_logging(&config);
    info!(version = weathergrid::VERSION, "Starting weathergrid");
    PanelService::new(&config)
}

async fn render(service: &PanelService, json: bool) -> Result<()> {
    let snapshot = service.refresh().await?;
    print_snapshot(&snapshot, json)
}

fn init_logging(config: &WeatherGridConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("weathergrid={}", config.logging.level)));

    // Logs go to stderr so that rendered panels and JSON stay parseable
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if config.logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn print_snapshot(snapshot: &PanelSnapshot, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(snapshot)?);
    } else {
        print!("{snapshot}");
    }
    Ok(())
}

fn print_legend(json: bool) -> Result<()> {
    if json {
        let entries: Vec<serde_json::Value> = icons::ALL
            .iter()
            .map(|kind| {
                serde_json::json!({
                    "icon": kind,
                    "glyph": kind.glyph(),
                    "description": kind.description(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        print!("{}", icons::legend());
    }
    Ok(())
}

fn print_cities(json: bool) -> Result<()> {
    let cities = popular_cities();
    if json {
        println!("{}", serde_json::to_string_pretty(&cities)?);
    } else {
        for city in &cities {
            println!("{:<16} {}", city.city, city.format_coordinates());
        }
    }
    Ok(())
}

fn report_error(error: &anyhow::Error) {
    if let Some(app_error) = error.downcast_ref::<WeatherGridError>() {
        eprintln!("Error: {}", app_error.user_message());
    } else {
        eprintln!("Error: {error:#}");
    }
}
