//! WeatherWise - weather dashboard in your terminal.
//!
//! The presentation layer: every weather request goes through the
//! freshness-checked service, never straight to the network. On total
//! failure (no live data, no usable fallback) commands print an explicit
//! error and exit non-zero rather than rendering stale or empty data.

mod app;
mod render;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::mpsc;

use app::App;
use weatherwise_core::AppError;
use weatherwise_offline::{ControlMessage, Worker, WorkerEvent};
use weatherwise_store::{FavoriteCity, LastLocation, SettingsUpdate, TemperatureUnit};

/// Fallback city when nothing has been looked up yet.
const DEFAULT_CITY: &str = "London";

#[derive(Parser)]
#[command(name = "weatherwise", about = "Weather dashboard in your terminal")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show current conditions (defaults to the last looked-up city)
    Current { city: Option<String> },
    /// Show the hourly and daily forecast
    Forecast { city: Option<String> },
    /// Search cities matching a free-text query
    Search { query: String },
    /// Resolve the device location and show its weather
    Locate,
    /// Show air quality for a city
    Air { city: Option<String> },
    /// Manage favorite cities
    Favorites {
        #[command(subcommand)]
        action: FavoritesAction,
    },
    /// Show or change settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Export favorites, settings and last location as JSON to stdout
    Export,
    /// Import previously exported data (all-or-nothing)
    Import { file: PathBuf },
    /// Live dashboard: refreshes in the background until interrupted
    Watch {
        city: Option<String>,
        /// Minutes between background refreshes
        #[arg(long, default_value_t = 15)]
        interval_mins: u64,
    },
}

#[derive(Subcommand)]
enum FavoritesAction {
    List,
    /// Add a city (resolved via geocoding search)
    Add { city: String },
    /// Remove a city by name
    Remove { city: String },
}

#[derive(Subcommand)]
enum SettingsAction {
    Show,
    Set {
        #[arg(long)]
        dark_mode: Option<bool>,
        #[arg(long, value_enum)]
        unit: Option<UnitArg>,
        #[arg(long)]
        language: Option<String>,
        #[arg(long)]
        notifications: Option<bool>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum UnitArg {
    Celsius,
    Fahrenheit,
}

impl From<UnitArg> for TemperatureUnit {
    fn from(unit: UnitArg) -> Self {
        match unit {
            UnitArg::Celsius => TemperatureUnit::Celsius,
            UnitArg::Fahrenheit => TemperatureUnit::Fahrenheit,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = weatherwise_core::init() {
        eprintln!("Failed to initialize logging: {}", e);
    }

    if let Err(err) = run(cli).await {
        tracing::error!("{}", err);
        eprintln!("{}", err.user_message());
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let app = App::new()?;
    tracing::debug!("Using data dir {}", app.config().data_dir.display());

    match cli.command {
        Command::Current { city } => cmd_current(&app, city).await,
        Command::Forecast { city } => cmd_forecast(&app, city).await,
        Command::Search { query } => cmd_search(&app, &query).await,
        Command::Locate => cmd_locate(&app).await,
        Command::Air { city } => cmd_air(&app, city).await,
        Command::Favorites { action } => cmd_favorites(&app, action).await,
        Command::Settings { action } => cmd_settings(&app, action),
        Command::Export => cmd_export(&app),
        Command::Import { file } => cmd_import(&app, &file),
        Command::Watch { city, interval_mins } => cmd_watch(&app, city, interval_mins).await,
    }

    Ok(())
}

/// Explicit error state: print the user-facing message and stop.
fn fail(message: &str) -> ! {
    eprintln!("{}", message);
    std::process::exit(1);
}

/// The city to ask about: explicit argument, else the last location, else
/// the default.
fn resolve_city(app: &App, city: Option<String>) -> String {
    city.or_else(|| app.store().last_location().map(|l| l.city))
        .unwrap_or_else(|| DEFAULT_CITY.to_string())
}

async fn cmd_current(app: &App, city: Option<String>) {
    let city = resolve_city(app, city);
    let settings = app.store().settings();

    match app.service().current(&city).await {
        Ok(snapshot) => {
            app.store().set_last_location(LastLocation {
                lat: snapshot.current.coord.lat,
                lon: snapshot.current.coord.lon,
                city: snapshot.current.name.clone(),
            });
            render::print_current(&snapshot, &settings);

            if app.store().install_prompt_eligible(app.tip_cooldown()) {
                println!();
                println!("Tip: 'weatherwise watch' keeps a live dashboard running.");
                app.store().dismiss_install_prompt();
            }
        }
        Err(e) => fail(&e.user_message()),
    }
}

async fn cmd_forecast(app: &App, city: Option<String>) {
    let city = resolve_city(app, city);
    let settings = app.store().settings();

    match app.service().forecast(&city).await {
        Ok(forecast) => render::print_forecast(&forecast, &settings),
        Err(e) => fail(&e.user_message()),
    }
}

async fn cmd_search(app: &App, query: &str) {
    match app.service().search_cities(query).await {
        Ok(matches) => render::print_search(&matches),
        Err(e) => fail(&e.user_message()),
    }
}

async fn cmd_locate(app: &App) {
    let coords = match app.locator().locate().await {
        Ok(coords) => coords,
        // Permission/capability failures surface as guidance, no retry
        Err(e) => fail(e.user_message()),
    };

    let settings = app.store().settings();
    match app
        .service()
        .current_by_coords(coords.latitude, coords.longitude, None)
        .await
    {
        Ok(snapshot) => {
            app.store().set_last_location(LastLocation {
                lat: coords.latitude,
                lon: coords.longitude,
                city: snapshot.current.name.clone(),
            });
            render::print_current(&snapshot, &settings);
        }
        Err(e) => fail(&e.user_message()),
    }
}

async fn cmd_air(app: &App, city: Option<String>) {
    let city = resolve_city(app, city);

    let matches = match app.service().search_cities(&city).await {
        Ok(matches) => matches,
        Err(e) => fail(&e.user_message()),
    };
    let Some(place) = matches.first() else {
        fail(&format!("No city found matching '{}'.", city));
    };

    match app.service().air_quality(place.lat, place.lon).await {
        Ok(air) => {
            println!("{}", place.label());
            render::print_air(&air);
        }
        Err(e) => fail(&e.user_message()),
    }
}

async fn cmd_favorites(app: &App, action: FavoritesAction) {
    match action {
        FavoritesAction::List => render::print_favorites(&app.store().favorites()),
        FavoritesAction::Add { city } => {
            let matches = match app.service().search_cities(&city).await {
                Ok(matches) => matches,
                Err(e) => fail(&e.user_message()),
            };
            let Some(place) = matches.first() else {
                fail(&format!("No city found matching '{}'.", city));
            };

            app.store().add_favorite(FavoriteCity::new(
                place.name.clone(),
                place.country.clone(),
                place.lat,
                place.lon,
            ));
            println!("Added {} to favorites.", place.label());
        }
        FavoritesAction::Remove { city } => {
            let favorites = app.store().favorites();
            match favorites.iter().find(|f| f.name.eq_ignore_ascii_case(&city)) {
                Some(fav) => {
                    app.store().remove_favorite(&fav.id);
                    println!("Removed {} from favorites.", fav.name);
                }
                None => println!("{} is not a favorite.", city),
            }
        }
    }
}

fn cmd_settings(app: &App, action: SettingsAction) {
    match action {
        SettingsAction::Show => render::print_settings(&app.store().settings()),
        SettingsAction::Set { dark_mode, unit, language, notifications } => {
            app.store().update_settings(SettingsUpdate {
                dark_mode,
                temperature_unit: unit.map(TemperatureUnit::from),
                language,
                notifications,
            });
            render::print_settings(&app.store().settings());
        }
    }
}

fn cmd_export(app: &App) {
    let data = app.store().export_data();
    match serde_json::to_string_pretty(&data) {
        Ok(json) => println!("{}", json),
        Err(e) => fail(&format!("Export failed: {}", e)),
    }
}

fn cmd_import(app: &App, file: &Path) {
    let json = match std::fs::read_to_string(file) {
        Ok(json) => json,
        Err(e) => fail(&format!("Cannot read {}: {}", file.display(), e)),
    };

    match app.store().import_data(&json) {
        Ok(()) => println!("Imported favorites, settings and last location."),
        Err(e) => fail(&format!("Import rejected: {}", e)),
    }
}

/// Live dashboard. The offline worker runs as a background task; on each
/// periodic wake it broadcasts a sync event and this context refetches
/// through the service.
async fn cmd_watch(app: &App, city: Option<String>, interval_mins: u64) {
    let city = resolve_city(app, city);
    let settings = app.store().settings();

    let snapshot = match app.service().current(&city).await {
        Ok(snapshot) => snapshot,
        Err(e) => fail(&e.user_message()),
    };
    render::print_current(&snapshot, &settings);

    let cache = match app.offline_cache() {
        Ok(cache) => Arc::new(cache),
        Err(e) => fail(e.user_message()),
    };

    let mut worker = Worker::new(cache);
    let mut events = worker.subscribe();

    // App shell for offline use: the condition icons we just rendered
    let assets: Vec<String> = snapshot
        .current
        .weather
        .iter()
        .map(|tag| app.service().icon_url(&tag.icon, Default::default()))
        .collect();
    if let Err(e) = worker.install(&assets).await {
        tracing::warn!("Offline precache failed: {}", e);
    }

    let (control_tx, control_rx) = mpsc::channel(8);
    tokio::spawn(worker.run(control_rx));

    // Take over immediately; old cache generations are purged here
    if control_tx.send(ControlMessage::SkipWaiting).await.is_err() {
        fail("Offline worker stopped unexpectedly.");
    }

    let mut ticker = tokio::time::interval(StdDuration::from_secs(interval_mins.max(1) * 60));
    ticker.tick().await; // the first tick fires immediately

    println!();
    println!("Watching {} (refresh every {} min, Ctrl-C to stop)", city, interval_mins.max(1));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if control_tx.send(ControlMessage::PeriodicSync).await.is_err() {
                    break;
                }
            }
            event = events.recv() => match event {
                Ok(WorkerEvent::SyncWeather) => {
                    // The worker only signals; fetching is this layer's job
                    match app.service().current(&city).await {
                        Ok(snapshot) => {
                            println!();
                            render::print_current(&snapshot, &settings);
                        }
                        Err(e) => eprintln!("{}", e.user_message()),
                    }
                }
                Err(_) => break,
            },
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    tracing::warn!("Signal handler failed: {}", e);
                }
                println!();
                println!("Stopped.");
                break;
            }
        }
    }
}
