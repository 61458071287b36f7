use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use super::{Cli, Commands, OutputFormat};
use crate::{
    app::{init_config, Config, StoreBackend},
    cache::{CacheCoordinator, CacheLookup},
    features::{LocationLookup, NeutralLocationLookup, StaticLocationLookup},
    query::{cache_key, Query},
    store::{CacheCapableStore, FileStore, MemoryStore, NullStore},
};

/// Handle a CLI subcommand
pub async fn handle_command(cli: &Cli, config: &Config) -> Result<()> {
    match &cli.command {
        Commands::Init => {
            let path = init_config()?;
            println!("Configuration available at: {}", path.display());
            Ok(())
        }
        Commands::Key { query } => {
            let query = read_query(query)?;
            print_key(cli.output_format, &cache_key(&query))
        }
        Commands::Features { query } => {
            let query = read_query(query)?;
            let coordinator = build_coordinator(config, Arc::new(NullStore))?;
            let vector = coordinator.normalizer().normalize(&query);
            println!("{}", serde_json::to_string_pretty(&vector)?);
            Ok(())
        }
        Commands::Compare { a, b, distance_km } => {
            let (a, b) = (read_query(a)?, read_query(b)?);
            let coordinator = build_coordinator(config, Arc::new(NullStore))?;
            let normalizer = coordinator.normalizer();
            let breakdown = coordinator.scorer().breakdown(
                &normalizer.normalize(&a),
                &normalizer.normalize(&b),
                *distance_km,
            );

            if cli.output_format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&breakdown)?);
                return Ok(());
            }

            let verdict = if breakdown.total >= config.cache.min_similarity {
                "would match".green()
            } else {
                "would not match".red()
            };
            println!("Similarity: {:.4} ({})", breakdown.total, verdict);
            match breakdown.location {
                Some(location) => println!("  location:    {:.4}", location),
                None => println!("  location:    {}", "unknown (omitted)".dimmed()),
            }
            println!("  weather:     {:.4}", breakdown.weather);
            println!("  temporal:    {:.4}", breakdown.temporal);
            println!("  demographic: {:.4}", breakdown.demographic);
            if breakdown.gated {
                println!("  {}", "distance above cutoff, score forced to 0".yellow());
            }
            Ok(())
        }
        Commands::Get { query } => {
            let query = read_query(query)?;
            let coordinator = build_coordinator(config, open_store(cli, config)?)?;
            let lookup = coordinator.get(&query).await;

            if cli.output_format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&lookup)?);
                return Ok(());
            }
            match lookup {
                CacheLookup::Hit(hit) => {
                    println!(
                        "{} {:?} hit (similarity {:.3}, key {})",
                        "[HIT]".green(),
                        hit.hit_type,
                        hit.similarity,
                        &hit.key[..12.min(hit.key.len())]
                    );
                    println!("{}", hit.result);
                }
                CacheLookup::Miss => println!("{} no cached result", "[MISS]".yellow()),
            }
            Ok(())
        }
        Commands::Put { query, result } => {
            let query = read_query(query)?;
            let result = std::fs::read_to_string(result)
                .with_context(|| format!("Failed to read result from {}", result.display()))?;
            let coordinator = build_coordinator(config, open_store(cli, config)?)?;
            let outcome = coordinator.put(&query, result).await;

            if cli.output_format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else if outcome.stored {
                println!(
                    "{} stored under {} ({} evicted)",
                    "[OK]".green(),
                    outcome.key,
                    outcome.evicted
                );
            } else {
                println!("{} result was not cached (see log)", "[WARNING]".yellow());
            }
            Ok(())
        }
        Commands::Stats => {
            let store = open_store(cli, config)?;
            let entries = store.count_entries().await?;
            println!("Activity Cache Status:");
            println!("  Store:        {}", store.name());
            println!("  Entries:      {} / {}", entries, config.cache.max_entries);
            println!(
                "  Legacy shape: {}",
                if store.supports_legacy() { "enabled" } else { "disabled" }
            );
            println!("  Threshold:    {:.2}", config.cache.min_similarity);
            println!(
                "  Weights:      location {:.2}, weather {:.2}, temporal {:.2}, demographic {:.2}",
                config.weights.location,
                config.weights.weather,
                config.weights.temporal,
                config.weights.demographic
            );
            Ok(())
        }
        Commands::Clear => {
            let store = open_store(cli, config)?;
            store.clear().await?;
            println!("Cleared {} store", store.name());
            Ok(())
        }
    }
}

fn read_query(path: &Path) -> Result<Query> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read query from {}", path.display()))?;
    let query: Query = serde_json::from_str(&content)
        .with_context(|| format!("Invalid query JSON in {}", path.display()))?;
    if let Err(e) = query.validate() {
        // Still usable: normalization falls back to defaults
        warn!("{}", e);
    }
    Ok(query)
}

fn print_key(format: OutputFormat, key: &str) -> Result<()> {
    match format {
        OutputFormat::Text => println!("{}", key),
        OutputFormat::Json => println!("{}", serde_json::json!({ "key": key })),
    }
    Ok(())
}

/// Open the configured store, honouring CLI overrides
pub fn open_store(cli: &Cli, config: &Config) -> Result<Arc<dyn CacheCapableStore>> {
    let backend = cli.store.map(StoreBackend::from).unwrap_or(config.store.backend);
    let legacy = config.cache.write_legacy_shape;

    let store: Arc<dyn CacheCapableStore> = match backend {
        StoreBackend::File => {
            let path = match &cli.store_path {
                Some(path) => path.clone(),
                None => config.store_path()?,
            };
            info!("Using file store at {}", path.display());
            let store = if legacy {
                FileStore::open_with_legacy(&path)?
            } else {
                FileStore::open(&path)?
            };
            Arc::new(store)
        }
        StoreBackend::Memory => {
            warn!("Memory store does not persist between invocations");
            if legacy {
                Arc::new(MemoryStore::with_legacy())
            } else {
                Arc::new(MemoryStore::new())
            }
        }
        StoreBackend::None => Arc::new(NullStore),
    };
    Ok(store)
}

fn build_coordinator(
    config: &Config,
    store: Arc<dyn CacheCapableStore>,
) -> Result<CacheCoordinator> {
    let lookup: Arc<dyn LocationLookup> = match &config.geocoding.gazetteer {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read gazetteer {}", path.display()))?;
            let gazetteer = StaticLocationLookup::from_json(&json)
                .with_context(|| format!("Invalid gazetteer {}", path.display()))?;
            info!("Loaded {} place(s) from gazetteer", gazetteer.len());
            Arc::new(gazetteer)
        }
        None => Arc::new(NeutralLocationLookup),
    };
    Ok(CacheCoordinator::new(store, config).with_location_lookup(lookup))
}
