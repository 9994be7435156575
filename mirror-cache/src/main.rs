use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use libmirrorcast::{CacheEntry, CrossReferenceCache, DestinationPlatform, MirrorError};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Parser, Debug)]
#[command(name = "mirror-cache")]
#[command(version, about = "Inspect the cross-reference cache")]
#[command(long_about = r#"Inspect the cross-reference cache that maps source posts to their
mirrored copies.

EXAMPLES:
    # List the 20 most recent mirrored posts (default)
    mirror-cache list

    # Only posts mirrored to Mastodon, more of them
    mirror-cache list --platform mastodon --limit 100

    # Where did a source post end up?
    mirror-cache show 1790000000000000001

    # Totals per destination
    mirror-cache stats

    # JSON output for scripting
    mirror-cache --format json list | jq -r '.[] | .destinations.mastodon'
    mirror-cache --format json stats

OUTPUT FORMATS:
    text - Human-readable text (default)
    json - JSON document

EXIT CODES:
    0 - Success (including an empty cache)
    1 - Error (configuration or cache unreadable)
    3 - Source post not found in the cache
"#)]
struct Args {
    /// Output format
    #[arg(short, long, default_value = "text", value_name = "FORMAT", global = true)]
    #[arg(value_parser = ["text", "json"])]
    format: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List mirrored posts, most recent source ids first
    List {
        /// Only posts mirrored to this destination
        #[arg(short, long, value_name = "PLATFORM")]
        platform: Option<DestinationPlatform>,

        /// Maximum number of entries to print
        #[arg(short, long, default_value = "20", value_name = "N")]
        limit: usize,
    },

    /// Show the destination ids of one source post
    Show {
        /// Source post id
        source_id: String,
    },

    /// Count mirrored posts per destination
    Stats,
}

#[derive(Debug, Serialize)]
struct EntryView<'a> {
    source_id: &'a str,
    destinations: BTreeMap<DestinationPlatform, &'a str>,
}

impl<'a> EntryView<'a> {
    fn new(source_id: &'a str, entry: &'a CacheEntry) -> Self {
        Self {
            source_id,
            destinations: entry.platforms().collect(),
        }
    }
}

#[derive(Debug, Serialize)]
struct Stats {
    store: String,
    total: usize,
    platforms: BTreeMap<DestinationPlatform, usize>,
}

/// Order source ids newest first
///
/// Source ids are decimal snowflakes, so a longer id is a newer one.
fn newest_first<'a>(a: &'a str, b: &'a str) -> std::cmp::Ordering {
    b.len().cmp(&a.len()).then_with(|| b.cmp(a))
}

fn list_entries(
    cache: &CrossReferenceCache,
    platform: Option<DestinationPlatform>,
    limit: usize,
) -> Vec<EntryView<'_>> {
    let mut entries: Vec<(&str, &CacheEntry)> = cache
        .iter()
        .filter(|(_, entry)| platform.map_or(true, |p| entry.get(p).is_some()))
        .collect();

    entries.sort_by(|(a, _), (b, _)| newest_first(a, b));

    entries
        .into_iter()
        .take(limit)
        .map(|(id, entry)| EntryView::new(id, entry))
        .collect()
}

fn print_entry(entry: &EntryView<'_>) {
    println!("{}", entry.source_id);
    for (platform, destination_id) in &entry.destinations {
        println!("  {}: {}", platform, destination_id);
    }
}

async fn run(args: Args) -> Result<()> {
    let config = libmirrorcast::Config::load().context("Failed to load configuration")?;
    let store = config.cache.open_store().await?;
    let cache = store.load().await?;

    tracing::debug!("Loaded {} entries from {}", cache.len(), store.describe());

    let json = args.format == "json";

    match args.command {
        Command::List { platform, limit } => {
            let entries = list_entries(&cache, platform, limit);

            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                for entry in &entries {
                    print_entry(entry);
                }
            }
        }
        Command::Show { source_id } => {
            let id = libmirrorcast::normalize::normalize_id(&source_id);
            let entry = cache.get(&id).ok_or_else(|| {
                MirrorError::InvalidInput(format!("Source post {} is not in the cache", id))
            })?;
            let view = EntryView::new(&id, entry);

            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print_entry(&view);
            }
        }
        Command::Stats => {
            let stats = Stats {
                store: store.describe(),
                total: cache.len(),
                platforms: DestinationPlatform::ALL
                    .iter()
                    .map(|p| (*p, cache.count_for(*p)))
                    .collect(),
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("Store: {}", stats.store);
                println!("Mirrored posts: {}", stats.total);
                for (platform, count) in &stats.platforms {
                    println!("  {}: {}", platform, count);
                }
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    libmirrorcast::logging::init_default();

    let args = Args::parse();
    tracing::debug!("mirror-cache started with args: {:?}", args);

    if let Err(e) = run(args).await {
        eprintln!("Error: {:#}", e);
        let code = e
            .downcast_ref::<MirrorError>()
            .map(MirrorError::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}
