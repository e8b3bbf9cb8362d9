//! Command-line client for spatial location queries.
//!
//! Runs one query against the location collection and prints the matching
//! records as JSON.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use geosaw::config::Config;
use geosaw::models::Position;
use geosaw::{GeoPredicate, GeoQuery, MongoStore};

/// Polygon argument; an alias so clap takes it as one value
type Ring = Vec<Position>;

#[derive(Parser, Debug)]
#[command(name = "geoquery")]
#[command(about = "Spatial queries over administrative borders")]
struct Args {
    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// MongoDB connection string
    #[arg(long)]
    uri: Option<String>,

    /// Database name
    #[arg(long)]
    database: Option<String>,

    /// Collection name
    #[arg(long)]
    collection: Option<String>,

    /// Query time budget in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Borders intersecting a polygon
    Intersects {
        /// Ring as "lon,lat;lon,lat;..."
        #[arg(long, value_parser = parse_ring)]
        polygon: Ring,
    },
    /// Borders within a polygon
    Within {
        #[arg(long, value_parser = parse_ring)]
        polygon: Ring,
    },
    /// Borders near a polygon, nearest first
    Near {
        #[arg(long, value_parser = parse_ring)]
        polygon: Ring,
        /// Meters
        #[arg(long)]
        max_distance: f64,
    },
    /// Borders near a polygon on the sphere
    NearSphere {
        #[arg(long, value_parser = parse_ring)]
        polygon: Ring,
        /// Meters
        #[arg(long)]
        radius: f64,
    },
    /// Borders within a rectangle
    Box {
        /// "lon,lat"
        #[arg(long, value_parser = parse_position)]
        lower_left: Position,
        #[arg(long, value_parser = parse_position)]
        upper_right: Position,
    },
    /// Borders within a circle
    Center {
        #[arg(long, value_parser = parse_position)]
        center: Position,
        /// Meters
        #[arg(long)]
        radius: f64,
    },
    /// Borders within a GeoJSON geometry
    Geometry {
        /// GeoJSON geometry object
        #[arg(long)]
        geojson: String,
    },
    /// Borders within a distance of a point
    MaxDistance {
        #[arg(long, value_parser = parse_position)]
        point: Position,
        #[arg(long)]
        max_distance: f64,
    },
    /// Borders at least a distance away from a point
    MinDistance {
        #[arg(long, value_parser = parse_position)]
        point: Position,
        #[arg(long)]
        min_distance: f64,
    },
}

impl Command {
    fn into_predicate(self) -> Result<GeoPredicate> {
        Ok(match self {
            Command::Intersects { polygon } => GeoPredicate::Intersects { polygon },
            Command::Within { polygon } => GeoPredicate::Within { polygon },
            Command::Near {
                polygon,
                max_distance,
            } => GeoPredicate::Near {
                polygon,
                max_distance,
            },
            Command::NearSphere { polygon, radius } => GeoPredicate::NearSphere { polygon, radius },
            Command::Box {
                lower_left,
                upper_right,
            } => GeoPredicate::Box {
                lower_left,
                upper_right,
            },
            Command::Center { center, radius } => GeoPredicate::Center { center, radius },
            Command::Geometry { geojson } => {
                let value: serde_json::Value =
                    serde_json::from_str(&geojson).context("Invalid GeoJSON")?;
                let geometry = mongodb::bson::to_document(&value)
                    .context("GeoJSON geometry must be an object")?;
                GeoPredicate::Geometry { geometry }
            }
            Command::MaxDistance {
                point,
                max_distance,
            } => GeoPredicate::MaxDistance {
                point,
                max_distance,
            },
            Command::MinDistance {
                point,
                min_distance,
            } => GeoPredicate::MinDistance {
                point,
                min_distance,
            },
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays valid JSON
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load_from_file(path)
            .with_context(|| format!("Loading {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(uri) = args.uri {
        config.store.uri = uri;
    }
    if let Some(database) = args.database {
        config.store.database = database;
    }
    if let Some(collection) = args.collection {
        config.store.collection = collection;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.query.timeout_ms = timeout_ms;
    }

    let predicate = args.command.into_predicate()?;

    let store = MongoStore::from_config(&config.store)
        .await
        .context("Failed to connect to MongoDB")?;

    if !store.health_check().await? {
        anyhow::bail!("MongoDB did not answer the ping");
    }

    let doc_count = store.doc_count().await?;
    info!(
        "Connected to collection '{}' with about {} records",
        store.collection_name(),
        doc_count
    );

    info!(
        "Querying {}.{} ({})",
        config.store.database,
        store.collection_name(),
        predicate.operator()
    );

    let query = GeoQuery::with_config(store, config.query);
    let records = query.execute(&predicate).await?;

    info!("{} records matched", records.len());
    println!("{}", serde_json::to_string_pretty(&records)?);

    Ok(())
}

/// Parse "lon,lat"
fn parse_position(s: &str) -> Result<Position, String> {
    let parts: Vec<f64> = s
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("invalid coordinate in '{}': {}", s, e))?;
    match parts.as_slice() {
        [lon, lat] => Ok([*lon, *lat]),
        _ => Err(format!("expected 'lon,lat', got '{}'", s)),
    }
}

/// Parse "lon,lat;lon,lat;..."
fn parse_ring(s: &str) -> Result<Ring, String> {
    s.split(';')
        .filter(|p| !p.trim().is_empty())
        .map(parse_position)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_position() {
        assert_eq!(parse_position("106.8, -6.2").unwrap(), [106.8, -6.2]);
        assert!(parse_position("106.8").is_err());
        assert!(parse_position("a,b").is_err());
    }

    #[test]
    fn test_parse_ring() {
        let ring = parse_ring("0,0;0,1;1,1;1,0;0,0").unwrap();
        assert_eq!(ring.len(), 5);
        assert_eq!(ring[0], ring[4]);
        assert!(parse_ring("0,0;1").is_err());
    }

    #[test]
    fn test_geometry_command() {
        let command = Command::Geometry {
            geojson: r#"{"type":"Point","coordinates":[1.5,2.0]}"#.to_string(),
        };
        match command.into_predicate().unwrap() {
            GeoPredicate::Geometry { geometry } => {
                assert_eq!(geometry.get_str("type").unwrap(), "Point");
            }
            other => panic!("unexpected predicate {:?}", other),
        }

        let command = Command::Geometry {
            geojson: "[1, 2]".to_string(),
        };
        assert!(command.into_predicate().is_err());
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "geoquery",
            "--database",
            "GIS",
            "box",
            "--lower-left",
            "0,0",
            "--upper-right",
            "1,1",
        ])
        .unwrap();
        assert_eq!(args.database.as_deref(), Some("GIS"));
        match args.command {
            Command::Box {
                lower_left,
                upper_right,
            } => {
                assert_eq!(lower_left, [0.0, 0.0]);
                assert_eq!(upper_right, [1.0, 1.0]);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
