//! geosplit CLI - build leakage-safe train/test datasets from observation tables
//!
//! Usage:
//!   geosplit-cli build <csv> [--output <dir>] [--config <json>] [--seed <n>]
//!   geosplit-cli bands <csv> [--output <file>] [--config <json>]
//!
//! Input tables need the columns `id,x,y,latitude,longitude,species` and may
//! carry `genus,family`. `x`/`y` are projected metres.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use csv::{ReaderBuilder, WriterBuilder};
use geo::Rect;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;
use std::collections::BTreeSet;
use std::fmt::Display;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use geosplit::{build_dataset, BandSplitter, Dataset, Observation, SplitConfig};

#[derive(Parser)]
#[command(name = "geosplit-cli")]
#[command(about = "Spatial co-occurrence and leakage-safe train/test splits", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline and write the augmented table plus metadata
    Build {
        /// Observation table (csv)
        input: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Base name of the output files (defaults to the input file stem)
        #[arg(short, long)]
        name: Option<String>,

        #[command(flatten)]
        settings: Settings,
    },

    /// Write the band train/test/buffer regions as GeoJSON
    Bands {
        /// Observation table (csv)
        input: PathBuf,

        /// Output GeoJSON file
        #[arg(short, long, default_value = "bands.geojson")]
        output: PathBuf,

        #[command(flatten)]
        settings: Settings,
    },
}

/// Input parsing and configuration overrides shared by every command.
#[derive(Args)]
struct Settings {
    /// Field delimiter of the input table
    #[arg(short, long, default_value = ",")]
    delimiter: char,

    /// JSON file with a SplitConfig; flags below override its fields
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Imagery resolution in metres per pixel
    #[arg(long)]
    resolution: Option<f64>,

    /// Image window in pixels
    #[arg(long)]
    window: Option<u32>,

    /// Exclusion distance in metres
    #[arg(long)]
    exclusion: Option<f64>,

    /// Minimum number of neighborhoods a species must appear in
    #[arg(long)]
    threshold: Option<usize>,

    /// Upper bound on the cluster test fraction
    #[arg(long)]
    cap: Option<f64>,

    /// Latitude band width in degrees
    #[arg(long)]
    band_width: Option<f64>,

    /// Seed for rebalancing
    #[arg(long)]
    seed: Option<u64>,
}

impl Settings {
    fn split_config(&self) -> Result<SplitConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let file = File::open(path)
                    .with_context(|| format!("Failed to open config {}", path.display()))?;
                serde_json::from_reader(BufReader::new(file))
                    .with_context(|| format!("Invalid config {}", path.display()))?
            }
            None => SplitConfig::default(),
        };

        if let Some(v) = self.resolution {
            config.resolution_m_per_px = v;
        }
        if let Some(v) = self.window {
            config.window_px = v;
        }
        if let Some(v) = self.exclusion {
            config.exclusion_distance_m = v;
        }
        if let Some(v) = self.threshold {
            config.species_threshold = v;
        }
        if let Some(v) = self.cap {
            config.test_fraction_cap = v;
        }
        if let Some(v) = self.band_width {
            config.band_width_deg = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    fn delimiter(&self) -> Result<u8> {
        u8::try_from(self.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .with_context(|| format!("Delimiter {:?} is not a single ASCII character", self.delimiter))
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| writeln!(buf, "[{:5}] {}", record.level(), record.args()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            input,
            output,
            name,
            settings,
        } => run_build(&input, &output, name, &settings),
        Commands::Bands {
            input,
            output,
            settings,
        } => run_bands(&input, &output, &settings),
    }
}

/// Read an observation table.
fn load_observations(path: &Path, delimiter: u8) -> Result<Vec<Observation>> {
    log::info!("Loading observations from: {}", path.display());

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut observations = Vec::new();
    for (line, record) in reader.deserialize::<Observation>().enumerate() {
        let obs = record.with_context(|| format!("Bad record at row {}", line + 1))?;
        observations.push(obs);
    }

    log::info!("Loaded {} observations", observations.len());
    Ok(observations)
}

fn run_build(input: &Path, output: &Path, name: Option<String>, settings: &Settings) -> Result<()> {
    let config = settings.split_config()?;
    let observations = load_observations(input, settings.delimiter()?)?;

    println!("\n{}", "=".repeat(60));
    println!(
        "Building dataset: radius {} m, exclusion {} m, cap {:.1}%",
        config.overlap_radius(),
        config.exclusion_distance_m,
        config.test_fraction_cap * 100.0
    );
    println!("{}", "=".repeat(60));

    let mut rng = StdRng::seed_from_u64(config.seed);
    let dataset = build_dataset(observations, &config, &mut rng).context("Pipeline failed")?;

    let name = name.unwrap_or_else(|| {
        input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "dataset".to_string())
    });
    std::fs::create_dir_all(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;

    let table_path = output.join(format!("{name}.csv"));
    write_table(&dataset, &table_path)?;

    let metadata_path = output.join(format!("{name}_metadata.json"));
    let file = File::create(&metadata_path)
        .with_context(|| format!("Failed to create {}", metadata_path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &dataset.metadata)
        .context("Failed to write metadata")?;

    let test_rows = dataset.rows_with_label(geosplit::SplitLabel::Test).count();
    println!("\nRows:           {}", dataset.len());
    println!(
        "Test rows:      {} ({:.2}%)",
        test_rows,
        dataset.metadata.test_fraction * 100.0
    );
    println!("Train clusters: {}", dataset.metadata.train_clusters.len());
    println!("Test clusters:  {}", dataset.metadata.test_clusters.len());
    println!("Bands:          {}", dataset.bands.len());
    println!("\nWrote {}", table_path.display());
    println!("Wrote {}", metadata_path.display());
    Ok(())
}

fn join<T: Display>(values: impl IntoIterator<Item = T>) -> String {
    values
        .into_iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(";")
}

fn join_set(values: &BTreeSet<String>) -> String {
    join(values.iter())
}

/// Write the augmented table. Set-valued columns are joined with `;`.
fn write_table(dataset: &Dataset, path: &Path) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    let mut header: Vec<String> = [
        "id",
        "x",
        "y",
        "latitude",
        "longitude",
        "species",
        "genus",
        "family",
        "overlapping_ids",
        "overlapping_species",
        "overlapping_genus",
        "overlapping_family",
        "overlap_count",
        "species_id",
        "genus_id",
        "family_id",
        "overlapping_species_ids",
        "overlapping_genus_ids",
        "overlapping_family_ids",
        "split",
        "cluster_id",
        "cluster_next_dist",
        "member_next_dist",
        "neighbor_dist",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    for band in &dataset.bands {
        header.push(format!("train_{}", band.index));
        header.push(format!("test_{}", band.index));
    }
    writer.write_record(&header)?;

    for row in &dataset.rows {
        let obs = &row.observation;
        let mut record = vec![
            obs.id.to_string(),
            obs.x.to_string(),
            obs.y.to_string(),
            obs.latitude.to_string(),
            obs.longitude.to_string(),
            obs.species.clone(),
            obs.genus.clone(),
            obs.family.clone(),
            join(&row.overlap.overlapping_ids),
            join_set(&row.overlap.overlapping_species),
            join_set(&row.overlap.overlapping_genus),
            join_set(&row.overlap.overlapping_family),
            row.overlap.overlap_count.to_string(),
            row.taxon_ids.species_id.to_string(),
            row.taxon_ids.genus_id.to_string(),
            row.taxon_ids.family_id.to_string(),
            join(&row.taxon_ids.overlapping_species_ids),
            join(&row.taxon_ids.overlapping_genus_ids),
            join(&row.taxon_ids.overlapping_family_ids),
            row.split.label.to_string(),
            row.split.cluster_id.to_string(),
            row.split.cluster_next_dist.to_string(),
            row.split.member_next_dist.to_string(),
            row.split.neighbor_dist.map(|d| d.to_string()).unwrap_or_default(),
        ];
        for membership in &row.bands {
            record.push(membership.train.to_string());
            record.push(membership.test.to_string());
        }
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

fn rect_polygon(rect: &Rect<f64>) -> serde_json::Value {
    let (min, max) = (rect.min(), rect.max());
    json!([[
        [min.x, min.y],
        [max.x, min.y],
        [max.x, max.y],
        [min.x, max.y],
        [min.x, min.y]
    ]])
}

fn run_bands(input: &Path, output: &Path, settings: &Settings) -> Result<()> {
    let config = settings.split_config()?;
    let observations = load_observations(input, settings.delimiter()?)?;
    let splitter = BandSplitter::from_config(&config).context("Invalid band geometry")?;
    let regions = splitter.band_regions(&observations);

    let mut features = Vec::new();
    for region in &regions {
        let zones = region
            .train
            .iter()
            .map(|r| ("train", r))
            .chain(std::iter::once(("test", &region.test)))
            .chain(region.exclusion.iter().map(|r| ("buffer", r)));
        for (zone, rect) in zones {
            features.push(json!({
                "type": "Feature",
                "properties": { "band": region.index, "zone": zone },
                "geometry": { "type": "Polygon", "coordinates": rect_polygon(rect) },
            }));
        }
    }

    let collection = json!({ "type": "FeatureCollection", "features": features });
    let file = File::create(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &collection)
        .context("Failed to write GeoJSON")?;

    println!("Wrote {} bands to {}", regions.len(), output.display());
    Ok(())
}
