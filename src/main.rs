use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};

use basic_cleaning::cleaning::dates::DatePolicy;
use basic_cleaning::config::{RawRunArgs, RunConfig, Settings};
use basic_cleaning::{logging, metrics, BasicCleaningUseCase, LocalRegistry};

#[derive(Parser)]
#[command(name = "basic_cleaning")]
#[command(about = "Clean a raw listings artifact and publish the result as a new version")]
#[command(version)]
struct Cli {
    /// Settings file (TOML)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,
    /// Registry root directory, overrides the settings file
    #[arg(long, global = true)]
    registry: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the basic cleaning step
    Clean {
        /// Input artifact reference, e.g. sample.csv or sample.csv:v2
        input_artifact: String,
        /// Name of the output artifact
        output_artifact: String,
        /// Type of the output artifact
        output_type: String,
        /// Description of the output artifact
        output_description: String,
        /// Minimum price to keep (inclusive)
        #[arg(allow_hyphen_values = true)]
        min_price: String,
        /// Maximum price to keep (inclusive)
        #[arg(allow_hyphen_values = true)]
        max_price: String,
        /// Replace unparseable last_review values with empty cells instead of failing
        #[arg(long)]
        coerce_dates: bool,
    },
    /// Publish a local file as a new artifact version
    Ingest {
        file: PathBuf,
        name: String,
        artifact_type: String,
        description: String,
    },
    /// List the versions of an artifact and their lineage
    Versions { name: String },
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.settings.as_deref()).context("Failed to load settings")?;
    if let Some(root) = cli.registry {
        settings.registry_root = root;
    }

    let _guard = logging::init_logging(&settings.log_dir);
    if settings.metrics_textfile.is_some() {
        metrics::install_recorder();
    }

    let result = run_command(cli.command, &mut settings);

    if let Some(path) = &settings.metrics_textfile {
        if let Err(e) = metrics::write_textfile(path) {
            warn!("Failed to write metrics to {}: {}", path.display(), e);
        }
    }
    result
}

fn run_command(command: Commands, settings: &mut Settings) -> Result<()> {
    match command {
        Commands::Clean {
            input_artifact,
            output_artifact,
            output_type,
            output_description,
            min_price,
            max_price,
            coerce_dates,
        } => {
            if coerce_dates {
                settings.date_policy = DatePolicy::Coerce;
            }
            let raw = RawRunArgs {
                input_artifact,
                output_artifact,
                output_type,
                output_description,
                min_price,
                max_price,
            };
            let config = RunConfig::from_raw(&raw, settings).context("Invalid run parameters")?;

            let registry = open_registry(settings)?;
            let use_case = BasicCleaningUseCase::new(Box::new(registry));
            let report = use_case
                .run(&config)
                .with_context(|| format!("Cleaning {} failed", config.input))?;

            println!("\n📊 Cleaning results for {}:", report.input);
            println!("   Input rows: {}", report.summary.input_rows);
            println!("   After price filter: {}", report.summary.after_price);
            println!(
                "   After geo filter: {}{}",
                report.summary.output_rows,
                if report.summary.geo_applied { "" } else { " (skipped, no coordinates)" }
            );
            if report.summary.dates_coerced > 0 {
                println!("   Dates coerced to empty: {}", report.summary.dates_coerced);
            }
            println!(
                "   Published: {}{}",
                report.output.id,
                if report.output.deduplicated { " (unchanged)" } else { "" }
            );
        }
        Commands::Ingest {
            file,
            name,
            artifact_type,
            description,
        } => {
            let registry = open_registry(settings)?;
            let version = registry
                .ingest(&file, &name, &artifact_type, &description)
                .with_context(|| format!("Failed to ingest {}", file.display()))?;
            info!(artifact = %version.id, "ingested");
            println!("✅ Ingested {} as {}", file.display(), version.id);
        }
        Commands::Versions { name } => {
            let registry = open_registry(settings)?;
            let versions = registry.versions(&name)?;
            if versions.is_empty() {
                println!("No versions of {}", name);
            }
            for (row, lineage) in versions {
                let inputs: Vec<String> = lineage.iter().map(|id| id.to_string()).collect();
                println!(
                    "{}  type={}  rows={}  sha256={}  created={}{}",
                    row.id,
                    row.artifact_type,
                    row.row_count,
                    &row.sha256[..12.min(row.sha256.len())],
                    row.created_at,
                    if inputs.is_empty() {
                        String::new()
                    } else {
                        format!("  from={}", inputs.join(","))
                    }
                );
            }
        }
    }
    Ok(())
}

fn open_registry(settings: &Settings) -> Result<LocalRegistry> {
    LocalRegistry::open(settings.registry_root.clone()).with_context(|| {
        format!(
            "Failed to open registry at {}",
            settings.registry_root.display()
        )
    })
}
