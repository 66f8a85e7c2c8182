use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use stackwright::compose::{compose, ServiceManifest};
use stackwright::config;

#[derive(Parser)]
#[command(name = "stackwright")]
#[command(about = "Compose managed cloud resources into one deployable unit")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Synthesize a deployment description from a service manifest")]
    Synth {
        #[arg(help = "Path to the service manifest (YAML)")]
        manifest: PathBuf,

        #[arg(long, help = "Write the description to this file instead of stdout")]
        output: Option<PathBuf>,

        #[arg(
            long,
            conflicts_with = "output",
            help = "Write to <SYNTH_OUTPUT_DIR>/<service>.json instead of stdout"
        )]
        write: bool,
    },

    #[command(about = "Validate a service manifest by running a full composition and discarding the result")]
    Validate {
        #[arg(help = "Path to the service manifest (YAML)")]
        manifest: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    // Load .env if present so APP_ENV, SYNTH_* and LIMITS_* are picked up.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    let config = config::config();
    tracing::info!("Starting stackwright in {:?} mode", config.environment);

    let cli = Cli::parse();
    match cli.command {
        Commands::Synth {
            manifest,
            output,
            write,
        } => {
            let manifest = ServiceManifest::load(&manifest)?;
            let deployment = compose(&manifest.into_service_spec())?;

            let rendered = if config.synth.pretty_output {
                serde_json::to_string_pretty(&deployment)?
            } else {
                serde_json::to_string(&deployment)?
            };

            let output = if write {
                let dir = PathBuf::from(&config.synth.output_dir);
                std::fs::create_dir_all(&dir)
                    .with_context(|| format!("failed to create '{}'", dir.display()))?;
                Some(dir.join(format!("{}.json", deployment.service)))
            } else {
                output
            };

            match output {
                Some(path) => {
                    std::fs::write(&path, rendered)
                        .with_context(|| format!("failed to write '{}'", path.display()))?;
                    println!(
                        "synthesized {} resources for '{}' to {}",
                        deployment.resources.len(),
                        deployment.service,
                        path.display()
                    );
                }
                None => println!("{}", rendered),
            }
        }
        Commands::Validate { manifest } => {
            let manifest = ServiceManifest::load(&manifest)?;
            let deployment = compose(&manifest.into_service_spec())?;
            println!(
                "manifest ok: {} resources, {} routes",
                deployment.resources.len(),
                deployment.routes.len()
            );
        }
    }

    Ok(())
}
