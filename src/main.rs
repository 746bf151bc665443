// src/main.rs

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use pkgstage::{Manifest, PackageMetadata, SetupPyInstaller, Stager, StagerConfig};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "pkgstage")]
#[command(author, version, about = "Fetch, verify and stage upstream sources into a package root", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, verify and install a package into a staging root
    Stage {
        /// Staging root to create (must not exist or be empty)
        dest: PathBuf,
        /// Recipe file (JSON); the built-in python-dmenuwrap recipe if omitted
        #[arg(short, long)]
        recipe: Option<PathBuf>,
        /// Python interpreter that runs setup.py
        #[arg(long, default_value = "python")]
        python: PathBuf,
        /// Bytecode optimization level (overrides the recipe)
        #[arg(short = 'O', long, value_parser = clap::value_parser!(u8).range(0..=2))]
        optimize: Option<u8>,
        /// Download timeout in seconds
        #[arg(short, long, default_value_t = 30)]
        timeout: u64,
        /// Parent directory for scratch extraction
        #[arg(long)]
        scratch: Option<PathBuf>,
        /// Write the staged file manifest (JSON) to this path
        #[arg(long)]
        manifest_out: Option<PathBuf>,
    },
    /// Print the validated recipe as JSON
    Show {
        /// Recipe file (JSON); the built-in python-dmenuwrap recipe if omitted
        #[arg(short, long)]
        recipe: Option<PathBuf>,
    },
    /// Fetch the source archive and check its checksum
    Verify {
        /// Recipe file (JSON); the built-in python-dmenuwrap recipe if omitted
        #[arg(short, long)]
        recipe: Option<PathBuf>,
        /// Download timeout in seconds
        #[arg(short, long, default_value_t = 30)]
        timeout: u64,
    },
    /// Print the manifest of an existing staging root
    Manifest {
        /// Staging root to scan
        root: PathBuf,
    },
    /// Generate shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },
}

/// Load a recipe file, or fall back to the built-in recipe
fn load_recipe(path: Option<&Path>) -> Result<PackageMetadata> {
    match path {
        Some(path) => PackageMetadata::from_json_file(path)
            .with_context(|| format!("Failed to load recipe {}", path.display())),
        None => {
            let recipe = PackageMetadata::dmenuwrap();
            recipe.validate()?;
            Ok(recipe)
        }
    }
}

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Stage {
            dest,
            recipe,
            python,
            optimize,
            timeout,
            scratch,
            manifest_out,
        }) => {
            let metadata = load_recipe(recipe.as_deref())?;
            info!("Staging {} into {}", metadata.name, dest.display());

            let config = StagerConfig {
                http_timeout: Duration::from_secs(timeout),
                scratch_dir: scratch,
                optimize,
            };
            let stager = Stager::new(config, SetupPyInstaller::new(python))?;
            let report = stager
                .run(&metadata, &dest)
                .with_context(|| format!("Failed to stage {}", metadata.name))?;

            if let Some(path) = manifest_out {
                std::fs::write(&path, report.manifest.to_json_pretty()?)
                    .with_context(|| format!("Failed to write manifest {}", path.display()))?;
            }

            println!("Staged {} {}", metadata.name, metadata.full_version());
            println!("  Root: {}", report.dest_root.display());
            println!("  Source: {} ({} bytes)", report.source_url, report.archive_size);
            println!("  Checksum: {}", report.checksum);
            println!(
                "  Files: {} ({} bytes)",
                report.manifest.files().count(),
                report.manifest.total_size()
            );
            println!("  License: {}", metadata.license_dest().display());

            Ok(())
        }
        Some(Commands::Show { recipe }) => {
            let metadata = load_recipe(recipe.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&metadata)?);
            Ok(())
        }
        Some(Commands::Verify { recipe, timeout }) => {
            let metadata = load_recipe(recipe.as_deref())?;
            let config = StagerConfig {
                http_timeout: Duration::from_secs(timeout),
                ..StagerConfig::default()
            };
            let stager = Stager::new(config, SetupPyInstaller::default())?;
            let archive = stager.verify_only(&metadata)?;

            println!("Verified {} ({} bytes)", archive.url(), archive.len());
            println!("  Checksum: {}", metadata.checksum);
            Ok(())
        }
        Some(Commands::Manifest { root }) => {
            let manifest = Manifest::scan(&root)
                .with_context(|| format!("Failed to scan {}", root.display()))?;
            println!("{}", manifest.to_json_pretty()?);
            Ok(())
        }
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(shell, &mut Cli::command(), "pkgstage", &mut std::io::stdout());
            Ok(())
        }
        None => {
            // No command provided, show help
            println!("pkgstage v{}", env!("CARGO_PKG_VERSION"));
            println!("Run 'pkgstage --help' for usage information");
            Ok(())
        }
    }
}
