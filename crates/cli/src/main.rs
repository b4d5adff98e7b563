mod manifest;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use patchwork_argparse::tokens;
use patchwork_merge::{Patch, merge_traced};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing_subscriber::{EnvFilter, fmt};

use crate::manifest::{DEFAULT_MANIFEST_NAME, ManifestSource};

#[derive(Parser)]
#[command(name = "patchwork")]
#[command(version, about = "Merge ordered attribute patches and tokenize --key=value arguments", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a patchwork.json manifest
    Init(InitArgs),

    /// Merge JSON patches in order; later patches win
    Merge(MergeArgs),

    /// Tokenize --key=value / --flag / positional arguments and print them as JSON
    ///
    /// `-h`/`--help` before a `--` are read by patchwork itself; put tokens after
    /// `--` to pass them through literally (e.g. `patchwork tokenize -- --help`).
    Tokenize(TokenizeArgs),
}

#[derive(Parser)]
struct InitArgs {
    /// Project directory (default: current directory)
    #[arg(value_name = "DIR")]
    dir: Option<PathBuf>,
}

#[derive(Parser)]
struct MergeArgs {
    /// Patch files (JSON objects), applied in the given order
    #[arg(value_name = "FILE")]
    patches: Vec<PathBuf>,

    /// Override applied after all files: KEY=VALUE
    #[arg(short, long = "set", value_name = "KEY=VALUE")]
    set: Vec<String>,

    /// Path to patchwork.json manifest
    #[arg(short, long, value_name = "FILE")]
    manifest: Option<PathBuf>,

    /// Print the merged record on one line
    #[arg(long)]
    compact: bool,

    /// Report which patch supplied each key (on stderr)
    #[arg(long)]
    explain: bool,
}

impl MergeArgs {
    /// `--manifest` if given, otherwise `patchwork.json` in the working directory.
    fn manifest_source(&self) -> Result<ManifestSource> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        Ok(match &self.manifest {
            Some(path) => ManifestSource::Explicit(cwd.join(path)),
            None => ManifestSource::Discovered(cwd.join(DEFAULT_MANIFEST_NAME)),
        })
    }
}

#[derive(Parser)]
struct TokenizeArgs {
    /// Tokens to tokenize; `-h`/`--help` are only passed through after `--`
    #[arg(value_name = "TOKEN", trailing_var_arg = true, allow_hyphen_values = true)]
    tokens: Vec<String>,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Init(args) => init(args),
        Commands::Merge(args) => merge_command(args),
        Commands::Tokenize(args) => tokenize_command(args),
    }
}

fn init(args: InitArgs) -> Result<()> {
    let dir = args.dir.unwrap_or_else(|| PathBuf::from("."));

    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create directory: {}", dir.display()))?;

    if dir.join(DEFAULT_MANIFEST_NAME).exists() {
        bail!("{DEFAULT_MANIFEST_NAME} already exists in {}", dir.display());
    }

    let manifest_path = manifest::write_default_manifest(&dir)?;

    eprintln!("Created: {}", manifest_path.display());
    eprintln!("\nNext steps:");
    eprintln!("  1. List base patch files under \"merge.patches\"");
    eprintln!("  2. Run: patchwork merge [FILE]... --set KEY=VALUE");

    Ok(())
}

fn merge_command(args: MergeArgs) -> Result<()> {
    tracing::debug!("executing merge command");

    let loaded = args.manifest_source()?.load()?;

    // (label, patch) in application order.
    let mut patches: Vec<(String, Patch)> = Vec::new();
    if let Some(loaded) = &loaded {
        for path in loaded.patch_paths() {
            let patch = read_patch(&path)?;
            patches.push((path.display().to_string(), patch));
        }
    }
    for path in &args.patches {
        let patch = read_patch(path)?;
        patches.push((path.display().to_string(), patch));
    }
    if !args.set.is_empty() {
        let patch = Patch::from_assignments(&args.set).context("invalid --set override")?;
        patches.push(("--set".to_string(), patch));
    }

    let traced = merge_traced(patches.iter().map(|(_, patch)| patch));

    if args.explain {
        for (key, index) in traced.sources() {
            eprintln!("{key} <- {}", patches[index].0);
        }
        for (index, (label, _)) in patches.iter().enumerate() {
            let overridden = traced.overridden_by(index);
            if !overridden.is_empty() {
                tracing::info!(patch = %label, keys = ?overridden, "patch overrides earlier values");
            }
        }
    }

    let compact = args.compact || loaded.as_ref().is_some_and(|m| m.compact());
    let record = traced.into_record();
    let out = if compact {
        serde_json::to_string(&record)?
    } else {
        serde_json::to_string_pretty(&record)?
    };
    println!("{out}");

    Ok(())
}

fn tokenize_command(args: TokenizeArgs) -> Result<()> {
    tracing::debug!("executing tokenize command");

    let parsed = tokens::parse(&args.tokens);
    let out = serde_json::to_string_pretty(&parsed).context("failed to render parsed arguments")?;
    println!("{out}");

    Ok(())
}

fn read_patch(path: &Path) -> Result<Patch> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read patch: {}", path.display()))?;
    Patch::from_json_str(&text).with_context(|| format!("failed to parse patch: {}", path.display()))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}
