//! decoysh - simulated shell server
//!
//! Usage:
//!   decoysh                                  # Serve on 0.0.0.0:2323
//!   decoysh --config decoysh.toml --port 2222
//!   decoysh generate-fs --out scenarios/default/fs.json

mod auth;
mod config;
mod server;
mod shell;
mod telnet;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use decoysh_llm::FsGenOptions;
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use config::ServerConfig;

/// decoysh - Simulated shell for untrusted remote sessions
#[derive(Parser, Debug)]
#[command(name = "decoysh")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Listen port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Scenario bound to new sessions
    #[arg(long)]
    scenario: Option<String>,

    /// Directory holding scenario assets
    #[arg(long)]
    scenarios_root: Option<PathBuf>,

    #[command(subcommand)]
    subcommand: Option<SubCmd>,
}

#[derive(Subcommand, Debug)]
enum SubCmd {
    /// Run the server (default)
    Serve,
    /// Ask the primary LLM backend for a filesystem snapshot
    GenerateFs {
        /// Where to write the snapshot JSON
        #[arg(short, long)]
        out: PathBuf,

        #[arg(long)]
        seed: Option<u64>,

        #[arg(long, default_value_t = 200)]
        max_files: usize,

        #[arg(long, default_value_t = 4)]
        max_depth: usize,

        #[arg(long, default_value = "/home/user")]
        target_dir: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("decoysh=info".parse()?))
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    tracing::info!(version = %config.version, "configuration loaded");

    match args.subcommand {
        None | Some(SubCmd::Serve) => server::run(config).await,
        Some(SubCmd::GenerateFs {
            out,
            seed,
            max_files,
            max_depth,
            target_dir,
        }) => {
            let opts = FsGenOptions {
                seed,
                max_files,
                max_depth,
                target_dir,
            };
            generate_fs(&config, &opts, &out).await
        }
    }
}

fn load_config(args: &Args) -> Result<ServerConfig> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(host) = &args.host {
        config.server.host = host.clone();
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(scenario) = &args.scenario {
        config.server.scenario = scenario.clone();
    }
    if let Some(root) = &args.scenarios_root {
        config.paths.scenarios_root = root.clone();
    }
    Ok(config)
}

async fn generate_fs(config: &ServerConfig, opts: &FsGenOptions, out: &Path) -> Result<()> {
    let section = config
        .llm
        .primary
        .as_ref()
        .context("generate-fs needs [llm] primary in the config")?;
    let backend = decoysh_llm::create_backend(&section.kind, section.model.as_deref())
        .with_context(|| format!("creating {} backend", section.kind))?;

    let root = backend.generate_filesystem(opts).await;
    let json = serde_json::to_string_pretty(&root).context("serializing snapshot")?;

    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    tokio::fs::write(out, json)
        .await
        .with_context(|| format!("writing {}", out.display()))?;

    tracing::info!(
        path = %out.display(),
        entries = root.children.len(),
        "snapshot written"
    );
    Ok(())
}
