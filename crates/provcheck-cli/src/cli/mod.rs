//! CLI for provcheck: verify local files against server provenance manifests.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use provcheck_core::config::{self, ProvcheckConfig};
use std::path::PathBuf;

use commands::{run_hash, run_manifest, run_ping, run_verify};

/// Top-level CLI for provcheck.
#[derive(Debug, Parser)]
#[command(name = "provcheck")]
#[command(about = "provcheck: streaming file hashing and provenance verification", long_about = None)]
pub struct Cli {
    /// Use this config file instead of ~/.config/provcheck/config.toml.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override the file server base URL from config.
    #[arg(long, global = true, value_name = "URL")]
    pub server: Option<String>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Hash local files and compare them with the server's manifests.
    Verify {
        /// Local files to hash; each one is its own request.
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Resource path on the server (default: "/" + the file name). Single file only.
        #[arg(long, value_name = "PATH")]
        remote_path: Option<String>,
        /// Bytes per read (default from config).
        #[arg(long, value_name = "BYTES")]
        chunk_size: Option<usize>,
    },

    /// Compute SHA-256 of a local file.
    Hash {
        /// Local file to hash.
        file: PathBuf,
        /// Bytes per read (default from config).
        #[arg(long, value_name = "BYTES")]
        chunk_size: Option<usize>,
    },

    /// Show the manifest the server recorded for a resource path.
    Manifest {
        /// Resource path on the server.
        path: String,
        /// Print the response body as-is.
        #[arg(long)]
        raw: bool,
    },

    /// Check that the file server answers.
    Ping,
}

impl CliCommand {
    /// Parses args, runs the command, and returns the process exit code.
    pub async fn run_from_args() -> Result<i32> {
        let cli = Cli::parse();
        let cfg = load_config(&cli)?;
        tracing::debug!("loaded config: {:?}", cfg);

        let code = match cli.command {
            CliCommand::Verify {
                files,
                remote_path,
                chunk_size,
            } => run_verify(&cfg, &files, remote_path.as_deref(), chunk_size).await?,
            CliCommand::Hash { file, chunk_size } => {
                run_hash(&cfg, &file, chunk_size).await?;
                0
            }
            CliCommand::Manifest { path, raw } => {
                run_manifest(&cfg, &path, raw).await?;
                0
            }
            CliCommand::Ping => run_ping(&cfg).await?,
        };

        Ok(code)
    }
}

fn load_config(cli: &Cli) -> Result<ProvcheckConfig> {
    let mut cfg = match &cli.config {
        Some(path) => config::load_from(path)?,
        None => config::load_or_init()?,
    };
    if let Some(server) = &cli.server {
        cfg.server_url = server.clone();
    }
    Ok(cfg)
}

#[cfg(test)]
mod tests;
