use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config;
use crate::domain::track::{Submission, SubmittedFile};
use crate::http::server::HttpServer;
use crate::service::TrackVault;

#[derive(Parser)]
#[command(name = "trackvault")]
#[command(version = "0.1")]
#[command(about = "Certifies audio tracks and keeps their certificates")]
pub struct Cli {
    /// Path to the config TOML file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run http server accepting submissions and serving certificates
    Serve,
    /// List certified tracks in creation order
    List {
        /// Owner key, every owner currently shares one scope
        #[arg(short, long)]
        owner: Option<String>,
    },
    /// Certify an audio file from disk
    Mint {
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        artist: Option<String>,
        /// Audio file to certify
        file: PathBuf,
    },
    /// Print the certificate url of a track
    Certificate { id: String },
    /// Check that a track's stored certificate matches its record
    Verify { id: String },
}

/// Entrypoint for CLI
pub fn run() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let cfg = config::Config::load(&cli.config)?;
    anyhow::ensure!(
        cfg.version == 1,
        "unsupported config version {}",
        cfg.version
    );

    match cli.command {
        Commands::Serve => {
            let vault = TrackVault::open(&cfg).context("Failed to open track vault")?;
            let http_server = HttpServer::new(vault, cfg.http);

            println!(
                "HTTP server running at http://{}:{}",
                http_server.config.bind_addr, http_server.config.port
            );
            http_server.run();
        }

        Commands::List { owner } => {
            let vault = TrackVault::open(&cfg).context("Failed to open track vault")?;

            for track in vault.list_tracks(owner.as_deref())? {
                println!("Track: {}", track.id);
                println!("  {} - {}", track.artist, track.title);
                println!(
                    "  file: {} ({}, {} bytes)",
                    track.file_meta.original_name, track.file_meta.mime_type, track.file_meta.size_bytes
                );
                println!("  fingerprint: {}", track.fingerprint);
                println!("  external ref: {}", track.external_ref);
                println!("  certified at: {}", track.created_at.to_rfc3339());
                println!("  certificate: {}", track.certificate_ref);
            }
        }

        Commands::Mint {
            title,
            artist,
            file,
        } => {
            let audio = std::fs::read(&file)
                .with_context(|| format!("Failed to read {}", file.to_string_lossy()))?;

            let submission = Submission {
                title,
                artist,
                file: Some(SubmittedFile {
                    original_name: file.file_name().map(|n| n.to_string_lossy().into_owned()),
                    mime_type: Some(
                        mime_guess::from_path(&file)
                            .first_or_octet_stream()
                            .to_string(),
                    ),
                    size_bytes: audio.len() as u64,
                }),
            };

            let vault = TrackVault::open(&cfg).context("Failed to open track vault")?;
            let track = vault.mint_track(&submission, &audio)?;

            println!("Certified track {}", track.id);
            println!("  fingerprint: {}", track.fingerprint);
            println!("  external ref: {}", track.external_ref);
            println!("  certificate: {}", track.certificate_ref);
        }

        Commands::Certificate { id } => {
            let vault = TrackVault::open(&cfg).context("Failed to open track vault")?;
            println!("{}", vault.get_certificate(&id)?);
        }

        Commands::Verify { id } => {
            let vault = TrackVault::open(&cfg).context("Failed to open track vault")?;
            let verification = vault.verify_certificate(&id)?;
            if verification.verified {
                println!("Certificate of track {} is valid (seal {})", verification.id, verification.seal);
            } else {
                anyhow::bail!(
                    "certificate of track {} does not match its record",
                    verification.id
                );
            }
        }
    }

    Ok(())
}
