//! `provcheck manifest` – show the manifest recorded for a resource path.

use anyhow::Result;
use provcheck_core::config::ProvcheckConfig;
use provcheck_core::format::format_display;
use provcheck_core::{ManifestOutcome, ProvenanceClient};

pub async fn run_manifest(cfg: &ProvcheckConfig, path: &str, raw: bool) -> Result<()> {
    let client = ProvenanceClient::from_config(cfg)?;
    if raw {
        println!("{}", client.fetch_manifest_text(path).await?);
        return Ok(());
    }
    match client.fetch_manifest(path).await? {
        ManifestOutcome::Absent => println!("no manifest recorded for {}", path),
        ManifestOutcome::Present(m) => {
            println!("{:<12} {}", "PATH", m.path);
            println!("{:<12} {}", "TYPE", m.kind);
            println!("{:<12} {}", "ALGORITHM", m.algorithm);
            println!("{:<12} {}", "HASH", format_display(&m.hex_digest));
            println!(
                "{:<12} {}",
                "PRODUCED",
                m.produced_at.as_deref().unwrap_or("-")
            );
            for (k, v) in &m.extra {
                println!("{:<12} {}", k, v);
            }
        }
    }
    Ok(())
}
