//! `provcheck verify` – hash files and compare them with the server's manifests.

use anyhow::{Context, Result};
use provcheck_core::config::ProvcheckConfig;
use provcheck_core::format::{format_display, format_short};
use provcheck_core::{
    ByteSource, ChunkedHasher, FileSource, ProvenanceClient, Verification, VerificationResult,
    VerificationStatus, VerifyControl,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinSet;

use super::progress::print_progress;

/// Verifies every file concurrently, one request each, and returns the exit
/// code for the worst status.
pub async fn run_verify(
    cfg: &ProvcheckConfig,
    files: &[PathBuf],
    remote_path: Option<&str>,
    chunk_size: Option<usize>,
) -> Result<i32> {
    let chunk_size = chunk_size.unwrap_or(cfg.chunk_size_bytes);
    if chunk_size == 0 {
        anyhow::bail!("--chunk-size must be greater than 0");
    }
    if remote_path.is_some() && files.len() > 1 {
        anyhow::bail!("--remote-path can only be used with a single file");
    }
    let client = ProvenanceClient::from_config(cfg)?;

    // Every file is opened before any request is sent.
    let mut jobs = Vec::with_capacity(files.len());
    for file in files {
        let remote = match remote_path {
            Some(p) => p.to_string(),
            None => default_remote_path(file)?,
        };
        let source = FileSource::open(file)
            .await
            .with_context(|| format!("open {}", file.display()))?;
        jobs.push((file.clone(), remote, source));
    }

    let control = Arc::new(VerifyControl::new());
    let ctrl_c = tokio::spawn({
        let control = Arc::clone(&control);
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let n = control.cancel_all();
                tracing::info!(requests = n, "interrupt received, cancelling verification");
            }
        }
    });

    let show_progress = jobs.len() == 1;
    let mut printer = None;
    let mut set = JoinSet::new();
    for (id, (file, remote, source)) in jobs.into_iter().enumerate() {
        let id = id as u64;
        let progress_tx = if show_progress {
            let (tx, rx) = watch::channel(0.0);
            printer = Some(tokio::spawn(print_progress(rx, source.total_length())));
            Some(tx)
        } else {
            None
        };
        let verification = Verification::new(remote.clone())
            .with_hasher(ChunkedHasher::new(chunk_size))
            .with_cancel(control.register(id));
        let client = client.clone();
        let control = Arc::clone(&control);
        tracing::info!(file = %file.display(), remote = %remote, "verify");
        set.spawn(async move {
            let result = verification
                .run(&source, &client, move |p| {
                    if let Some(tx) = &progress_tx {
                        tx.send_replace(p);
                    }
                })
                .await;
            control.unregister(id);
            (id, file, remote, result)
        });
    }

    let mut done = Vec::with_capacity(set.len());
    while let Some(joined) = set.join_next().await {
        done.push(joined.context("verification task failed")?);
    }
    ctrl_c.abort();
    if let Some(printer) = printer {
        let _ = printer.await;
    }

    done.sort_by_key(|(id, ..)| *id);
    for (_, file, remote, result) in &done {
        print_result(file, remote, result);
    }
    Ok(combined_exit_code(done.iter().map(|(.., r)| r.status)))
}

/// `/` + file name, for files uploaded to the server root.
fn default_remote_path(file: &Path) -> Result<String> {
    let name = file
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("{} has no file name; pass --remote-path", file.display()))?;
    Ok(format!("/{}", name.to_string_lossy()))
}

fn print_result(file: &Path, remote: &str, result: &VerificationResult) {
    println!("file:     {}", file.display());
    println!("remote:   {}", remote);
    println!("status:   {}", result.status);
    println!("local:    {}", digest_line(result.local_digest.as_deref()));
    println!("manifest: {}", digest_line(result.remote_digest.as_deref()));
    if let Some(m) = &result.manifest {
        println!(
            "          type={} algorithm={} produced_at={}",
            m.kind,
            m.algorithm,
            m.produced_at.as_deref().unwrap_or("-")
        );
    }
    if let Some(e) = &result.error {
        println!("error:    {}", e);
    }
}

fn digest_line(digest: Option<&str>) -> String {
    let d = digest.unwrap_or("");
    format!("{}  {}", format_short(d), format_display(d))
}

/// 0 verified, 2 mismatched, 3 unavailable, 1 failed.
pub(crate) fn exit_code(status: VerificationStatus) -> i32 {
    match status {
        VerificationStatus::Verified => 0,
        VerificationStatus::Failed => 1,
        VerificationStatus::Mismatched => 2,
        VerificationStatus::Unavailable => 3,
    }
}

/// Worst status wins: failed, then mismatched, then unavailable.
fn combined_exit_code(statuses: impl IntoIterator<Item = VerificationStatus>) -> i32 {
    let rank = |s: VerificationStatus| match s {
        VerificationStatus::Verified => 0,
        VerificationStatus::Unavailable => 1,
        VerificationStatus::Mismatched => 2,
        VerificationStatus::Failed => 3,
    };
    statuses
        .into_iter()
        .max_by_key(|s| rank(*s))
        .map_or(0, exit_code)
}
