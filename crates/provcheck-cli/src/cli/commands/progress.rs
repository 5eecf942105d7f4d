//! Background task that prints hash progress to stderr.

use std::time::{Duration, Instant};

use tokio::sync::watch;

const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

/// Prints the latest fraction at most every 500ms, then a final line once the
/// sender is dropped. Returns the last fraction published.
///
/// Intermediate values may be skipped; the final one never is.
pub(super) async fn print_progress(mut rx: watch::Receiver<f64>, total_bytes: u64) -> f64 {
    let started = Instant::now();
    let mut last_print: Option<Instant> = None;
    while rx.changed().await.is_ok() {
        let fraction = *rx.borrow_and_update();
        let now = Instant::now();
        if last_print.map_or(true, |t| now.duration_since(t) >= PROGRESS_INTERVAL) {
            eprint!("\r  {}", progress_line(fraction, total_bytes, started.elapsed()));
            last_print = Some(now);
        }
    }
    let last = *rx.borrow();
    eprintln!("\r  {}", progress_line(last, total_bytes, started.elapsed()));
    last
}

fn progress_line(fraction: f64, total_bytes: u64, elapsed: Duration) -> String {
    let total_mib = total_bytes as f64 / 1_048_576.0;
    let done_mib = total_mib * fraction;
    let secs = elapsed.as_secs_f64();
    let rate_mib = if secs > 0.0 { done_mib / secs } else { 0.0 };
    format!(
        "hashing {:.1} / {:.1} MiB ({:.1}%)  {:.2} MiB/s  ",
        done_mib,
        total_mib,
        fraction * 100.0,
        rate_mib
    )
}
