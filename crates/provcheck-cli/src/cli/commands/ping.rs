//! `provcheck ping` – check that the file server answers.

use anyhow::Result;
use provcheck_core::config::ProvcheckConfig;
use provcheck_core::ProvenanceClient;

/// Exit code 0 if the server root answers 2xx, 1 if it answers anything else.
/// No answer at all is an error.
pub async fn run_ping(cfg: &ProvcheckConfig) -> Result<i32> {
    let client = ProvenanceClient::from_config(cfg)?;
    let url = client.base_url().clone();
    if client.http().fetch_status(url.as_str()).await? {
        println!("{} is reachable", url);
        Ok(0)
    } else {
        println!("{} answered with an error status", url);
        Ok(1)
    }
}
