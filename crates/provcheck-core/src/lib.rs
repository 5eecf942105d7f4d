//! Client-side content integrity for a file browser.
//!
//! A verification request hashes a local file in bounded chunks
//! ([`hasher::ChunkedHasher`]) while fetching the server's provenance manifest
//! ([`provenance::ProvenanceClient`]), then compares the two
//! ([`verify::Verification`]). All network traffic goes through
//! [`http::HttpFetch`].

pub mod config;
pub mod logging;

pub mod control;
pub mod error;
pub mod format;
pub mod hasher;
pub mod http;
pub mod provenance;
pub mod source;
pub mod verify;

pub use control::{CancelToken, VerifyControl};
pub use error::VerifyError;
pub use hasher::{ChunkedHasher, DigestState};
pub use provenance::{ManifestOutcome, ManifestRecord, ProvenanceClient};
pub use source::{ByteSource, FileSource, MemorySource};
pub use verify::{Verification, VerificationResult, VerificationStatus, VerifyState};
