//! Streaming SHA-256 over a `ByteSource`.
//!
//! Chunks are fed into a live hash context as they arrive, so working memory
//! is bounded by the chunk size rather than the file size. Progress is
//! reported after every chunk; cancellation is checked before each read and
//! raced against the read while it is pending.

use sha2::{Digest, Sha256};

use crate::control::CancelToken;
use crate::error::VerifyError;
use crate::source::ByteSource;

pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Running hash plus byte accounting for one hashing pass.
///
/// `bytes_processed` never decreases and never exceeds `total_length`.
pub struct DigestState {
    hasher: Sha256,
    bytes_processed: u64,
    total_length: u64,
}

impl DigestState {
    pub fn new(total_length: u64) -> Self {
        Self {
            hasher: Sha256::new(),
            bytes_processed: 0,
            total_length,
        }
    }

    pub fn bytes_processed(&self) -> u64 {
        self.bytes_processed
    }

    pub fn total_length(&self) -> u64 {
        self.total_length
    }

    pub fn is_complete(&self) -> bool {
        self.bytes_processed == self.total_length
    }

    /// Fraction done in [0.0, 1.0]. Exactly 1.0 once complete, including for empty input.
    pub fn progress(&self) -> f64 {
        if self.is_complete() {
            return 1.0;
        }
        (self.bytes_processed as f64 / self.total_length as f64).min(1.0)
    }

    fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
        self.bytes_processed += chunk.len() as u64;
    }

    /// Lowercase hex digest. Consumes the state.
    fn finalize_hex(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

/// Reads a `ByteSource` in fixed-size chunks and produces its SHA-256.
#[derive(Debug, Clone, Copy)]
pub struct ChunkedHasher {
    chunk_size: usize,
}

impl Default for ChunkedHasher {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ChunkedHasher {
    pub fn new(chunk_size: usize) -> Self {
        Self { chunk_size }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Hash the whole source without progress or cancellation.
    pub async fn read_all<S: ByteSource>(&self, source: &S) -> Result<String, VerifyError> {
        self.read_all_with(source, |_| {}, None).await
    }

    /// Hash the whole source, calling `on_progress` after every chunk.
    ///
    /// Returns the lowercase hex digest. On read failure or cancellation the
    /// partial state is dropped and no digest is returned.
    pub async fn read_all_with<S, P>(
        &self,
        source: &S,
        mut on_progress: P,
        cancel: Option<&CancelToken>,
    ) -> Result<String, VerifyError>
    where
        S: ByteSource,
        P: FnMut(f64),
    {
        if self.chunk_size == 0 {
            return Err(VerifyError::InvalidChunkSize(0));
        }
        let total = source.total_length();
        let mut state = DigestState::new(total);

        while !state.is_complete() {
            let offset = state.bytes_processed();
            let want = (total - offset).min(self.chunk_size as u64) as usize;
            let chunk = read_chunk(source, offset, want, cancel).await?;
            // Short reads are fine; an empty or oversized one means the source lied about its length.
            if chunk.is_empty() || chunk.len() > want {
                tracing::debug!(offset, want, got = chunk.len(), "byte source returned wrong length");
                return Err(VerifyError::short_read(offset));
            }
            state.update(&chunk);
            on_progress(state.progress());
        }

        if total == 0 {
            if cancel.is_some_and(CancelToken::is_cancelled) {
                return Err(VerifyError::Cancelled);
            }
            on_progress(state.progress());
        }

        Ok(state.finalize_hex())
    }
}

async fn read_chunk<S: ByteSource>(
    source: &S,
    offset: u64,
    len: usize,
    cancel: Option<&CancelToken>,
) -> Result<Vec<u8>, VerifyError> {
    let read = source.read(offset, len);
    let result = match cancel {
        None => read.await,
        Some(token) => {
            if token.is_cancelled() {
                return Err(VerifyError::Cancelled);
            }
            tokio::select! {
                biased;
                _ = token.cancelled() => return Err(VerifyError::Cancelled),
                r = read => r,
            }
        }
    };
    result.map_err(|e| {
        tracing::debug!(offset, error = %e, "chunk read failed");
        VerifyError::read_at(offset, e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;
    use std::future::Future;
    use std::io;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::time::Duration;

    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    fn reference(data: &[u8]) -> String {
        hex::encode(Sha256::digest(data))
    }

    fn sample(len: usize) -> Vec<u8> {
        (0u8..251).cycle().take(len).collect()
    }

    /// Wraps a source and counts reads, bytes, and overlaps.
    struct Counting {
        inner: MemorySource,
        reads: AtomicUsize,
        bytes: AtomicU64,
        next_offset: AtomicU64,
        max_len: AtomicUsize,
    }

    impl Counting {
        fn new(data: Vec<u8>) -> Self {
            Self {
                inner: MemorySource::new(data),
                reads: AtomicUsize::new(0),
                bytes: AtomicU64::new(0),
                next_offset: AtomicU64::new(0),
                max_len: AtomicUsize::new(0),
            }
        }
    }

    impl ByteSource for Counting {
        fn total_length(&self) -> u64 {
            self.inner.total_length()
        }

        fn read(&self, offset: u64, len: usize) -> impl Future<Output = io::Result<Vec<u8>>> + Send {
            async move {
                assert_eq!(
                    offset,
                    self.next_offset.load(Ordering::SeqCst),
                    "reads must be sequential and non-overlapping"
                );
                let chunk = self.inner.read(offset, len).await?;
                self.reads.fetch_add(1, Ordering::SeqCst);
                self.bytes.fetch_add(chunk.len() as u64, Ordering::SeqCst);
                self.next_offset
                    .store(offset + chunk.len() as u64, Ordering::SeqCst);
                self.max_len.fetch_max(len, Ordering::SeqCst);
                Ok(chunk)
            }
        }
    }

    /// Fails every read at or past `fail_at`.
    struct Faulty {
        inner: MemorySource,
        fail_at: u64,
    }

    impl ByteSource for Faulty {
        fn total_length(&self) -> u64 {
            self.inner.total_length()
        }

        fn read(&self, offset: u64, len: usize) -> impl Future<Output = io::Result<Vec<u8>>> + Send {
            let fail = offset >= self.fail_at;
            let inner = self.inner.clone();
            async move {
                if fail {
                    return Err(io::Error::new(io::ErrorKind::Other, "disk gone"));
                }
                inner.read(offset, len).await
            }
        }
    }

    /// Claims more bytes than it can deliver.
    struct Truncated {
        inner: MemorySource,
        claimed: u64,
    }

    impl ByteSource for Truncated {
        fn total_length(&self) -> u64 {
            self.claimed
        }

        fn read(&self, offset: u64, len: usize) -> impl Future<Output = io::Result<Vec<u8>>> + Send {
            self.inner.read(offset, len)
        }
    }

    /// Hands back one extra byte on the read at `pad_at`.
    struct Oversized {
        inner: MemorySource,
        pad_at: u64,
    }

    impl ByteSource for Oversized {
        fn total_length(&self) -> u64 {
            self.inner.total_length()
        }

        fn read(&self, offset: u64, len: usize) -> impl Future<Output = io::Result<Vec<u8>>> + Send {
            let pad = offset == self.pad_at;
            let inner = self.inner.clone();
            async move {
                let mut chunk = inner.read(offset, len).await?;
                if pad {
                    chunk.push(0xff);
                }
                Ok(chunk)
            }
        }
    }

    /// Each read sleeps so a cancel can land while it is pending.
    struct Slow {
        inner: MemorySource,
        delay: Duration,
    }

    impl ByteSource for Slow {
        fn total_length(&self) -> u64 {
            self.inner.total_length()
        }

        fn read(&self, offset: u64, len: usize) -> impl Future<Output = io::Result<Vec<u8>>> + Send {
            let inner = self.inner.clone();
            let delay = self.delay;
            async move {
                tokio::time::sleep(delay).await;
                inner.read(offset, len).await
            }
        }
    }

    #[tokio::test]
    async fn digest_matches_reference_across_chunk_sizes() {
        for len in [1usize, 63, 64, 65, 1000, 200_003] {
            let data = sample(len);
            for chunk in [1usize, 7, 64, 4096, DEFAULT_CHUNK_SIZE, len + 10] {
                if chunk == 1 && len > 1000 {
                    continue;
                }
                let src = Counting::new(data.clone());
                let digest = ChunkedHasher::new(chunk).read_all(&src).await.unwrap();
                assert_eq!(digest, reference(&data), "len={len} chunk={chunk}");
                assert_eq!(src.bytes.load(Ordering::SeqCst), len as u64);
                assert_eq!(src.reads.load(Ordering::SeqCst), len.div_ceil(chunk));
                assert!(src.max_len.load(Ordering::SeqCst) <= chunk);
            }
        }
    }

    #[tokio::test]
    async fn progress_is_monotonic_and_ends_at_one() {
        let src = MemorySource::new(sample(300_000));
        let mut seen = Vec::new();
        ChunkedHasher::new(65536)
            .read_all_with(&src, |p| seen.push(p), None)
            .await
            .unwrap();
        assert_eq!(seen.len(), 5);
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert!(seen.iter().all(|p| (0.0..=1.0).contains(p)));
        assert_eq!(*seen.last().unwrap(), 1.0);
    }

    #[tokio::test]
    async fn empty_source_reports_once() {
        let src = Counting::new(Vec::new());
        let mut seen = Vec::new();
        let digest = ChunkedHasher::default()
            .read_all_with(&src, |p| seen.push(p), None)
            .await
            .unwrap();
        assert_eq!(digest, EMPTY_SHA256);
        assert_eq!(seen, vec![1.0]);
        assert_eq!(src.reads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn read_fault_reports_offset() {
        let src = Faulty {
            inner: MemorySource::new(sample(10_000)),
            fail_at: 4096,
        };
        let mut seen = Vec::new();
        let err = ChunkedHasher::new(1024)
            .read_all_with(&src, |p| seen.push(p), None)
            .await
            .unwrap_err();
        assert!(matches!(err, VerifyError::Read { offset: 4096, source: Some(_) }));
        assert_eq!(seen.len(), 4);
        assert!(seen.iter().all(|p| *p < 1.0));
    }

    #[tokio::test]
    async fn short_source_is_a_read_error() {
        let src = Truncated {
            inner: MemorySource::new(sample(1500)),
            claimed: 4000,
        };
        let err = ChunkedHasher::new(1000).read_all(&src).await.unwrap_err();
        assert!(matches!(err, VerifyError::Read { offset: 1500, source: None }));
    }

    #[tokio::test]
    async fn oversized_read_is_a_read_error() {
        let src = Oversized {
            inner: MemorySource::new(sample(3000)),
            pad_at: 2048,
        };
        let mut seen = Vec::new();
        let res = ChunkedHasher::new(1024)
            .read_all_with(&src, |p| seen.push(p), None)
            .await;
        assert!(matches!(res, Err(VerifyError::Read { offset: 2048, source: None })));
        // Two good chunks were counted; the padded one never was.
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().all(|p| *p < 1.0));
    }

    #[tokio::test]
    async fn oversized_final_read_yields_no_digest() {
        let src = Oversized {
            inner: MemorySource::new(sample(100)),
            pad_at: 0,
        };
        let res = ChunkedHasher::new(4096).read_all(&src).await;
        assert!(matches!(res, Err(VerifyError::Read { offset: 0, source: None })));
    }

    #[tokio::test]
    async fn zero_chunk_size_rejected() {
        let src = MemorySource::new(sample(10));
        let err = ChunkedHasher::new(0).read_all(&src).await.unwrap_err();
        assert!(matches!(err, VerifyError::InvalidChunkSize(0)));
    }

    #[tokio::test]
    async fn cancel_before_start_reads_nothing() {
        let src = Counting::new(sample(10_000));
        let token = CancelToken::new();
        token.cancel();
        let err = ChunkedHasher::new(1024)
            .read_all_with(&src, |_| {}, Some(&token))
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(src.reads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancel_on_empty_source_yields_no_digest() {
        let src = MemorySource::new(Vec::new());
        let token = CancelToken::new();
        token.cancel();
        let mut calls = 0;
        let err = ChunkedHasher::default()
            .read_all_with(&src, |_| calls += 1, Some(&token))
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(calls, 0);
    }

    #[tokio::test]
    async fn cancel_mid_hash_aborts_pending_read() {
        let src = Slow {
            inner: MemorySource::new(sample(64 * 1024)),
            delay: Duration::from_millis(50),
        };
        let token = CancelToken::new();
        let canceller = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(120)).await;
                token.cancel();
            })
        };
        let mut seen = Vec::new();
        let res = tokio::time::timeout(
            Duration::from_secs(5),
            ChunkedHasher::new(1024).read_all_with(&src, |p| seen.push(p), Some(&token)),
        )
        .await
        .expect("cancel should end hashing promptly");
        canceller.await.unwrap();
        assert!(res.unwrap_err().is_cancelled());
        assert!(!seen.is_empty());
        assert!(*seen.last().unwrap() < 1.0);
    }

    #[test]
    fn digest_state_progress() {
        let mut st = DigestState::new(0);
        assert!(st.is_complete());
        assert_eq!(st.progress(), 1.0);

        st = DigestState::new(4);
        assert_eq!(st.progress(), 0.0);
        st.update(b"ab");
        assert_eq!(st.bytes_processed(), 2);
        assert_eq!(st.progress(), 0.5);
        st.update(b"cd");
        assert_eq!(st.progress(), 1.0);
        assert_eq!(st.finalize_hex(), reference(b"abcd"));
    }
}
