use std::collections::BTreeSet;
use std::time::Duration;

use folio_protocol::ProgressSnapshot;
use tokio::time::Instant;

use crate::chunked::Chunk;

// ---------------------------------------------------------------------------
// SessionClock
// ---------------------------------------------------------------------------

/// Wall-clock time spent uploading, excluding paused intervals.
#[derive(Debug, Clone)]
pub struct SessionClock {
    started_at: Instant,
    paused_at: Option<Instant>,
    paused_total: Duration,
}

impl SessionClock {
    /// Starts a running clock.
    #[cfg(test)]
    pub fn start() -> Self {
        Self {
            started_at: Instant::now(),
            paused_at: None,
            paused_total: Duration::ZERO,
        }
    }

    /// Starts a clock that is already paused (resumed sessions).
    pub fn start_paused() -> Self {
        let now = Instant::now();
        Self {
            started_at: now,
            paused_at: Some(now),
            paused_total: Duration::ZERO,
        }
    }

    /// Stops counting. No-op if already paused.
    pub fn pause(&mut self) {
        if self.paused_at.is_none() {
            self.paused_at = Some(Instant::now());
        }
    }

    /// Resumes counting. No-op if running.
    pub fn resume(&mut self) {
        if let Some(at) = self.paused_at.take() {
            self.paused_total += at.elapsed();
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    /// Active time since start.
    pub fn elapsed(&self) -> Duration {
        let now = Instant::now();
        let pending_pause = self
            .paused_at
            .map(|at| now.duration_since(at))
            .unwrap_or_default();
        now.duration_since(self.started_at)
            .saturating_sub(self.paused_total + pending_pause)
    }
}

// ---------------------------------------------------------------------------
// ProgressAggregator
// ---------------------------------------------------------------------------

/// Derives [`ProgressSnapshot`]s from the set of confirmed chunk indices.
///
/// Holds only the chunk lengths of the plan; callers pass the confirmed set
/// and active elapsed time on every recomputation.
#[derive(Debug, Clone)]
pub struct ProgressAggregator {
    lengths: Vec<u64>,
    total_bytes: u64,
}

impl ProgressAggregator {
    pub fn new(chunks: &[Chunk]) -> Self {
        let lengths: Vec<u64> = chunks.iter().map(|c| c.length).collect();
        let total_bytes = lengths.iter().sum();
        Self {
            lengths,
            total_bytes,
        }
    }

    pub fn total_chunks(&self) -> u32 {
        self.lengths.len() as u32
    }

    /// Bytes covered by `uploaded`. Unknown indices are ignored.
    pub fn uploaded_bytes(&self, uploaded: &BTreeSet<u32>) -> u64 {
        uploaded
            .iter()
            .filter_map(|&i| self.lengths.get(i as usize))
            .sum()
    }

    /// Recomputes progress for the confirmed set after `elapsed` active time.
    pub fn snapshot(&self, uploaded: &BTreeSet<u32>, elapsed: Duration) -> ProgressSnapshot {
        let uploaded_bytes = self.uploaded_bytes(uploaded);
        let elapsed_secs = elapsed.as_secs_f64();
        let speed = if elapsed_secs > 0.0 {
            uploaded_bytes as f64 / elapsed_secs
        } else {
            0.0
        };
        let remaining_bytes = self.total_bytes.saturating_sub(uploaded_bytes);
        let remaining_seconds = if speed > 0.0 {
            remaining_bytes as f64 / speed
        } else {
            0.0
        };
        let percentage = if self.total_bytes > 0 {
            uploaded_bytes as f64 / self.total_bytes as f64 * 100.0
        } else {
            0.0
        };
        let confirmed = uploaded
            .iter()
            .filter(|&&i| (i as usize) < self.lengths.len())
            .count() as u32;

        ProgressSnapshot {
            uploaded_bytes,
            total_bytes: self.total_bytes,
            uploaded_chunks: confirmed,
            total_chunks: self.total_chunks(),
            percentage,
            speed_bytes_per_sec: speed,
            remaining_seconds,
            current_chunk: confirmed,
        }
    }
}
