use serde::{Deserialize, Serialize};

/// Counters for one batch run.
///
/// Created once per run by the orchestrator, mutated only by its aggregation
/// task and handed off read-only in the final report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub total: u64,
    /// Documents whose pipeline produced a decision.
    pub checked: u64,
    pub head_unchanged: u64,
    pub size_change_detected: u64,
    /// Head-resolved documents whose size moved within the tolerance.
    pub cached_offset: u64,
    pub partial: u64,
    pub full_download: u64,
    pub changes_detected: u64,
    pub errors: u64,
    /// Bytes transferred by partial and full fetches.
    pub total_bytes: u64,
}

/// A fresh accumulator for a batch of `total` documents.
pub fn create_initial_stats(total: u64) -> RunStats {
    RunStats {
        total,
        ..RunStats::default()
    }
}

/// What one document's pipeline contributed to the run counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageTally {
    pub head_unchanged: bool,
    pub size_change_detected: bool,
    pub cached_offset: bool,
    pub partial: bool,
    pub full_download: bool,
    pub bytes: u64,
}

impl RunStats {
    /// Fold one document's tally into the run counters.
    pub fn record(&mut self, tally: &StageTally, decided: bool, changed: bool, failed: bool) {
        self.head_unchanged += u64::from(tally.head_unchanged);
        self.size_change_detected += u64::from(tally.size_change_detected);
        self.cached_offset += u64::from(tally.cached_offset);
        self.partial += u64::from(tally.partial);
        self.full_download += u64::from(tally.full_download);
        self.total_bytes += tally.bytes;
        self.checked += u64::from(decided);
        self.changes_detected += u64::from(changed);
        self.errors += u64::from(failed);
    }

    /// Documents that never reported an outcome.
    pub fn unaccounted(&self, reported: u64) -> u64 {
        self.total.saturating_sub(reported)
    }
}

/// Human-readable size: KB below one MiB, MB from there, one decimal.
pub fn format_bytes(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = 1024.0 * 1024.0;

    let bytes = bytes as f64;
    if bytes < MIB {
        format!("{:.1} KB", bytes / KIB)
    } else {
        format!("{:.1} MB", bytes / MIB)
    }
}
