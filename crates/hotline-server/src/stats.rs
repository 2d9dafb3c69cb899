//! Process-wide counters.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

/// Live server statistics
///
/// Increments are atomic; the peak-tracking path takes a small lock so the
/// compare-and-update stays consistent.
#[derive(Debug)]
pub struct Stats {
    start_time: SystemTime,
    connected: AtomicU64,
    downloads_in_progress: AtomicU64,
    uploads_in_progress: AtomicU64,
    cumulative_connections: AtomicU64,
    cumulative_downloads: AtomicU64,
    cumulative_uploads: AtomicU64,
    peak_connected: Mutex<u64>,
}

/// A consistent point-in-time copy
#[derive(Debug, Clone, Copy)]
pub struct StatsSnapshot {
    /// Process start time
    pub start_time: SystemTime,
    /// Sessions connected right now
    pub connected: u64,
    /// Downloads running right now
    pub downloads_in_progress: u64,
    /// Uploads running right now
    pub uploads_in_progress: u64,
    /// Connections since start
    pub cumulative_connections: u64,
    /// Downloads since start
    pub cumulative_downloads: u64,
    /// Uploads since start
    pub cumulative_uploads: u64,
    /// Highest simultaneous connection count seen
    pub peak_connected: u64,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            start_time: SystemTime::now(),
            connected: AtomicU64::new(0),
            downloads_in_progress: AtomicU64::new(0),
            uploads_in_progress: AtomicU64::new(0),
            cumulative_connections: AtomicU64::new(0),
            cumulative_downloads: AtomicU64::new(0),
            cumulative_uploads: AtomicU64::new(0),
            peak_connected: Mutex::new(0),
        }
    }
}

impl Stats {
    /// Fresh counters, stamped now
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a session connecting
    pub fn session_connected(&self) {
        let now = self.connected.fetch_add(1, Ordering::Relaxed) + 1;
        self.cumulative_connections.fetch_add(1, Ordering::Relaxed);
        let mut peak = self.peak_connected.lock().expect("stats lock");
        if now > *peak {
            *peak = now;
        }
    }

    /// Record a session disconnecting
    pub fn session_disconnected(&self) {
        self.connected.fetch_sub(1, Ordering::Relaxed);
    }

    /// Record a download starting
    pub fn download_started(&self) {
        self.downloads_in_progress.fetch_add(1, Ordering::Relaxed);
        self.cumulative_downloads.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a download ending (complete or not)
    pub fn download_finished(&self) {
        self.downloads_in_progress.fetch_sub(1, Ordering::Relaxed);
    }

    /// Record an upload starting
    pub fn upload_started(&self) {
        self.uploads_in_progress.fetch_add(1, Ordering::Relaxed);
        self.cumulative_uploads.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an upload ending (complete or not)
    pub fn upload_finished(&self) {
        self.uploads_in_progress.fetch_sub(1, Ordering::Relaxed);
    }

    /// Sessions connected right now
    #[must_use]
    pub fn connected(&self) -> u64 {
        self.connected.load(Ordering::Relaxed)
    }

    /// Transfers running right now
    #[must_use]
    pub fn transfers_in_progress(&self) -> u64 {
        self.downloads_in_progress.load(Ordering::Relaxed)
            + self.uploads_in_progress.load(Ordering::Relaxed)
    }

    /// Point-in-time copy of every counter
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            start_time: self.start_time,
            connected: self.connected.load(Ordering::Relaxed),
            downloads_in_progress: self.downloads_in_progress.load(Ordering::Relaxed),
            uploads_in_progress: self.uploads_in_progress.load(Ordering::Relaxed),
            cumulative_connections: self.cumulative_connections.load(Ordering::Relaxed),
            cumulative_downloads: self.cumulative_downloads.load(Ordering::Relaxed),
            cumulative_uploads: self.cumulative_uploads.load(Ordering::Relaxed),
            peak_connected: *self.peak_connected.lock().expect("stats lock"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_disconnect_and_peak() {
        let stats = Stats::new();
        stats.session_connected();
        stats.session_connected();
        stats.session_disconnected();
        stats.session_connected();

        let snap = stats.snapshot();
        assert_eq!(snap.connected, 2);
        assert_eq!(snap.cumulative_connections, 3);
        assert_eq!(snap.peak_connected, 2);
    }

    #[test]
    fn test_transfer_counters() {
        let stats = Stats::new();
        stats.download_started();
        stats.upload_started();
        stats.upload_started();
        stats.upload_finished();

        assert_eq!(stats.transfers_in_progress(), 2);
        let snap = stats.snapshot();
        assert_eq!(snap.cumulative_downloads, 1);
        assert_eq!(snap.cumulative_uploads, 2);
    }
}
