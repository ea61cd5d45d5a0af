//! NDJSON progress events for background loads.
//!
//! Events go to stderr so stdout stays free for the consumer's own output.
//!
//! Event types:
//!   - load_started: source opened, header known
//!   - load_progress: every `progress_every` committed steps
//!   - load_complete / load_failed / load_cancelled: final state

use std::time::Duration;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LoadEvent {
    LoadStarted {
        source: String,
        natom: usize,
        ntime_hint: Option<usize>,
    },
    LoadProgress {
        ntime_avail: usize,
        ntime_hint: Option<usize>,
        progress_pct: Option<f64>,
        elapsed_ms: u64,
    },
    LoadComplete {
        ntime: usize,
        elapsed_ms: u64,
    },
    LoadFailed {
        ntime_avail: usize,
        code: String,
        message: String,
        elapsed_ms: u64,
    },
    LoadCancelled {
        ntime_avail: usize,
        elapsed_ms: u64,
    },
}

impl LoadEvent {
    pub fn progress(ntime_avail: usize, ntime_hint: Option<usize>, elapsed: Duration) -> Self {
        let progress_pct = ntime_hint
            .filter(|&n| n > 0)
            .map(|n| ntime_avail as f64 / n as f64 * 100.0);
        LoadEvent::LoadProgress {
            ntime_avail,
            ntime_hint,
            progress_pct,
            elapsed_ms: duration_ms(elapsed),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"event":"unknown"}"#.to_string())
    }
}

/// Writes events to stderr when enabled.
#[derive(Debug, Clone, Copy)]
pub struct LoadEmitter {
    enabled: bool,
}

impl LoadEmitter {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn disabled() -> Self {
        Self { enabled: false }
    }

    pub fn enabled() -> Self {
        Self { enabled: true }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn emit(&self, event: &LoadEvent) {
        if self.enabled {
            eprintln!("{}", event.to_json());
        }
    }
}

pub(crate) fn duration_ms(d: Duration) -> u64 {
    d.as_millis().try_into().unwrap_or(u64::MAX)
}
