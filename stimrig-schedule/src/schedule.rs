use std::fmt::Write as _;

use stimrig_core::Stimulus;

/// One scheduled entry: a stimulus to dispatch, or a marker naming the
/// block that begins at this offset. Markers are logged, never dispatched.
#[derive(Debug, Clone)]
pub enum ScheduleEntry {
    Marker(String),
    Stimulus(Stimulus),
}

/// The compiled, time-ordered plan for an entire run: events with their
/// millisecond offsets, block boundaries, and the declared total duration.
/// Immutable once built.
#[derive(Debug)]
pub struct Schedule {
    events: Vec<(u64, ScheduleEntry)>,
    block_positions: Vec<(u64, String)>,
    total_ms: u64,
}

impl Schedule {
    pub(crate) fn new(
        events: Vec<(u64, ScheduleEntry)>,
        block_positions: Vec<(u64, String)>,
        total_ms: u64,
    ) -> Self {
        Self {
            events,
            block_positions,
            total_ms,
        }
    }

    /// Events in insertion order; one stimulus's entries are sorted among
    /// themselves but separate appends interleave. The runner re-sorts.
    pub fn events(&self) -> &[(u64, ScheduleEntry)] {
        &self.events
    }

    pub fn block_positions(&self) -> &[(u64, String)] {
        &self.block_positions
    }

    pub fn total_ms(&self) -> u64 {
        self.total_ms
    }

    /// Number of true stimulus events, markers excluded.
    pub fn event_count(&self) -> usize {
        self.events
            .iter()
            .filter(|(_, e)| matches!(e, ScheduleEntry::Stimulus(_)))
            .count()
    }

    /// Tabular listing of every stimulus event.
    pub fn render_events(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:<8}{:<20}{:<8}{:<12}",
            "ms", "stimulus", "value", "duration(ms)"
        );
        let _ = writeln!(out, "{}", "-".repeat(48));
        for (ms, entry) in &self.events {
            let ScheduleEntry::Stimulus(stimulus) = entry else {
                continue;
            };
            let duration = stimulus
                .clip()
                .and_then(|c| c.duration_ms())
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string());
            let _ = writeln!(
                out,
                "{:<8}{:<20}{:<8}{:<12}",
                ms,
                stimulus.key().name(),
                stimulus.effective_intensity(),
                duration
            );
        }
        out
    }

    /// Tabular listing of block boundaries with lengths in H:MM:SS. A
    /// block's length runs to the next block's start, the last to the total.
    pub fn render_blocks(&self) -> String {
        let mut positions = self.block_positions.clone();
        positions.sort_by_key(|(ms, _)| *ms);

        let mut out = String::new();
        let _ = writeln!(out, "{:<20}{:<10}{:<10}", "block", "start", "length");
        let _ = writeln!(out, "{}", "-".repeat(40));
        for (i, (start, name)) in positions.iter().enumerate() {
            let end = positions
                .get(i + 1)
                .map(|(next, _)| *next)
                .unwrap_or(self.total_ms);
            let _ = writeln!(
                out,
                "{:<20}{:<10}{:<10}",
                name,
                fmt_hms(*start),
                fmt_hms(end.saturating_sub(*start))
            );
        }
        out
    }
}

/// Milliseconds as H:MM:SS, rounded to the nearest second.
fn fmt_hms(ms: u64) -> String {
    let total_seconds = (ms + 500) / 1000;
    format!(
        "{}:{:02}:{:02}",
        total_seconds / 3600,
        (total_seconds % 3600) / 60,
        total_seconds % 60
    )
}
