use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::debug;
use thiserror::Error;

use stimrig_core::Stimulus;

/// Stamp format shared with the sensor and camera logs so rows align
/// exactly across files.
pub const STAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

#[derive(Debug, Error)]
pub enum TimeLogError {
    #[error("the time log was never started")]
    NotStarted,
    #[error("the time log was never finished")]
    NotFinished,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// What was dispatched and the wall-clock instant it went out.
#[derive(Debug, Clone)]
pub struct StimulusTimeRecord {
    stimulus: Stimulus,
    timestamp: DateTime<Utc>,
}

impl StimulusTimeRecord {
    pub fn new(stimulus: Stimulus, timestamp: DateTime<Utc>) -> Self {
        Self { stimulus, timestamp }
    }

    pub fn stimulus(&self) -> &Stimulus {
        &self.stimulus
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// The ordered record of one run. Bounds are set exactly once each: the
/// runner starts the log before the first event and finishes it once after
/// the last; a second start or finish is a bug in the calling loop.
#[derive(Debug, Default)]
pub struct StimulusTimeLog {
    records: Vec<StimulusTimeRecord>,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    overrun: Option<Duration>,
}

impl StimulusTimeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        assert!(self.start_time.is_none(), "time log already started");
        self.start_time = Some(Utc::now());
    }

    pub fn append(&mut self, record: StimulusTimeRecord) {
        self.records.push(record);
    }

    pub fn finish_now(&mut self) {
        self.finish_future(Utc::now());
    }

    /// Sets the end bound to a computed instant, typically the theoretical
    /// end of the schedule rather than when the last event fired.
    pub fn finish_future(&mut self, at: DateTime<Utc>) {
        assert!(self.end_time.is_none(), "time log already finished");
        self.end_time = Some(at);
    }

    pub fn records(&self) -> &[StimulusTimeRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    /// How late the dispatch loop finished, if it overran the schedule.
    pub fn overrun(&self) -> Option<Duration> {
        self.overrun
    }

    pub(crate) fn set_overrun(&mut self, overrun: Duration) {
        self.overrun = Some(overrun);
    }

    /// Writes the run as CSV: a header, a synthetic zero row at the start
    /// bound, one row per record, and a synthetic zero row at the end bound.
    pub fn write(&self, path: &Path) -> Result<(), TimeLogError> {
        let start = self.start_time.ok_or(TimeLogError::NotStarted)?;
        let end = self.end_time.ok_or(TimeLogError::NotFinished)?;
        debug!("writing {} stimulus times to {}", self.records.len(), path.display());

        let mut out = String::new();
        out.push_str("datetime,id,intensity\n");
        let _ = writeln!(out, "{},0,0", stamp(start));
        for record in &self.records {
            let _ = writeln!(
                out,
                "{},{},{}",
                stamp(record.timestamp()),
                record.stimulus().key().id(),
                record.stimulus().effective_intensity()
            );
        }
        let _ = writeln!(out, "{},0,0", stamp(end));
        fs::write(path, out)?;
        Ok(())
    }
}

pub fn stamp(at: DateTime<Utc>) -> String {
    at.format(STAMP_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use stimrig_core::{StimulusKey, StimulusKind};

    fn record(id: u32, value: u8) -> StimulusTimeRecord {
        let stimulus = Stimulus::output(StimulusKey::new(id, "led"), StimulusKind::Digital, value);
        StimulusTimeRecord::new(stimulus, Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 1).unwrap())
    }

    #[test]
    fn stamp_has_microsecond_precision() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 1).unwrap()
            + chrono::Duration::microseconds(250);
        assert_eq!(stamp(at), "2026-03-01T12:00:01.000250");
    }

    #[test]
    fn write_frames_records_with_synthetic_rows() {
        let mut log = StimulusTimeLog::new();
        log.start();
        log.append(record(4, 1));
        log.append(record(4, 0));
        log.finish_now();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stimulus_times.csv");
        log.write(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "datetime,id,intensity");
        assert!(lines[1].ends_with(",0,0"));
        assert!(lines[2].ends_with(",4,1"));
        assert!(lines[3].ends_with(",4,0"));
        assert!(lines[4].ends_with(",0,0"));
    }

    #[test]
    fn empty_log_still_writes_header_and_bounds() {
        let mut log = StimulusTimeLog::new();
        log.start();
        log.finish_now();
        assert!(log.start_time().unwrap() <= log.end_time().unwrap());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        log.write(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn unfinished_log_cannot_be_written() {
        let mut log = StimulusTimeLog::new();
        log.start();
        let dir = tempfile::tempdir().unwrap();
        let err = log.write(&dir.path().join("x.csv"));
        assert!(matches!(err, Err(TimeLogError::NotFinished)));
    }

    #[test]
    #[should_panic(expected = "already finished")]
    fn double_finish_panics() {
        let mut log = StimulusTimeLog::new();
        log.start();
        log.finish_now();
        log.finish_future(Utc::now());
    }

    #[test]
    #[should_panic(expected = "already started")]
    fn double_start_panics() {
        let mut log = StimulusTimeLog::new();
        log.start();
        log.start();
    }
}
