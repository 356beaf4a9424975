use std::time::Duration;

use chrono::Utc;
use log::{info, warn};
use thiserror::Error;

use stimrig_core::{AudioOutput, DriverError, HardwareOutput, StimulusKind};
use stimrig_timing::{Clock, SpinClock};

use crate::schedule::{Schedule, ScheduleEntry};
use crate::time_log::{StimulusTimeLog, StimulusTimeRecord};

/// A callback failed mid-run. The log up to the failing event is finished
/// and carried here so the caller can still persist what did go out.
#[derive(Debug, Error)]
#[error("dispatch failed at {offset_ms} ms: {source}")]
pub struct RunError {
    pub offset_ms: u64,
    #[source]
    pub source: DriverError,
    pub partial: StimulusTimeLog,
}

/// Replays a schedule against the hardware in real time.
///
/// The loop busy-waits each event's offset against a monotonic origin
/// instead of sleeping; OS timers wake too coarsely and too unpredictably
/// for sub-millisecond stimulus timing. For the duration of a run the loop
/// owns the hardware-write path exclusively.
pub struct ScheduleRunner<C: Clock = SpinClock> {
    clock: C,
}

impl ScheduleRunner<SpinClock> {
    pub fn new() -> Self {
        Self {
            clock: SpinClock::new(),
        }
    }
}

impl Default for ScheduleRunner<SpinClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> ScheduleRunner<C> {
    pub fn with_clock(clock: C) -> Self {
        Self { clock }
    }

    /// Dispatches every event in ascending offset order (ties in insertion
    /// order) and returns the timestamped record of what went out.
    ///
    /// Pin writes go through `hardware` unvalidated, audio triggers through
    /// `audio`. A callback error aborts the run immediately; nothing is
    /// retried.
    pub fn run<W, A>(
        &self,
        schedule: &Schedule,
        hardware: &mut W,
        audio: &mut A,
    ) -> Result<StimulusTimeLog, RunError>
    where
        W: HardwareOutput,
        A: AudioOutput,
    {
        info!(
            "running schedule: {} events over {} ms",
            schedule.event_count(),
            schedule.total_ms()
        );
        let mut queue: Vec<(u64, &ScheduleEntry)> = schedule
            .events()
            .iter()
            .map(|(ms, entry)| (*ms, entry))
            .collect();
        // stable: events at the same offset keep their insertion order
        queue.sort_by_key(|(ms, _)| *ms);

        let mut time_log = StimulusTimeLog::new();
        time_log.start();
        let origin = self.clock.origin();

        for (offset_ms, entry) in queue {
            self.clock
                .wait_until(origin, Duration::from_millis(offset_ms));

            let stimulus = match entry {
                ScheduleEntry::Marker(name) => {
                    info!("starting block {:?} at {} ms", name, offset_ms);
                    continue;
                }
                ScheduleEntry::Stimulus(stimulus) => stimulus,
            };

            let dispatched = match stimulus.kind() {
                StimulusKind::Digital | StimulusKind::Analog => hardware.write(stimulus),
                StimulusKind::Audio => audio.play(stimulus),
            };
            if let Err(source) = dispatched {
                time_log.finish_now();
                return Err(RunError {
                    offset_ms,
                    source,
                    partial: time_log,
                });
            }

            time_log.append(StimulusTimeRecord::new(stimulus.clone(), Utc::now()));
        }

        // close the log at the schedule's theoretical end, not at whatever
        // instant the last event happened to fire
        let elapsed = self.clock.elapsed(origin);
        let total = Duration::from_millis(schedule.total_ms());
        if elapsed > total {
            let overrun = elapsed - total;
            warn!("dispatch finished {} us late", overrun.as_micros());
            time_log.set_overrun(overrun);
            time_log.finish_now();
        } else {
            let remaining = total - elapsed;
            time_log.finish_future(
                Utc::now() + chrono::Duration::microseconds(remaining.as_micros() as i64),
            );
        }
        Ok(time_log)
    }
}
