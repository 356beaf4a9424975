use log::debug;
use thiserror::Error;

use stimrig_audio::{AudioError, AudioSettings, build_clip};
use stimrig_core::{Stimulus, StimulusTarget};

use crate::block::Block;
use crate::schedule::{Schedule, ScheduleEntry};

#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Audio(#[from] AudioError),
    #[error("block {later:?} starts at {later_start} ms, inside or before {earlier:?} which runs through {earlier_end} ms")]
    OverlappingBlocks {
        earlier: String,
        earlier_end: u64,
        later: String,
        later_start: u64,
    },
}

/// Compresses per-millisecond intensity timelines into a sparse schedule of
/// change events.
///
/// Each `append` run-length encodes one stimulus's blocks: an event is
/// emitted where the value changes, carrying how long the previous value
/// held. Dense authoring stays cheap at dispatch time because the event
/// count scales with the number of changes, not the total duration.
pub struct BlockCompiler {
    total_ms: u64,
    audio: AudioSettings,
    events: Vec<(u64, ScheduleEntry)>,
    block_positions: Vec<(u64, String)>,
}

/// The value currently being held and where it began. The implicit run is
/// the zero baseline that opens a stimulus (or follows a gap); it is never
/// emitted because reconstruction assumes zero until the first event.
struct Run {
    start: u64,
    value: u8,
    implicit: bool,
}

impl BlockCompiler {
    pub fn new(total_ms: u64) -> Self {
        Self::with_audio_settings(total_ms, AudioSettings::default())
    }

    pub fn with_audio_settings(total_ms: u64, audio: AudioSettings) -> Self {
        Self {
            total_ms,
            audio,
            events: Vec::new(),
            block_positions: Vec::new(),
        }
    }

    /// Finalizes into an immutable schedule, consuming the compiler.
    pub fn build(self) -> Schedule {
        Schedule::new(self.events, self.block_positions, self.total_ms)
    }

    /// Encodes one stimulus's blocks into change events. Blocks must be
    /// ordered by start time and must not overlap.
    pub fn append(&mut self, target: &StimulusTarget, blocks: &[Block]) -> Result<(), CompileError> {
        for pair in blocks.windows(2) {
            let earlier_end = pair[0].last_ms().unwrap_or(pair[0].start_ms());
            if pair[1].start_ms() <= earlier_end {
                return Err(CompileError::OverlappingBlocks {
                    earlier: pair[0].name().to_string(),
                    earlier_end,
                    later: pair[1].name().to_string(),
                    later_start: pair[1].start_ms(),
                });
            }
        }

        let mut run: Option<Run> = None;
        let mut last: Option<u64> = None;

        for block in blocks {
            debug!(
                "appending block {:?} for {:?}: {} frames from {} ms",
                block.name(),
                target.key().name(),
                block.frames().len(),
                block.start_ms()
            );
            self.block_positions.push((block.start_ms(), block.name().to_string()));
            self.events.push((block.start_ms(), ScheduleEntry::Marker(block.name().to_string())));

            if let Some(prev_last) = last {
                if block.start_ms() != prev_last + 1 {
                    // a gap between blocks forces the output off at its start
                    if target.source().is_none() || block.native_audio_length() {
                        self.emit(target, prev_last + 1, 0, None, block.native_audio_length())?;
                    }
                    run = None;
                }
            }

            if block.frames().is_empty() {
                continue;
            }

            let mut current = run.take().unwrap_or(Run {
                start: block.start_ms(),
                value: 0,
                implicit: true,
            });
            let mut abs = block.start_ms();
            for (i, &value) in block.frames().iter().enumerate() {
                abs = block.start_ms() + i as u64;
                if value != current.value {
                    if !current.implicit {
                        self.emit(
                            target,
                            current.start,
                            current.value,
                            Some(abs - current.start),
                            block.native_audio_length(),
                        )?;
                    }
                    current = Run {
                        start: abs,
                        value,
                        implicit: false,
                    };
                }
            }
            // tail run, with its duration measured to the last frame index
            if !current.implicit {
                self.emit(
                    target,
                    current.start,
                    current.value,
                    Some(abs - current.start),
                    block.native_audio_length(),
                )?;
            }
            // a contiguous next block reopens the run at its own origin, so
            // a value held across the boundary yields one event per block
            run = Some(Run {
                start: abs + 1,
                value: current.value,
                implicit: current.implicit,
            });
            last = Some(abs);
        }

        // force the stimulus off after its final block; native-length audio
        // terminates on its own
        if let Some(last_ms) = last {
            let native = blocks.last().is_some_and(Block::native_audio_length);
            if target.source().is_none() || !native {
                self.emit(target, last_ms + 1, 0, None, native)?;
            }
        }
        Ok(())
    }

    fn emit(
        &mut self,
        target: &StimulusTarget,
        at_ms: u64,
        value: u8,
        duration: Option<u64>,
        native: bool,
    ) -> Result<(), CompileError> {
        let stimulus = match target.source() {
            Some(source) => {
                // native-length blocks and 1 ms runs play the source as-is
                let clip_length = if native {
                    None
                } else {
                    match duration {
                        Some(1) | None => None,
                        Some(d) => Some(d as i64),
                    }
                };
                let clip = build_clip(
                    target.key().name(),
                    source,
                    clip_length,
                    value as u32,
                    &self.audio,
                )?;
                Stimulus::audio(target.key().clone(), clip)
            }
            None => Stimulus::output(target.key().clone(), target.kind(), value),
        };

        // a silent audio trigger is a no-op; a zero pin write is an explicit
        // off command and is always kept
        if !stimulus.is_audio() || stimulus.effective_intensity() > 0 {
            self.events.push((at_ms, ScheduleEntry::Stimulus(stimulus)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stimrig_audio::AudioSegment;
    use stimrig_core::StimulusKey;

    fn digital_target() -> StimulusTarget {
        StimulusTarget::digital(StimulusKey::new(1, "led"))
    }

    fn audio_target() -> StimulusTarget {
        let source = AudioSegment::from_samples(vec![1000; 50], 1000);
        StimulusTarget::audio(StimulusKey::new(2, "speaker"), source)
    }

    /// Expands a compiled schedule back to per-millisecond values for one
    /// stimulus, assuming a zero baseline.
    fn decode(schedule: &Schedule, key_id: u32, length: usize) -> Vec<u8> {
        let mut changes: Vec<(u64, u8)> = schedule
            .events()
            .iter()
            .filter_map(|(ms, entry)| match entry {
                ScheduleEntry::Stimulus(s) if s.key().id() == key_id => {
                    Some((*ms, s.effective_intensity()))
                }
                _ => None,
            })
            .collect();
        changes.sort_by_key(|(ms, _)| *ms);

        let mut out = vec![0u8; length];
        let mut value = 0;
        let mut next = 0;
        for (t, slot) in out.iter_mut().enumerate() {
            while next < changes.len() && changes[next].0 <= t as u64 {
                value = changes[next].1;
                next += 1;
            }
            *slot = value;
        }
        out
    }

    fn stimulus_events(schedule: &Schedule) -> Vec<(u64, u8)> {
        schedule
            .events()
            .iter()
            .filter_map(|(ms, entry)| match entry {
                ScheduleEntry::Stimulus(s) => Some((*ms, s.effective_intensity())),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn pulse_compresses_to_two_changes_plus_final_off() {
        let mut compiler = BlockCompiler::new(8);
        compiler
            .append(&digital_target(), &[Block::new("b", 0, vec![0, 0, 0, 1, 1, 0, 0])])
            .unwrap();
        let schedule = compiler.build();
        assert_eq!(stimulus_events(&schedule), vec![(3, 1), (5, 0), (7, 0)]);
    }

    #[test]
    fn round_trip_reconstructs_the_frames() {
        let cases: Vec<Vec<u8>> = vec![
            vec![0, 0, 0, 1, 1, 0, 0],
            vec![1, 1, 0],
            vec![0, 0, 0],
            vec![5, 5, 5, 5],
            vec![0, 3, 0, 3, 0],
            vec![255],
            vec![0, 1],
        ];
        for frames in cases {
            let mut compiler = BlockCompiler::new(frames.len() as u64 + 1);
            compiler
                .append(&digital_target(), &[Block::new("b", 0, frames.clone())])
                .unwrap();
            let schedule = compiler.build();
            assert_eq!(
                decode(&schedule, 1, frames.len()),
                frames,
                "round trip failed for {frames:?}"
            );
        }
    }

    #[test]
    fn round_trip_holds_with_a_start_offset() {
        let frames = vec![0, 2, 2, 0, 7];
        let mut compiler = BlockCompiler::new(30);
        compiler
            .append(&digital_target(), &[Block::new("b", 10, frames.clone())])
            .unwrap();
        let schedule = compiler.build();
        let decoded = decode(&schedule, 1, 16);
        assert_eq!(&decoded[..10], &[0; 10]);
        assert_eq!(&decoded[10..15], frames.as_slice());
        assert_eq!(decoded[15], 0, "output must drop after the block");
    }

    #[test]
    fn gap_between_blocks_forces_the_output_off() {
        let mut compiler = BlockCompiler::new(40);
        compiler
            .append(
                &digital_target(),
                &[
                    Block::new("first", 0, vec![0, 1, 1]),
                    Block::new("second", 20, vec![0, 1]),
                ],
            )
            .unwrap();
        let schedule = compiler.build();
        let decoded = decode(&schedule, 1, 25);
        assert_eq!(&decoded[..3], &[0, 1, 1]);
        assert_eq!(&decoded[3..20], &[0; 17], "gap must be forced off");
        assert_eq!(&decoded[20..22], &[0, 1]);
        assert_eq!(decoded[22], 0);
    }

    #[test]
    fn contiguous_blocks_do_not_get_a_gap_event() {
        let mut compiler = BlockCompiler::new(10);
        compiler
            .append(
                &digital_target(),
                &[
                    Block::new("first", 0, vec![0, 1]),
                    Block::new("second", 2, vec![1, 0]),
                ],
            )
            .unwrap();
        let schedule = compiler.build();
        assert_eq!(decode(&schedule, 1, 5), vec![0, 1, 1, 0, 0]);
    }

    #[test]
    fn zero_intensity_audio_is_suppressed() {
        let mut compiler = BlockCompiler::new(10);
        compiler
            .append(&audio_target(), &[Block::new("b", 0, vec![0, 0, 200, 200, 0])])
            .unwrap();
        let schedule = compiler.build();
        let events = stimulus_events(&schedule);
        // only the audible run survives; the returns to silence are no-ops
        assert_eq!(events.len(), 1);
        assert_eq!(events[0], (2, 200));
    }

    #[test]
    fn audio_clip_length_follows_the_run_length() {
        let mut compiler = BlockCompiler::new(20);
        compiler
            .append(&audio_target(), &[Block::new("b", 0, vec![100, 100, 100, 100, 100, 0])])
            .unwrap();
        let schedule = compiler.build();
        let clip = schedule
            .events()
            .iter()
            .find_map(|(_, e)| match e {
                ScheduleEntry::Stimulus(s) => s.clip(),
                _ => None,
            })
            .unwrap();
        assert_eq!(clip.duration_ms(), Some(5));
        assert_eq!(clip.segment().len_ms(), 5);
    }

    #[test]
    fn native_length_blocks_ignore_run_lengths() {
        let mut compiler = BlockCompiler::new(20);
        compiler
            .append(
                &audio_target(),
                &[Block::with_native_audio_length("b", 0, vec![100, 100, 100, 0])],
            )
            .unwrap();
        let schedule = compiler.build();
        let clip = schedule
            .events()
            .iter()
            .find_map(|(_, e)| match e {
                ScheduleEntry::Stimulus(s) => s.clip(),
                _ => None,
            })
            .unwrap();
        assert_eq!(clip.duration_ms(), None);
        assert_eq!(clip.segment().len_ms(), 50);
    }

    #[test]
    fn one_ms_runs_play_native_length() {
        let mut compiler = BlockCompiler::new(20);
        compiler
            .append(&audio_target(), &[Block::new("b", 0, vec![100, 0, 0])])
            .unwrap();
        let schedule = compiler.build();
        let clip = schedule
            .events()
            .iter()
            .find_map(|(_, e)| match e {
                ScheduleEntry::Stimulus(s) => s.clip(),
                _ => None,
            })
            .unwrap();
        assert_eq!(clip.duration_ms(), None);
    }

    #[test]
    fn markers_record_every_block() {
        let mut compiler = BlockCompiler::new(40);
        compiler
            .append(
                &digital_target(),
                &[Block::new("a", 0, vec![1]), Block::new("b", 20, vec![1])],
            )
            .unwrap();
        let schedule = compiler.build();
        assert_eq!(
            schedule.block_positions(),
            &[(0, "a".to_string()), (20, "b".to_string())]
        );
        let markers: Vec<_> = schedule
            .events()
            .iter()
            .filter(|(_, e)| matches!(e, ScheduleEntry::Marker(_)))
            .collect();
        assert_eq!(markers.len(), 2);
    }

    #[test]
    fn overlapping_blocks_are_rejected() {
        let mut compiler = BlockCompiler::new(10);
        let err = compiler.append(
            &digital_target(),
            &[Block::new("a", 0, vec![1, 1, 1]), Block::new("b", 2, vec![1])],
        );
        assert!(matches!(err, Err(CompileError::OverlappingBlocks { .. })));
    }

    #[test]
    fn invalid_volume_propagates_from_the_clip_builder() {
        // frames are bytes so in-range by construction; drive the builder
        // directly to show the error path the compiler relies on
        let source = AudioSegment::from_samples(vec![1; 10], 1000);
        let err = stimrig_audio::build_clip("t", &source, Some(5), 999, &AudioSettings::default());
        assert!(matches!(err, Err(AudioError::InvalidVolume(999))));
    }
}
