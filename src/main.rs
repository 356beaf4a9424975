use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use log::info;
use rand::Rng;
use serde::Serialize;

use stimrig_audio::AudioSegment;
use stimrig_core::{StimulusKey, StimulusTarget};
use stimrig_hw::{Board, BoardLayout, VirtualPins, VirtualSpeaker};
use stimrig_schedule::time_log::stamp;
use stimrig_schedule::{Block, BlockCompiler, ScheduleRunner, StimulusTimeLog};
use stimrig_timing::SpinClock;

#[derive(Serialize)]
struct RunReport {
    total_ms: u64,
    event_count: usize,
    started: String,
    finished: String,
    overrun_us: Option<u128>,
    dispatches: Vec<DispatchCount>,
}

#[derive(Serialize)]
struct DispatchCount {
    key: StimulusKey,
    count: usize,
}

/// A short demonstration battery against virtual hardware: LED pulses, an
/// analog flicker, and an audio tone, compiled and replayed for real.
fn main() -> Result<()> {
    env_logger::init();

    let layout = BoardLayout::new(
        [("led".to_string(), 2)].into(),
        [("panel".to_string(), 9)].into(),
        Default::default(),
        Default::default(),
        vec![13],
    )?;
    let mut board = Board::connect(layout, Some(VirtualPins::default()))?;
    let mut speaker = VirtualSpeaker::default();

    // ready blink before the battery starts
    board.pulse("led", 1, Duration::from_millis(50))?;

    let mut compiler = BlockCompiler::new(3600);
    compiler.append(
        &StimulusTarget::digital(StimulusKey::new(1, "led")),
        &[Block::new("led_pulses", 0, led_pulses())],
    )?;
    compiler.append(
        &StimulusTarget::analog(StimulusKey::new(2, "panel")),
        &[Block::new("panel_flicker", 1200, panel_flicker())],
    )?;
    compiler.append(
        &StimulusTarget::audio(
            StimulusKey::new(3, "tone"),
            AudioSegment::tone(880.0, 250, 44_100),
        ),
        &[Block::new("tone_burst", 2400, tone_burst())],
    )?;
    let schedule = compiler.build();

    println!("{}", schedule.render_blocks());
    println!("{}", schedule.render_events());

    let runner = ScheduleRunner::with_clock(SpinClock::with_coarse_sleep(Duration::from_millis(2)));
    let time_log = runner.run(&schedule, &mut board, &mut speaker)?;
    board.stop_all();

    time_log
        .write(Path::new("stimulus_times.csv"))
        .context("writing stimulus times")?;
    let report = build_report(schedule.total_ms(), schedule.event_count(), &time_log);
    std::fs::write(
        "run_report.json",
        serde_json::to_string_pretty(&report).context("serializing run report")?,
    )?;

    info!(
        "run complete: {} stimuli dispatched, {} audio triggers",
        time_log.len(),
        speaker.played.len()
    );
    println!(
        "dispatched {} events; log written to stimulus_times.csv",
        time_log.len()
    );
    Ok(())
}

/// 1 s of LED timeline with two 100 ms pulses.
fn led_pulses() -> Vec<u8> {
    let mut frames = vec![0u8; 1000];
    frames[100..200].fill(1);
    frames[400..500].fill(1);
    frames
}

/// 1 s of random-brightness flicker in 50 ms steps.
fn panel_flicker() -> Vec<u8> {
    let mut rng = rand::rng();
    let steps: Vec<u8> = (0..20)
        .map(|i| if i % 2 == 0 { rng.random_range(100..=255) } else { 0 })
        .collect();
    (0..1000).map(|ms: usize| steps[ms / 50]).collect()
}

/// 1 s of audio timeline: a 300 ms tone at volume 180 starting at 100 ms.
fn tone_burst() -> Vec<u8> {
    let mut frames = vec![0u8; 1000];
    frames[100..400].fill(180);
    frames
}

fn build_report(total_ms: u64, event_count: usize, time_log: &StimulusTimeLog) -> RunReport {
    let mut counts: BTreeMap<u32, (StimulusKey, usize)> = BTreeMap::new();
    for record in time_log.records() {
        let key = record.stimulus().key();
        counts.entry(key.id()).or_insert_with(|| (key.clone(), 0)).1 += 1;
    }
    RunReport {
        total_ms,
        event_count,
        started: time_log.start_time().map(stamp).unwrap_or_default(),
        finished: time_log.end_time().map(stamp).unwrap_or_default(),
        overrun_us: time_log.overrun().map(|d| d.as_micros()),
        dispatches: counts
            .into_values()
            .map(|(key, count)| DispatchCount { key, count })
            .collect(),
    }
}
