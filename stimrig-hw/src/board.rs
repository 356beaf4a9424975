use std::time::Duration;

use log::{debug, info, trace};

use stimrig_core::{AudioOutput, DriverError, HardwareOutput, Stimulus, StimulusKind};

use crate::layout::{BoardLayout, HardwareError};

/// The raw pin-write surface a concrete board exposes. Implementations do
/// no validation; the `Board` facade owns that.
pub trait PinDriver {
    fn digital_write(&mut self, pin: u8, on: bool);
    fn analog_write(&mut self, pin: u8, value: u8);
}

/// A connected output board: a layout plus the driver behind it.
///
/// `set_stimulus` is the validating path for external callers. The
/// `HardwareOutput` impl is the dispatch loop's fast path: it resolves the
/// pin but skips value checks, which belong upstream of a compiled
/// schedule.
pub struct Board<D: PinDriver> {
    layout: BoardLayout,
    driver: D,
}

impl<D: PinDriver> Board<D> {
    /// Takes ownership of a driver, or reports the board as missing so the
    /// caller can distinguish a retryable connection problem from a bug.
    pub fn connect(layout: BoardLayout, driver: Option<D>) -> Result<Self, HardwareError> {
        let driver = driver.ok_or(HardwareError::NotConnected)?;
        let mut board = Self { layout, driver };
        for pin in board.layout.startup_pins().to_vec() {
            board.driver.digital_write(pin, true);
        }
        info!(
            "board connected: {} digital and {} analog outputs",
            board.layout.digital_stimuli().len(),
            board.layout.analog_stimuli().len()
        );
        Ok(board)
    }

    pub fn layout(&self) -> &BoardLayout {
        &self.layout
    }

    /// Validated write for external callers.
    pub fn set_stimulus(&mut self, name: &str, value: u8) -> Result<(), HardwareError> {
        match self.layout.stimulus_pin(name) {
            Some((StimulusKind::Digital, pin)) => {
                if value > 1 {
                    return Err(HardwareError::BadPinWriteValue {
                        name: name.to_string(),
                        value,
                    });
                }
                self.driver.digital_write(pin, value == 1);
            }
            Some((StimulusKind::Analog, pin)) => self.driver.analog_write(pin, value),
            Some((StimulusKind::Audio, _)) => unreachable!("layouts only map pin stimuli"),
            None => return Err(HardwareError::NoSuchOutputPin(name.to_string())),
        }
        Ok(())
    }

    /// Forces every output pin to zero.
    pub fn stop_all(&mut self) {
        debug!("forcing all outputs off");
        let digital: Vec<u8> = self.layout.digital_stimuli().values().copied().collect();
        let analog: Vec<u8> = self.layout.analog_stimuli().values().copied().collect();
        for pin in digital {
            self.driver.digital_write(pin, false);
        }
        for pin in analog {
            self.driver.analog_write(pin, 0);
        }
    }

    /// Turns one stimulus on, holds it, and turns it off again.
    pub fn pulse(&mut self, name: &str, value: u8, hold: Duration) -> Result<(), HardwareError> {
        self.set_stimulus(name, value)?;
        std::thread::sleep(hold);
        self.set_stimulus(name, 0)
    }
}

impl<D: PinDriver> HardwareOutput for Board<D> {
    fn write(&mut self, stimulus: &Stimulus) -> Result<(), DriverError> {
        match self.layout.stimulus_pin(stimulus.key().name()) {
            Some((StimulusKind::Digital, pin)) => {
                self.driver.digital_write(pin, stimulus.effective_intensity() > 0);
            }
            Some((StimulusKind::Analog, pin)) => {
                self.driver.analog_write(pin, stimulus.effective_intensity());
            }
            Some((StimulusKind::Audio, _)) => unreachable!("layouts only map pin stimuli"),
            None => {
                return Err(
                    HardwareError::NoSuchOutputPin(stimulus.key().name().to_string()).into(),
                );
            }
        }
        Ok(())
    }
}

/// A driver that records writes instead of touching hardware.
#[derive(Debug, Default)]
pub struct VirtualPins {
    pub writes: Vec<(u8, u8)>,
}

impl PinDriver for VirtualPins {
    fn digital_write(&mut self, pin: u8, on: bool) {
        trace!("digital pin {} <- {}", pin, on as u8);
        self.writes.push((pin, on as u8));
    }

    fn analog_write(&mut self, pin: u8, value: u8) {
        trace!("analog pin {} <- {}", pin, value);
        self.writes.push((pin, value));
    }
}

/// An audio sink that records triggers instead of playing them.
#[derive(Debug, Default)]
pub struct VirtualSpeaker {
    pub played: Vec<(String, Option<u64>, u8)>,
}

impl AudioOutput for VirtualSpeaker {
    fn play(&mut self, stimulus: &Stimulus) -> Result<(), DriverError> {
        debug_assert!(stimulus.is_audio());
        if let Some(clip) = stimulus.clip() {
            debug!(
                "playing {:?}: {:?} ms at volume {}",
                clip.name(),
                clip.duration_ms(),
                clip.intensity()
            );
            self.played
                .push((clip.name().to_string(), clip.duration_ms(), clip.intensity()));
        }
        Ok(())
    }
}
