use std::collections::HashMap;

use thiserror::Error;

use stimrig_core::StimulusKind;

#[derive(Debug, Error)]
pub enum HardwareError {
    #[error("could not connect to the output board")]
    NotConnected,
    #[error("no output pin is assigned to stimulus {0:?}")]
    NoSuchOutputPin(String),
    #[error("digital stimulus {name:?} only accepts 0 or 1, got {value}")]
    BadPinWriteValue { name: String, value: u8 },
    #[error("{0:?} is assigned to both a digital and an analog pin")]
    PinConflict(String),
}

/// The pin assignments of one board: which names map to which output and
/// sensor pins. Knows nothing about the devices behind the pins.
#[derive(Debug, Clone)]
pub struct BoardLayout {
    digital_stimuli: HashMap<String, u8>,
    analog_stimuli: HashMap<String, u8>,
    digital_sensors: HashMap<String, u8>,
    analog_sensors: HashMap<String, u8>,
    startup_pins: Vec<u8>,
}

impl BoardLayout {
    pub fn new(
        digital_stimuli: HashMap<String, u8>,
        analog_stimuli: HashMap<String, u8>,
        digital_sensors: HashMap<String, u8>,
        analog_sensors: HashMap<String, u8>,
        startup_pins: Vec<u8>,
    ) -> Result<Self, HardwareError> {
        if let Some(name) = digital_stimuli.keys().find(|n| analog_stimuli.contains_key(*n)) {
            return Err(HardwareError::PinConflict(name.clone()));
        }
        if let Some(name) = digital_sensors.keys().find(|n| analog_sensors.contains_key(*n)) {
            return Err(HardwareError::PinConflict(name.clone()));
        }
        Ok(Self {
            digital_stimuli,
            analog_stimuli,
            digital_sensors,
            analog_sensors,
            startup_pins,
        })
    }

    pub fn stimulus_kind(&self, name: &str) -> Result<StimulusKind, HardwareError> {
        self.stimulus_pin(name)
            .map(|(kind, _)| kind)
            .ok_or_else(|| HardwareError::NoSuchOutputPin(name.to_string()))
    }

    pub fn stimulus_pin(&self, name: &str) -> Option<(StimulusKind, u8)> {
        if let Some(&pin) = self.digital_stimuli.get(name) {
            return Some((StimulusKind::Digital, pin));
        }
        if let Some(&pin) = self.analog_stimuli.get(name) {
            return Some((StimulusKind::Analog, pin));
        }
        None
    }

    pub fn digital_stimuli(&self) -> &HashMap<String, u8> {
        &self.digital_stimuli
    }

    pub fn analog_stimuli(&self) -> &HashMap<String, u8> {
        &self.analog_stimuli
    }

    pub fn digital_sensors(&self) -> &HashMap<String, u8> {
        &self.digital_sensors
    }

    pub fn analog_sensors(&self) -> &HashMap<String, u8> {
        &self.analog_sensors
    }

    pub fn startup_pins(&self) -> &[u8] {
        &self.startup_pins
    }
}
