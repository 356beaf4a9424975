pub mod hw;
pub mod stimulus;
pub mod target;

pub use hw::{AudioOutput, DriverError, HardwareOutput};
pub use stimulus::{Stimulus, StimulusKey, StimulusKind};
pub use target::StimulusTarget;
