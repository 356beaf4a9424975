use crate::stimulus::Stimulus;

/// Error type drivers hand back through the dispatch callbacks.
pub type DriverError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The pin-write side of the rig. Implementations must be low-latency and
/// must not validate values; validation belongs on the slow external path.
pub trait HardwareOutput {
    fn write(&mut self, stimulus: &Stimulus) -> Result<(), DriverError>;
}

/// The audio side of the rig: begins playback of the stimulus clip at its
/// prepared length and volume, returning without waiting for it to end.
pub trait AudioOutput {
    fn play(&mut self, stimulus: &Stimulus) -> Result<(), DriverError>;
}
