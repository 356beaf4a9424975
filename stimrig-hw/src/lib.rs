pub mod board;
pub mod layout;

pub use board::{Board, PinDriver, VirtualPins, VirtualSpeaker};
pub use layout::{BoardLayout, HardwareError};
