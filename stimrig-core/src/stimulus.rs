use serde::{Deserialize, Serialize};
use stimrig_audio::AudioClip;

/// Identifies one output channel of the rig in schedules and logs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StimulusKey {
    id: u32,
    name: String,
}

impl StimulusKey {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StimulusKind {
    Digital,
    Analog,
    Audio,
}

/// One applied output: a value change on a pin, or an audio trigger.
///
/// Invariant: a clip is present exactly when the kind is `Audio`. The
/// constructors uphold it and `new` asserts it; a mismatch means the
/// schedule that produced this stimulus is corrupt.
#[derive(Debug, Clone)]
pub struct Stimulus {
    key: StimulusKey,
    kind: StimulusKind,
    byte_intensity: u8,
    clip: Option<AudioClip>,
}

impl Stimulus {
    pub fn new(key: StimulusKey, kind: StimulusKind, byte_intensity: u8, clip: Option<AudioClip>) -> Self {
        assert!(
            clip.is_some() == (kind == StimulusKind::Audio),
            "stimulus {:?} has kind {:?} but clip presence {}",
            key.name(),
            kind,
            clip.is_some()
        );
        Self {
            key,
            kind,
            byte_intensity,
            clip,
        }
    }

    /// A digital or analog pin write.
    pub fn output(key: StimulusKey, kind: StimulusKind, value: u8) -> Self {
        Self::new(key, kind, value, None)
    }

    /// An audio trigger carrying its prepared clip.
    pub fn audio(key: StimulusKey, clip: AudioClip) -> Self {
        let volume = clip.intensity();
        Self::new(key, StimulusKind::Audio, volume, Some(clip))
    }

    pub fn key(&self) -> &StimulusKey {
        &self.key
    }

    pub fn kind(&self) -> StimulusKind {
        self.kind
    }

    pub fn clip(&self) -> Option<&AudioClip> {
        self.clip.as_ref()
    }

    /// The clip volume for audio, the pin value otherwise.
    pub fn effective_intensity(&self) -> u8 {
        match &self.clip {
            Some(clip) => clip.intensity(),
            None => self.byte_intensity,
        }
    }

    pub fn is_audio(&self) -> bool {
        self.kind == StimulusKind::Audio
    }

    pub fn is_digital(&self) -> bool {
        self.kind == StimulusKind::Digital
    }

    pub fn is_analog(&self) -> bool {
        self.kind == StimulusKind::Analog
    }
}
