use stimrig_audio::AudioSegment;

use crate::stimulus::{StimulusKey, StimulusKind};

/// A named output channel as the compiler sees it: where events go and, for
/// audio, the source material clips are cut from. The constructors are the
/// only way to build one, so a kind/source mismatch cannot exist.
#[derive(Debug, Clone)]
pub struct StimulusTarget {
    key: StimulusKey,
    kind: StimulusKind,
    source: Option<AudioSegment>,
}

impl StimulusTarget {
    pub fn digital(key: StimulusKey) -> Self {
        Self {
            key,
            kind: StimulusKind::Digital,
            source: None,
        }
    }

    pub fn analog(key: StimulusKey) -> Self {
        Self {
            key,
            kind: StimulusKind::Analog,
            source: None,
        }
    }

    pub fn audio(key: StimulusKey, source: AudioSegment) -> Self {
        Self {
            key,
            kind: StimulusKind::Audio,
            source: Some(source),
        }
    }

    pub fn key(&self) -> &StimulusKey {
        &self.key
    }

    pub fn kind(&self) -> StimulusKind {
        self.kind
    }

    pub fn source(&self) -> Option<&AudioSegment> {
        self.source.as_ref()
    }
}
