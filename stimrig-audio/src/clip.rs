use log::debug;
use thiserror::Error;

use crate::segment::AudioSegment;

/// Length of the stand-in clip emitted for zero volume or zero length.
/// A truly zero-length clip is malformed for most playback backends.
pub const SILENT_PLACEHOLDER_MS: u64 = 1;

/// How far the resized clip may drift from the requested length.
const LENGTH_TOLERANCE_MS: f64 = 0.5;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("applied audio length is {0} ms but cannot be negative")]
    InvalidLength(i64),
    #[error("volume is {0} but must be 0-255")]
    InvalidVolume(u32),
}

/// Gain-curve settings shared by every clip built for one schedule.
#[derive(Debug, Clone)]
pub struct AudioSettings {
    /// Attenuation applied at volume 0; volume 255 maps to 0 dB.
    pub volume_floor_db: f64,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            volume_floor_db: -50.0,
        }
    }
}

/// A playback-ready clip: the prepared samples plus the length and volume
/// bookkeeping downstream logging wants.
#[derive(Debug, Clone)]
pub struct AudioClip {
    name: String,
    segment: AudioSegment,
    duration_ms: Option<u64>,
    intensity: u8,
}

impl AudioClip {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn segment(&self) -> &AudioSegment {
        &self.segment
    }

    /// Requested play length; `None` means the clip's own native length.
    pub fn duration_ms(&self) -> Option<u64> {
        self.duration_ms
    }

    /// The requested volume, kept verbatim for logging. Independent of the
    /// dB gain actually applied to the samples.
    pub fn intensity(&self) -> u8 {
        self.intensity
    }
}

/// Builds a clip of an exact length and volume from a source segment.
///
/// With a length, the source is tiled cyclically to cover it and cut hard at
/// the boundary. Volume maps linearly in dB against `volume_floor_db`,
/// reaching 0 dB at 255. Zero volume or zero length yields the canonical
/// silent placeholder instead of an empty clip.
pub fn build_clip(
    name: &str,
    source: &AudioSegment,
    applied_length_ms: Option<i64>,
    volume: u32,
    settings: &AudioSettings,
) -> Result<AudioClip, AudioError> {
    if let Some(length) = applied_length_ms {
        if length < 0 {
            return Err(AudioError::InvalidLength(length));
        }
    }
    if volume > 255 {
        return Err(AudioError::InvalidVolume(volume));
    }

    let resized = match applied_length_ms {
        Some(length) => source.tiled_to_ms(length as u64),
        None => source.clone(),
    };

    let segment = if volume == 0 || applied_length_ms == Some(0) {
        AudioSegment::silent(SILENT_PLACEHOLDER_MS, source.sample_rate())
    } else {
        if let Some(length) = applied_length_ms {
            // 1 ms requests degenerate to native-length playback upstream
            assert!(
                length == 1 || (resized.len_ms_exact() - length as f64).abs() <= LENGTH_TOLERANCE_MS,
                "resized audio clip is {} ms but {} ms was requested",
                resized.len_ms_exact(),
                length
            );
        }
        let floor = settings.volume_floor_db;
        let gain_db = volume as f64 * (floor / 255.0) - floor;
        resized.with_gain_db(gain_db)
    };

    debug!(
        "built clip {:?}: {:?} ms at volume {}",
        name, applied_length_ms, volume
    );
    Ok(AudioClip {
        name: name.to_string(),
        segment,
        duration_ms: applied_length_ms.map(|l| l as u64),
        intensity: volume as u8,
    })
}
