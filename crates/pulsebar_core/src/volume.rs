//! Channel Volume Arithmetic
//!
//! The server expresses volume per channel in a linear native unit where
//! [`VOLUME_NORM`] is 100 %. Clients see a single integer percentage derived
//! from the channel average.
//!
//! The controller never sets channels independently: every planned change
//! leaves all channels at an identical value (absolute set) or moves them
//! all by the same native delta (relative step).

use serde::{Deserialize, Serialize};

/// Native volume at 100 %
pub const VOLUME_NORM: u32 = 0x10000;

/// Largest native volume the server accepts on a channel
pub const VOLUME_MAX: u32 = u32::MAX / 2;

/// Recommended maximum volume for user-facing controls (+11 dB)
pub const VOLUME_UI_MAX: u32 = 99_957;

/// Largest channel count the server supports
pub const CHANNELS_MAX: usize = 32;

/// Percentage ceiling for relative steps, derived from [`VOLUME_UI_MAX`]
pub const MAX_PERCENT: u16 = ((VOLUME_UI_MAX as u64 * 100) / VOLUME_NORM as u64) as u16;

/// Native units per percentage point
const VOLUME_TICK: f64 = VOLUME_NORM as f64 / 100.0;

/// Direction of a relative volume step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolumeChange {
    Increase,
    Decrease,
}

/// Convert a percentage to native units, truncating toward zero
pub fn percent_to_native(percent: f64) -> u32 {
    (percent * VOLUME_TICK).clamp(0.0, VOLUME_MAX as f64) as u32
}

/// Convert native units to the nearest whole percentage
pub fn native_to_percent(native: u32) -> u16 {
    let percent = (native as f64 / VOLUME_NORM as f64 * 100.0).round();
    percent.min(u16::MAX as f64) as u16
}

/// Per-channel volume of one device, in native units
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelVolume {
    values: Vec<u32>,
}

impl ChannelVolume {
    pub fn new(values: Vec<u32>) -> Self {
        Self { values }
    }

    /// `channels` channels all set to `value`
    pub fn uniform(channels: usize, value: u32) -> Self {
        Self {
            values: vec![value; channels],
        }
    }

    /// Two muted-level channels, used whenever no valid structure is known
    pub fn stereo_default() -> Self {
        Self::uniform(2, 0)
    }

    pub fn channels(&self) -> usize {
        self.values.len()
    }

    pub fn values(&self) -> &[u32] {
        &self.values
    }

    /// Channel count is supported and no channel exceeds [`VOLUME_MAX`]
    pub fn is_valid(&self) -> bool {
        (1..=CHANNELS_MAX).contains(&self.values.len())
            && self.values.iter().all(|&v| v <= VOLUME_MAX)
    }

    /// Integer mean of all channels (0 for an empty structure)
    pub fn average(&self) -> u32 {
        if self.values.is_empty() {
            return 0;
        }
        let sum: u64 = self.values.iter().map(|&v| v as u64).sum();
        (sum / self.values.len() as u64) as u32
    }

    /// Client-facing percentage of the channel average
    pub fn percent(&self) -> u16 {
        native_to_percent(self.average())
    }

    pub fn set_uniform(&mut self, value: u32) {
        self.values.iter_mut().for_each(|v| *v = value);
    }

    fn raise(&mut self, change: u32) {
        for v in &mut self.values {
            *v = (*v as u64 + change as u64).min(VOLUME_MAX as u64) as u32;
        }
    }

    fn lower(&mut self, change: u32) {
        for v in &mut self.values {
            *v = v.saturating_sub(change);
        }
    }
}

/// Plan an absolute volume change.
///
/// `target` is clamped into `[min, max]` (bounds are swapped if inverted) and
/// applied uniformly to the last known valid structure, or to a stereo
/// default when none is known.
pub fn plan_absolute(last: Option<&ChannelVolume>, target: u16, min: u16, max: u16) -> ChannelVolume {
    let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
    let target = target.clamp(lo, hi);

    let mut volume = match last {
        Some(v) if v.is_valid() => v.clone(),
        _ => {
            tracing::debug!("Using default stereo volume structure");
            ChannelVolume::stereo_default()
        }
    };
    volume.set_uniform(percent_to_native(target as f64));
    volume
}

/// Plan a relative volume step from `current` percent.
///
/// Returns `None` when nothing should be submitted: increasing at or above
/// `max`, decreasing at or below zero, or a step that is not positive.
/// Without a valid structure the result is a stereo structure at `current`
/// percent, submitted as-is so the server learns a usable layout.
pub fn plan_step(
    last: Option<&ChannelVolume>,
    current: u16,
    change: VolumeChange,
    step: f64,
    max: u16,
) -> Option<ChannelVolume> {
    let mut volume = match last {
        Some(v) if v.is_valid() => v.clone(),
        _ => {
            tracing::debug!("Using default stereo volume structure");
            return Some(ChannelVolume::uniform(2, percent_to_native(current as f64)));
        }
    };

    if step.is_nan() || step <= 0.0 {
        return None;
    }

    let max = max.min(MAX_PERCENT);
    let current_f = current as f64;

    match change {
        VolumeChange::Increase if current < max => {
            let delta = if current_f + step > max as f64 {
                ((max - current) as f64 * VOLUME_TICK).round()
            } else {
                (step * VOLUME_TICK).round()
            };
            volume.raise(delta as u32);
        }
        VolumeChange::Decrease if current > 0 => {
            let delta = if current_f - step < 0.0 {
                (current_f * VOLUME_TICK).round()
            } else {
                (step * VOLUME_TICK).round()
            };
            volume.lower(delta as u32);
        }
        _ => return None,
    }

    Some(volume)
}
