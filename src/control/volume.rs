//! Output volume

use serde::{Deserialize, Serialize};

/// Volume level in percent (0 = silent, 100 = max)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Volume(u8);

impl Volume {
    /// Minimum volume (silent)
    pub const MIN: Self = Self(0);
    /// Maximum volume
    pub const MAX: Self = Self(100);
    /// Default volume (75%)
    pub const DEFAULT: Self = Self(75);

    /// Create a volume level, clamping to 0 - 100
    #[must_use]
    pub fn from_percent(percent: u8) -> Self {
        Self(percent.min(100))
    }

    /// Get as percentage (0 - 100)
    #[must_use]
    pub fn as_percent(&self) -> u8 {
        self.0
    }

    /// Get as f32 (0.0 - 1.0)
    #[must_use]
    pub fn as_f32(&self) -> f32 {
        f32::from(self.0) / 100.0
    }

    /// One percent quieter, saturating at silence
    #[must_use]
    pub fn step_down(&self) -> Self {
        Self(self.0.saturating_sub(1))
    }

    /// Check if silent
    #[must_use]
    pub fn is_silent(&self) -> bool {
        self.0 == 0
    }

    /// Check if at maximum
    #[must_use]
    pub fn is_max(&self) -> bool {
        self.0 >= 100
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<u8> for Volume {
    fn from(percent: u8) -> Self {
        Self::from_percent(percent)
    }
}
