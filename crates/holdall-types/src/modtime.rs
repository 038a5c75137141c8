use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Seconds since the UNIX epoch, with sub-second precision.
pub type Timestamp = f64;

/// Smallest step a plain touch advances the clock by when the wall clock has
/// not moved past the current value.
pub const MIN_TICK: Timestamp = 1e-6;

/// Current wall-clock time as a [`Timestamp`].
pub fn now() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// A last-modified timestamp that only ever moves forward.
///
/// `ModTime` is embedded by value in every entity that tracks modification:
/// contained objects, containers and the store itself. Three divergent
/// versions merge by taking the maximum, so the value is safe to resolve at
/// commit time without looking at anything else.
///
/// Serialized as a bare number.
#[derive(Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModTime(Timestamp);

impl ModTime {
    /// A timestamp holding an explicit value.
    pub const fn at(value: Timestamp) -> Self {
        Self(value)
    }

    /// The zero timestamp. Never-modified entities start here.
    pub const fn zero() -> Self {
        Self(0.0)
    }

    /// Current value.
    pub fn value(&self) -> Timestamp {
        self.0
    }

    /// Advance the timestamp and return the new value.
    ///
    /// With `Some(t)` greater than the current value, the value becomes `t`.
    /// Otherwise the value becomes the wall clock, or the current value plus
    /// [`MIN_TICK`] if the clock has not caught up.
    pub fn update(&mut self, explicit: Option<Timestamp>) -> Timestamp {
        match explicit {
            Some(t) if t > self.0 => self.0 = t,
            _ => self.0 = now().max(self.0 + MIN_TICK),
        }
        self.0
    }

    /// Only adopt `t` when it is strictly greater than the current value.
    /// Returns `true` if the value changed.
    pub fn update_if_greater(&mut self, t: Option<Timestamp>) -> bool {
        match t {
            Some(t) if t > self.0 => {
                self.0 = t;
                true
            }
            _ => false,
        }
    }

    /// Three-way merge: the maximum of the three versions.
    pub fn resolve_conflict(base: Timestamp, committed: Timestamp, mine: Timestamp) -> Timestamp {
        base.max(committed).max(mine)
    }
}

impl fmt::Debug for ModTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModTime({})", self.0)
    }
}

impl fmt::Display for ModTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Timestamp> for ModTime {
    fn from(value: Timestamp) -> Self {
        Self(value)
    }
}
