//! Controller-side view of the latest decoded state

use std::fmt;

use chrono::{DateTime, Utc};

use neptun_types::{DeviceState, StatusFlags};

/// Latest state as seen by the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub state: DeviceState,
    pub fetched_at: DateTime<Utc>,

    /// Dry mode is on; sensor data stays as reported but raises no alarm
    pub alarms_suppressed: bool,

    /// A valve command is still within its settle window
    pub valve_settling: bool,
}

impl Snapshot {
    pub fn new(state: DeviceState, fetched_at: DateTime<Utc>, valve_settling: bool) -> Self {
        Self {
            alarms_suppressed: state.dry_mode_enabled,
            state,
            fetched_at,
            valve_settling,
        }
    }

    /// A leak should be reported: a sensor is triggered or the controller is
    /// in alarm, and dry mode is off
    pub fn leak_alarm(&self) -> bool {
        if self.alarms_suppressed {
            return false;
        }

        self.state.any_sensor_triggered() || self.state.status.contains(StatusFlags::ALARM)
    }

    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now.signed_duration_since(self.fetched_at)
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.state, self.fetched_at.format("%Y-%m-%d %H:%M:%S"))?;

        if self.valve_settling {
            write!(f, " (valve settling)")?;
        }

        if self.alarms_suppressed {
            write!(f, " (dry mode)")?;
        }

        Ok(())
    }
}
