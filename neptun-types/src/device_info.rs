//! Device identity reported inside the system state block

use std::fmt;

/// Device information
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Device model (e.g. `N4106`)
    pub model: String,

    /// MAC address as reported by the device (`60:C5:A8:6F:56:6A`)
    pub mac_address: String,

    /// Serial number
    pub serial_number: String,
}

impl DeviceInfo {
    pub fn new(
        model: impl Into<String>,
        mac_address: impl Into<String>,
        serial_number: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            mac_address: mac_address.into(),
            serial_number: serial_number.into(),
        }
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Neptun {}[SN: {}, MAC: {}]",
            self.model, self.serial_number, self.mac_address
        )
    }
}
