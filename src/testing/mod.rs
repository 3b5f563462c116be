pub mod mock_driver;
#[cfg(test)]
/// Unit tests for the mock driver.
pub mod tests;

pub use mock_driver::{MockDpll, MockDriver, MockPin};

use crate::types::{DeviceClass, DeviceIdentity};

/// Clock id used by [`test_identity`]
pub const TEST_CLOCK_ID: u64 = 0x0050_c2ff_fe12_3456;

/// Bus name used by [`test_identity`]
pub const TEST_BUS: &str = "0000:01:00.0";

/// Helper to create a `DeviceIdentity` on the test board.
#[must_use]
pub fn test_identity(class: DeviceClass, index: u32) -> DeviceIdentity {
    DeviceIdentity::new(TEST_CLOCK_ID, class, index, TEST_BUS)
}
