//! # dpll
//!
//! A registry and management protocol for DPLL (digital phase-locked loop)
//! clock-synchronization devices and their input/output pins.
//!
//! ## Features
//!
//! - Device and pin registry with stable ids and reference-counted sharing
//! - Mux pins whose children follow the parent onto every device
//! - Attribute caching with change detection
//! - Query, dump and set requests with errno-style error responses
//! - Change notifications on a broadcast bus
//! - Optional background polling for drivers that cannot push changes
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use dpll::prelude::*;
//! use dpll::testing::{MockDriver, test_identity};
//!
//! # async fn example() -> dpll::Result<()> {
//! let registry = Arc::new(Registry::new(RegistryConfig::default()));
//! let driver = Arc::new(MockDriver::new());
//!
//! // A driver allocates and registers its device and pins
//! let dev = registry
//!     .alloc_device(test_identity(DeviceClass::Eec, 0), driver.clone(), OwnerCtx::empty())
//!     .await?;
//! let pin = registry.alloc_pin(PinProperties::new("GNSS-1PPS", PinType::Gnss)).await?;
//! registry.register_pin(dev, pin, driver, OwnerCtx::empty()).await?;
//! registry.register_device(dev).await?;
//!
//! // A client dumps every device
//! let protocol = Protocol::new(Arc::clone(&registry));
//! let response = protocol.handle(&Message::new(Command::DeviceGet)).await;
//! assert_eq!(response.messages().len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! The library is organized into layers:
//!
//! - **Protocol**: [`Protocol`] - Parses requests, answers them, emits events
//! - **Registry**: [`Registry`] - Devices, pins, membership and cached state
//! - **Dispatch**: [`DeviceOps`]/[`PinOps`] - Driver callbacks
//! - **Attributes**: [`DeviceAttrs`]/[`PinAttrs`] - Typed field records

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Public modules
/// Typed attribute records
pub mod attr;
/// Driver callback interfaces
pub mod dispatch;
/// Error types
pub mod error;
/// Background polling
pub mod monitor;
pub mod protocol;
pub mod registry;
/// Callback-context locking
pub mod sync;
/// Core types
pub mod types;

/// Testing utilities
pub mod testing;

// Re-exports
pub use attr::{AttrId, DeviceAttrs, PinAttrs};
pub use dispatch::{DeviceOps, OwnerCtx, PinCall, PinOps};
pub use error::{DpllError, Result};
pub use monitor::{Monitor, MonitorExit};
pub use protocol::{Event, EventBus, Message, Protocol, Response};
pub use registry::{DeviceGuard, Registry};
pub use types::{
    DeviceClass, DeviceId, DeviceIdentity, DeviceInfo, LockStatus, Mode, PinCaps, PinId,
    PinInfo, PinProperties, PinState, PinType, RegistryConfig, SignalType,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for common imports
///
/// Convenient re-exports
pub mod prelude {
    pub use crate::protocol::{Attribute, Command, DumpFilter};
    pub use crate::{
        DeviceClass, DeviceId, DeviceOps, DpllError, Message, Monitor, OwnerCtx, PinId, PinOps,
        PinProperties, PinType, Protocol, Registry, RegistryConfig, Response,
    };
}
