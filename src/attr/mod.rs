//! Attribute store: cached device and pin configuration with validity tracking
//!
//! Every optional field of a record has one bit in an [`AttrMask`]. A write
//! sets the value and its bit together; a read of a field whose bit is clear
//! fails with [`DpllError::NotSet`](crate::error::DpllError::NotSet).

mod device;
mod id;
mod pin;


pub use device::DeviceAttrs;
pub use id::{AttrId, AttrMask};
pub use pin::PinAttrs;

use crate::error::{DpllError, Result};

/// Copy a whole record, failing if either side is absent
///
/// # Errors
///
/// Returns [`DpllError::InvalidArgument`] if `dst` or `src` is `None`.
pub fn copy<T: Clone>(dst: Option<&mut T>, src: Option<&T>) -> Result<()> {
    match (dst, src) {
        (Some(dst), Some(src)) => {
            dst.clone_from(src);
            Ok(())
        }
        _ => Err(DpllError::invalid("attr", "copy needs both source and destination")),
    }
}
