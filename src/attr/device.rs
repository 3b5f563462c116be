use super::{AttrId, AttrMask};
use crate::error::{DpllError, Result};
use crate::types::{LockStatus, Mode, ModeSet};

/// Cached device attributes with per-field validity
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceAttrs {
    valid: AttrMask,
    mode: Option<Mode>,
    modes_supported: ModeSet,
    lock_status: Option<LockStatus>,
    temp: i32,
    source_pin_idx: u32,
}

impl DeviceAttrs {
    /// Ids a device record can hold, in wire order
    pub const FIELDS: &'static [AttrId] = &[
        AttrId::Mode,
        AttrId::ModeSupported,
        AttrId::LockStatus,
        AttrId::Temp,
        AttrId::SourcePinIdx,
    ];

    /// Create an all-invalid record
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset every field to invalid
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Overwrite this record with `src`
    pub fn copy_from(&mut self, src: &Self) {
        self.clone_from(src);
    }

    /// Check whether a field has been set
    #[must_use]
    pub fn is_valid(&self, id: AttrId) -> bool {
        Self::FIELDS.contains(&id) && self.valid.contains(id)
    }

    /// Like [`is_valid`](Self::is_valid) for a raw numeric id
    #[must_use]
    pub fn is_valid_raw(&self, raw: u16) -> bool {
        AttrId::from_raw(raw).is_some_and(|id| self.is_valid(id))
    }

    /// True if no field is valid
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.valid.is_empty()
    }

    /// Valid fields in wire order
    pub fn iter_valid(&self) -> impl Iterator<Item = AttrId> + '_ {
        Self::FIELDS.iter().copied().filter(|id| self.valid.contains(*id))
    }

    fn require(&self, id: AttrId) -> Result<()> {
        if self.valid.contains(id) {
            Ok(())
        } else {
            Err(DpllError::NotSet { attr: id })
        }
    }

    /// Set the working mode
    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = Some(mode);
        self.valid.insert(AttrId::Mode);
    }

    /// Working mode
    ///
    /// # Errors
    ///
    /// Returns [`DpllError::NotSet`] if the mode was never set.
    pub fn mode(&self) -> Result<Mode> {
        self.mode.ok_or(DpllError::NotSet { attr: AttrId::Mode })
    }

    /// Add one supported mode
    pub fn add_mode_supported(&mut self, mode: Mode) {
        self.modes_supported.insert(mode);
        self.valid.insert(AttrId::ModeSupported);
    }

    /// Replace the supported mode set
    pub fn set_modes_supported(&mut self, modes: ModeSet) {
        self.modes_supported = modes;
        self.valid.insert(AttrId::ModeSupported);
    }

    /// Supported modes
    ///
    /// # Errors
    ///
    /// Returns [`DpllError::NotSet`] if no supported mode was recorded.
    pub fn modes_supported(&self) -> Result<ModeSet> {
        self.require(AttrId::ModeSupported)?;
        Ok(self.modes_supported)
    }

    /// Whether `mode` is in the recorded supported set
    #[must_use]
    pub fn mode_supported(&self, mode: Mode) -> bool {
        self.valid.contains(AttrId::ModeSupported) && self.modes_supported.contains(mode)
    }

    /// Set the lock status
    pub fn set_lock_status(&mut self, status: LockStatus) {
        self.lock_status = Some(status);
        self.valid.insert(AttrId::LockStatus);
    }

    /// Lock status
    ///
    /// # Errors
    ///
    /// Returns [`DpllError::NotSet`] if the lock status was never set.
    pub fn lock_status(&self) -> Result<LockStatus> {
        self.lock_status.ok_or(DpllError::NotSet {
            attr: AttrId::LockStatus,
        })
    }

    /// Set the temperature (milli-degrees C)
    pub fn set_temp(&mut self, temp: i32) {
        self.temp = temp;
        self.valid.insert(AttrId::Temp);
    }

    /// Temperature (milli-degrees C)
    ///
    /// # Errors
    ///
    /// Returns [`DpllError::NotSet`] if the temperature was never set.
    pub fn temp(&self) -> Result<i32> {
        self.require(AttrId::Temp)?;
        Ok(self.temp)
    }

    /// Set the selected source pin index
    pub fn set_source_pin_idx(&mut self, idx: u32) {
        self.source_pin_idx = idx;
        self.valid.insert(AttrId::SourcePinIdx);
    }

    /// Selected source pin index
    ///
    /// # Errors
    ///
    /// Returns [`DpllError::NotSet`] if no source was recorded.
    pub fn source_pin_idx(&self) -> Result<u32> {
        self.require(AttrId::SourcePinIdx)?;
        Ok(self.source_pin_idx)
    }

    fn differs(&self, other: &Self, id: AttrId) -> bool {
        match id {
            AttrId::Mode => self.mode != other.mode,
            AttrId::ModeSupported => self.modes_supported != other.modes_supported,
            AttrId::LockStatus => self.lock_status != other.lock_status,
            AttrId::Temp => self.temp != other.temp,
            AttrId::SourcePinIdx => self.source_pin_idx != other.source_pin_idx,
            _ => false,
        }
    }

    fn take_field(&mut self, src: &Self, id: AttrId) {
        match id {
            AttrId::Mode => self.mode = src.mode,
            AttrId::ModeSupported => self.modes_supported = src.modes_supported,
            AttrId::LockStatus => self.lock_status = src.lock_status,
            AttrId::Temp => self.temp = src.temp,
            AttrId::SourcePinIdx => self.source_pin_idx = src.source_pin_idx,
            _ => return,
        }
        self.valid.insert(id);
    }

    /// Fields valid in `new` that are invalid in `old` or hold a different value
    #[must_use]
    pub fn delta(new: &Self, old: &Self) -> Self {
        let mut delta = Self::new();
        for id in new.iter_valid() {
            if !old.valid.contains(id) || new.differs(old, id) {
                delta.take_field(new, id);
            }
        }
        delta
    }

    /// Overwrite the fields that are valid in `src`
    pub fn apply(&mut self, src: &Self) {
        for id in src.iter_valid() {
            self.take_field(src, id);
        }
    }
}
