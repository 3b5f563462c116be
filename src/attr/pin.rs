use super::{AttrId, AttrMask};
use crate::error::{DpllError, Result};
use crate::types::{
    PIN_PRIO_LOWEST, PinDirection, PinState, PinStateSet, PinType, SignalType, SignalTypeSet,
};

/// Cached pin attributes with per-field validity
///
/// The state field is a set: several state bits may be asserted at once, but
/// `Connected` and `Disconnected` never coexist.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PinAttrs {
    valid: AttrMask,
    kind: Option<PinType>,
    signal_type: Option<SignalType>,
    signal_types_supported: SignalTypeSet,
    custom_freq: u32,
    state: PinStateSet,
    states_supported: PinStateSet,
    prio: u32,
    netifindex: u32,
    direction: Option<PinDirection>,
}

impl PinAttrs {
    /// Ids a pin record can hold, in wire order
    pub const FIELDS: &'static [AttrId] = &[
        AttrId::PinType,
        AttrId::PinSignalType,
        AttrId::PinSignalTypeSupported,
        AttrId::PinCustomFreq,
        AttrId::PinState,
        AttrId::PinStateSupported,
        AttrId::PinPrio,
        AttrId::PinNetifindex,
        AttrId::PinDirection,
    ];

    /// Fields that are identical on every device sharing a pin
    pub const COMMON: &'static [AttrId] = &[
        AttrId::PinType,
        AttrId::PinSignalType,
        AttrId::PinCustomFreq,
        AttrId::PinState,
    ];

    /// Fields that belong to a single (device, pin) registration
    pub const EXCLUSIVE: &'static [AttrId] = &[AttrId::PinPrio];

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

    /// Set the pin type
    pub fn set_kind(&mut self, kind: PinType) {
        self.kind = Some(kind);
        self.valid.insert(AttrId::PinType);
    }

    /// Pin type
    ///
    /// # Errors
    ///
    /// Returns [`DpllError::NotSet`] if the type was never set.
    pub fn kind(&self) -> Result<PinType> {
        self.kind.ok_or(DpllError::NotSet {
            attr: AttrId::PinType,
        })
    }

    /// Set the signal type
    pub fn set_signal_type(&mut self, signal_type: SignalType) {
        self.signal_type = Some(signal_type);
        self.valid.insert(AttrId::PinSignalType);
    }

    /// Signal type
    ///
    /// # Errors
    ///
    /// Returns [`DpllError::NotSet`] if the signal type was never set.
    pub fn signal_type(&self) -> Result<SignalType> {
        self.signal_type.ok_or(DpllError::NotSet {
            attr: AttrId::PinSignalType,
        })
    }

    /// Add one supported signal type
    pub fn add_signal_type_supported(&mut self, signal_type: SignalType) {
        self.signal_types_supported.insert(signal_type);
        self.valid.insert(AttrId::PinSignalTypeSupported);
    }

    /// Replace the supported signal type set
    pub fn set_signal_types_supported(&mut self, types: SignalTypeSet) {
        self.signal_types_supported = types;
        self.valid.insert(AttrId::PinSignalTypeSupported);
    }

    /// Supported signal types
    ///
    /// # Errors
    ///
    /// Returns [`DpllError::NotSet`] if none were recorded.
    pub fn signal_types_supported(&self) -> Result<SignalTypeSet> {
        self.require(AttrId::PinSignalTypeSupported)?;
        Ok(self.signal_types_supported)
    }

    /// Whether `signal_type` is in the recorded supported set
    #[must_use]
    pub fn signal_type_supported(&self, signal_type: SignalType) -> bool {
        self.valid.contains(AttrId::PinSignalTypeSupported)
            && self.signal_types_supported.contains(signal_type)
    }

    /// Set the custom frequency (Hz)
    pub fn set_custom_freq(&mut self, freq: u32) {
        self.custom_freq = freq;
        self.valid.insert(AttrId::PinCustomFreq);
    }

    /// Custom frequency (Hz)
    ///
    /// # Errors
    ///
    /// Returns [`DpllError::NotSet`] if the frequency was never set.
    pub fn custom_freq(&self) -> Result<u32> {
        self.require(AttrId::PinCustomFreq)?;
        Ok(self.custom_freq)
    }

    /// Assert one state bit
    ///
    /// # Errors
    ///
    /// Returns [`DpllError::InvalidArgument`] when asserting `Connected` while
    /// `Disconnected` is set, or the reverse.
    pub fn set_state(&mut self, state: PinState) -> Result<()> {
        let conflict = match state {
            PinState::Connected => Some(PinState::Disconnected),
            PinState::Disconnected => Some(PinState::Connected),
            _ => None,
        };
        if let Some(other) = conflict {
            if self.state.contains(other) {
                return Err(DpllError::invalid(
                    AttrId::PinState.as_str(),
                    format!("{state} conflicts with asserted {other}"),
                ));
            }
        }
        self.state.insert(state);
        self.valid.insert(AttrId::PinState);
        Ok(())
    }

    /// Replace the whole state set
    ///
    /// # Errors
    ///
    /// Returns [`DpllError::InvalidArgument`] if `states` holds both
    /// `Connected` and `Disconnected`.
    pub fn set_states(&mut self, states: PinStateSet) -> Result<()> {
        if states.contains(PinState::Connected) && states.contains(PinState::Disconnected) {
            return Err(DpllError::invalid(
                AttrId::PinState.as_str(),
                "connected and disconnected are exclusive",
            ));
        }
        self.state = states;
        self.valid.insert(AttrId::PinState);
        Ok(())
    }

    /// Asserted states
    ///
    /// # Errors
    ///
    /// Returns [`DpllError::NotSet`] if no state was asserted.
    pub fn state(&self) -> Result<PinStateSet> {
        self.require(AttrId::PinState)?;
        Ok(self.state)
    }

    /// Whether `state` is asserted
    #[must_use]
    pub fn state_enabled(&self, state: PinState) -> bool {
        self.valid.contains(AttrId::PinState) && self.state.contains(state)
    }

    /// Add one supported state
    pub fn add_state_supported(&mut self, state: PinState) {
        self.states_supported.insert(state);
        self.valid.insert(AttrId::PinStateSupported);
    }

    /// Replace the supported state set
    pub fn set_states_supported(&mut self, states: PinStateSet) {
        self.states_supported = states;
        self.valid.insert(AttrId::PinStateSupported);
    }

    /// Supported states
    ///
    /// # Errors
    ///
    /// Returns [`DpllError::NotSet`] if none were recorded.
    pub fn states_supported(&self) -> Result<PinStateSet> {
        self.require(AttrId::PinStateSupported)?;
        Ok(self.states_supported)
    }

    /// Whether `state` is in the recorded supported set
    #[must_use]
    pub fn state_supported(&self, state: PinState) -> bool {
        self.valid.contains(AttrId::PinStateSupported) && self.states_supported.contains(state)
    }

    /// Set the priority; 0 is the highest
    ///
    /// # Errors
    ///
    /// Returns [`DpllError::InvalidArgument`] if `prio` is above
    /// [`PIN_PRIO_LOWEST`].
    pub fn set_prio(&mut self, prio: u32) -> Result<()> {
        if prio > PIN_PRIO_LOWEST {
            return Err(DpllError::invalid(
                AttrId::PinPrio.as_str(),
                format!("{prio} above lowest priority {PIN_PRIO_LOWEST}"),
            ));
        }
        self.prio = prio;
        self.valid.insert(AttrId::PinPrio);
        Ok(())
    }

    /// Priority
    ///
    /// # Errors
    ///
    /// Returns [`DpllError::NotSet`] if the priority was never set.
    pub fn prio(&self) -> Result<u32> {
        self.require(AttrId::PinPrio)?;
        Ok(self.prio)
    }

    /// Set the network interface index
    pub fn set_netifindex(&mut self, netifindex: u32) {
        self.netifindex = netifindex;
        self.valid.insert(AttrId::PinNetifindex);
    }

    /// Network interface index
    ///
    /// # Errors
    ///
    /// Returns [`DpllError::NotSet`] if no interface was recorded.
    pub fn netifindex(&self) -> Result<u32> {
        self.require(AttrId::PinNetifindex)?;
        Ok(self.netifindex)
    }

    /// Set the direction
    pub fn set_direction(&mut self, direction: PinDirection) {
        self.direction = Some(direction);
        self.valid.insert(AttrId::PinDirection);
    }

    /// Direction
    ///
    /// # Errors
    ///
    /// Returns [`DpllError::NotSet`] if the direction was never set.
    pub fn direction(&self) -> Result<PinDirection> {
        self.direction.ok_or(DpllError::NotSet {
            attr: AttrId::PinDirection,
        })
    }

    fn differs(&self, other: &Self, id: AttrId) -> bool {
        match id {
            AttrId::PinType => self.kind != other.kind,
            AttrId::PinSignalType => self.signal_type != other.signal_type,
            AttrId::PinSignalTypeSupported => {
                self.signal_types_supported != other.signal_types_supported
            }
            AttrId::PinCustomFreq => self.custom_freq != other.custom_freq,
            AttrId::PinState => self.state != other.state,
            AttrId::PinStateSupported => self.states_supported != other.states_supported,
            AttrId::PinPrio => self.prio != other.prio,
            AttrId::PinNetifindex => self.netifindex != other.netifindex,
            AttrId::PinDirection => self.direction != other.direction,
            _ => false,
        }
    }

    fn take_field(&mut self, src: &Self, id: AttrId) {
        match id {
            AttrId::PinType => self.kind = src.kind,
            AttrId::PinSignalType => self.signal_type = src.signal_type,
            AttrId::PinSignalTypeSupported => {
                self.signal_types_supported = src.signal_types_supported;
            }
            AttrId::PinCustomFreq => self.custom_freq = src.custom_freq,
            AttrId::PinState => self.state = src.state,
            AttrId::PinStateSupported => self.states_supported = src.states_supported,
            AttrId::PinPrio => self.prio = src.prio,
            AttrId::PinNetifindex => self.netifindex = src.netifindex,
            AttrId::PinDirection => self.direction = src.direction,
            _ => return,
        }
        self.valid.insert(id);
    }

    fn subset(reference: &Self, ids: &[AttrId]) -> (Self, bool) {
        let mut out = Self::new();
        for id in ids {
            if reference.valid.contains(*id) {
                out.take_field(reference, *id);
            }
        }
        let copied = !out.is_empty();
        (out, copied)
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

    /// The shared subset of `reference`, and whether anything was copied
    #[must_use]
    pub fn common(reference: &Self) -> (Self, bool) {
        Self::subset(reference, Self::COMMON)
    }

    /// The per-device subset of `reference`, and whether anything was copied
    #[must_use]
    pub fn exclusive(reference: &Self) -> (Self, bool) {
        Self::subset(reference, Self::EXCLUSIVE)
    }

    /// Overwrite the fields that are valid in `src`
    pub fn apply(&mut self, src: &Self) {
        for id in src.iter_valid() {
            self.take_field(src, id);
        }
    }
}
