//! Mock vendor driver for testing purposes.
//!
//! `MockDriver` simulates one board carrying any number of DPLLs and pins. It
//! implements both [`DeviceOps`] and [`PinOps`], keeps its "hardware" state
//! behind a [`CallbackLock`] the way a real driver guards its registers, and
//! lets tests change that state underneath the registry, inject failures and
//! inspect the callbacks that were made.

use std::collections::BTreeMap;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;

use crate::dispatch::{DeviceOps, OwnerCtx, PinCall, PinOps};
use crate::error::{DpllError, Result};
use crate::sync::CallbackLock;
use crate::types::{
    DeviceId, DeviceInfo, LockStatus, Mode, ModeSet, PinCaps, PinDirection, PinId, PinState,
    PinStateSet, SignalType, SignalTypeSet,
};

/// Simulated state of one DPLL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockDpll {
    /// Working mode
    pub mode: Mode,
    /// Modes the hardware accepts
    pub modes_supported: ModeSet,
    /// Lock status
    pub lock_status: LockStatus,
    /// Temperature (milli-degrees C)
    pub temp: i32,
    /// Selected source pin
    pub source_pin_idx: Option<u32>,
}

impl Default for MockDpll {
    fn default() -> Self {
        Self {
            mode: Mode::Automatic,
            modes_supported: ModeSet::from_slice(&[Mode::Automatic, Mode::Holdover, Mode::Freerun]),
            lock_status: LockStatus::Unlocked,
            temp: 35_000,
            source_pin_idx: None,
        }
    }
}

/// Simulated state of one pin, shared by every device it is wired to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockPin {
    /// Direction
    pub direction: PinDirection,
    /// Signal type
    pub signal_type: SignalType,
    /// Signal types the hardware accepts
    pub signal_types_supported: SignalTypeSet,
    /// Custom frequency (Hz)
    pub frequency: u32,
    /// Asserted states
    pub state: PinStateSet,
    /// States the hardware accepts
    pub states_supported: PinStateSet,
    /// Priority per device
    pub prio: BTreeMap<DeviceId, u32>,
    /// Network interface, if the pin has one
    pub netifindex: Option<u32>,
}

impl MockPin {
    /// Default priority reported for a device with no explicit value
    pub const DEFAULT_PRIO: u32 = 10;
}

impl Default for MockPin {
    fn default() -> Self {
        Self {
            direction: PinDirection::Source,
            signal_type: SignalType::OnePps,
            signal_types_supported: SignalType::ALL.iter().copied().collect(),
            frequency: 0,
            state: PinStateSet::from_slice(&[PinState::Disconnected, PinState::Selectable]),
            states_supported: PinStateSet::from_slice(&[
                PinState::Connected,
                PinState::Disconnected,
                PinState::Selectable,
            ]),
            prio: BTreeMap::new(),
            netifindex: None,
        }
    }
}

#[derive(Debug, Default)]
struct Board {
    dplls: BTreeMap<DeviceId, MockDpll>,
    pins: BTreeMap<PinId, MockPin>,
    calls: Vec<&'static str>,
    fail: BTreeMap<&'static str, String>,
}

impl Board {
    fn enter(&mut self, op: &'static str) -> Result<()> {
        self.calls.push(op);
        match self.fail.get(op) {
            Some(message) => Err(DpllError::Hardware {
                op,
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }

    fn dpll(&mut self, id: DeviceId) -> &mut MockDpll {
        self.dplls.entry(id).or_default()
    }

    fn pin(&mut self, id: PinId) -> &mut MockPin {
        self.pins.entry(id).or_default()
    }
}

/// A mock driver implementing every device and pin callback
#[derive(Debug)]
pub struct MockDriver {
    board: CallbackLock<Board>,
    caps: RwLock<BTreeMap<PinId, PinCaps>>,
}

impl MockDriver {
    /// Create a driver with a generous callback lock budget
    #[must_use]
    pub fn new() -> Self {
        Self::with_lock_budget(1000, Duration::from_micros(100))
    }

    /// Create a driver whose callbacks give up after `attempts` tries
    #[must_use]
    pub fn with_lock_budget(attempts: u32, backoff: Duration) -> Self {
        Self {
            board: CallbackLock::new(Board::default(), attempts, backoff),
            caps: RwLock::new(BTreeMap::new()),
        }
    }

    /// Current simulated state of a DPLL
    pub async fn dpll(&self, id: DeviceId) -> MockDpll {
        self.board.lock().await.dpll(id).clone()
    }

    /// Change a DPLL underneath the registry
    pub async fn update_dpll(&self, id: DeviceId, f: impl FnOnce(&mut MockDpll)) {
        f(self.board.lock().await.dpll(id));
    }

    /// Current simulated state of a pin
    pub async fn pin(&self, id: PinId) -> MockPin {
        self.board.lock().await.pin(id).clone()
    }

    /// Change a pin underneath the registry
    pub async fn update_pin(&self, id: PinId, f: impl FnOnce(&mut MockPin)) {
        f(self.board.lock().await.pin(id));
    }

    /// Restrict what registrations of `pin` report as changeable (default: all)
    pub fn set_caps(&self, pin: PinId, caps: PinCaps) {
        match self.caps.write() {
            Ok(mut map) => map.insert(pin, caps),
            Err(poisoned) => poisoned.into_inner().insert(pin, caps),
        };
    }

    /// Shorthand for changing a DPLL's lock status
    pub async fn set_lock_status(&self, id: DeviceId, status: LockStatus) {
        self.update_dpll(id, |d| d.lock_status = status).await;
    }

    /// Make every call to `op` fail with a hardware error
    pub async fn fail(&self, op: &'static str, message: impl Into<String>) {
        self.board.lock().await.fail.insert(op, message.into());
    }

    /// Stop failing `op`
    pub async fn heal(&self, op: &'static str) {
        self.board.lock().await.fail.remove(op);
    }

    /// Names of the callbacks made so far, in order
    pub async fn calls(&self) -> Vec<&'static str> {
        self.board.lock().await.calls.clone()
    }

    /// Forget recorded callbacks
    pub async fn clear_calls(&self) {
        self.board.lock().await.calls.clear();
    }

    /// Hold the driver lock for `duration`, as a teardown path would
    pub async fn hold_for(&self, duration: Duration) {
        let _board = self.board.lock().await;
        tokio::time::sleep(duration).await;
    }

    /// Make in-flight and future callbacks abort
    pub fn deactivate(&self) {
        self.board.deactivate();
    }

    /// Accept callbacks again
    pub fn activate(&self) {
        self.board.activate();
    }
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceOps for MockDriver {
    async fn mode_get(&self, device: &DeviceInfo, _ctx: &OwnerCtx) -> Result<Mode> {
        let mut board = self.board.acquire().await?;
        board.enter("mode_get")?;
        Ok(board.dpll(device.id).mode)
    }

    async fn mode_set(&self, device: &DeviceInfo, _ctx: &OwnerCtx, mode: Mode) -> Result<()> {
        let mut board = self.board.acquire().await?;
        board.enter("mode_set")?;
        board.dpll(device.id).mode = mode;
        Ok(())
    }

    async fn mode_supported(&self, device: &DeviceInfo, _ctx: &OwnerCtx, mode: Mode) -> Result<bool> {
        let mut board = self.board.acquire().await?;
        board.enter("mode_supported")?;
        Ok(board.dpll(device.id).modes_supported.contains(mode))
    }

    async fn lock_status_get(&self, device: &DeviceInfo, _ctx: &OwnerCtx) -> Result<LockStatus> {
        let mut board = self.board.acquire().await?;
        board.enter("lock_status_get")?;
        Ok(board.dpll(device.id).lock_status)
    }

    async fn temp_get(&self, device: &DeviceInfo, _ctx: &OwnerCtx) -> Result<i32> {
        let mut board = self.board.acquire().await?;
        board.enter("temp_get")?;
        Ok(board.dpll(device.id).temp)
    }

    async fn source_pin_idx_get(&self, device: &DeviceInfo, _ctx: &OwnerCtx) -> Result<u32> {
        let mut board = self.board.acquire().await?;
        board.enter("source_pin_idx_get")?;
        board
            .dpll(device.id)
            .source_pin_idx
            .ok_or(DpllError::NotSupported {
                op: "source_pin_idx_get",
            })
    }
}

#[async_trait]
impl PinOps for MockDriver {
    fn capabilities(&self, call: &PinCall<'_>, _ctx: &OwnerCtx) -> PinCaps {
        let caps = match self.caps.read() {
            Ok(map) => map.get(&call.pin.id).copied(),
            Err(poisoned) => poisoned.into_inner().get(&call.pin.id).copied(),
        };
        caps.unwrap_or(PinCaps::ALL)
    }

    async fn direction_get(&self, call: &PinCall<'_>, _ctx: &OwnerCtx) -> Result<PinDirection> {
        let mut board = self.board.acquire().await?;
        board.enter("direction_get")?;
        Ok(board.pin(call.pin.id).direction)
    }

    async fn signal_type_get(&self, call: &PinCall<'_>, _ctx: &OwnerCtx) -> Result<SignalType> {
        let mut board = self.board.acquire().await?;
        board.enter("signal_type_get")?;
        Ok(board.pin(call.pin.id).signal_type)
    }

    async fn signal_type_set(
        &self,
        call: &PinCall<'_>,
        _ctx: &OwnerCtx,
        signal_type: SignalType,
    ) -> Result<()> {
        let mut board = self.board.acquire().await?;
        board.enter("signal_type_set")?;
        board.pin(call.pin.id).signal_type = signal_type;
        Ok(())
    }

    async fn signal_type_supported(
        &self,
        call: &PinCall<'_>,
        _ctx: &OwnerCtx,
        signal_type: SignalType,
    ) -> Result<bool> {
        let mut board = self.board.acquire().await?;
        board.enter("signal_type_supported")?;
        Ok(board.pin(call.pin.id).signal_types_supported.contains(signal_type))
    }

    async fn frequency_get(&self, call: &PinCall<'_>, _ctx: &OwnerCtx) -> Result<u32> {
        let mut board = self.board.acquire().await?;
        board.enter("frequency_get")?;
        Ok(board.pin(call.pin.id).frequency)
    }

    async fn frequency_set(&self, call: &PinCall<'_>, _ctx: &OwnerCtx, freq: u32) -> Result<()> {
        let mut board = self.board.acquire().await?;
        board.enter("frequency_set")?;
        board.pin(call.pin.id).frequency = freq;
        Ok(())
    }

    async fn state_get(&self, call: &PinCall<'_>, _ctx: &OwnerCtx) -> Result<PinStateSet> {
        let mut board = self.board.acquire().await?;
        board.enter("state_get")?;
        Ok(board.pin(call.pin.id).state)
    }

    async fn state_set(&self, call: &PinCall<'_>, _ctx: &OwnerCtx, state: PinState) -> Result<()> {
        let mut board = self.board.acquire().await?;
        board.enter("state_set")?;
        let pin = board.pin(call.pin.id);
        match state {
            PinState::Connected => pin.state.remove(PinState::Disconnected),
            PinState::Disconnected => pin.state.remove(PinState::Connected),
            _ => {}
        }
        pin.state.insert(state);
        Ok(())
    }

    async fn state_supported(
        &self,
        call: &PinCall<'_>,
        _ctx: &OwnerCtx,
        state: PinState,
    ) -> Result<bool> {
        let mut board = self.board.acquire().await?;
        board.enter("state_supported")?;
        Ok(board.pin(call.pin.id).states_supported.contains(state))
    }

    async fn prio_get(&self, call: &PinCall<'_>, _ctx: &OwnerCtx) -> Result<u32> {
        let mut board = self.board.acquire().await?;
        board.enter("prio_get")?;
        let pin = board.pin(call.pin.id);
        Ok(pin
            .prio
            .get(&call.device.id)
            .copied()
            .unwrap_or(MockPin::DEFAULT_PRIO))
    }

    async fn prio_set(&self, call: &PinCall<'_>, _ctx: &OwnerCtx, prio: u32) -> Result<()> {
        let mut board = self.board.acquire().await?;
        board.enter("prio_set")?;
        board.pin(call.pin.id).prio.insert(call.device.id, prio);
        Ok(())
    }

    async fn netifindex_get(&self, call: &PinCall<'_>, _ctx: &OwnerCtx) -> Result<u32> {
        let mut board = self.board.acquire().await?;
        board.enter("netifindex_get")?;
        board.pin(call.pin.id).netifindex.ok_or(DpllError::NotSupported {
            op: "netifindex_get",
        })
    }

    async fn select(&self, call: &PinCall<'_>, _ctx: &OwnerCtx) -> Result<()> {
        let mut board = self.board.acquire().await?;
        board.enter("select")?;
        board.dpll(call.device.id).source_pin_idx = Some(call.pin.id.get());
        Ok(())
    }
}
