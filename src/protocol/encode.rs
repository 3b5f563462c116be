//! Attribute encoders shared by replies and notifications

use super::message::{AttrValue, Attribute};
use crate::attr::{AttrId, DeviceAttrs, PinAttrs};
use crate::types::{DeviceInfo, PinId, PinInfo};

/// Id and name, the attributes every device reply starts with
pub(crate) fn device_header(info: &DeviceInfo) -> Vec<Attribute> {
    vec![
        Attribute::u32(AttrId::DeviceId, info.id.get()),
        Attribute::string(AttrId::DeviceName, info.name.clone()),
    ]
}

/// Class and clock id, reported with the status fields
pub(crate) fn device_identity(info: &DeviceInfo) -> Vec<Attribute> {
    vec![
        Attribute::u32(AttrId::DeviceClass, info.class().as_u32()),
        Attribute::u64(AttrId::ClockId, info.identity.clock_id),
    ]
}

/// Valid device status fields; set-valued fields repeat their attribute
pub(crate) fn device_status(attrs: &DeviceAttrs) -> Vec<Attribute> {
    let mut out = Vec::new();
    if let Ok(mode) = attrs.mode() {
        out.push(Attribute::u32(AttrId::Mode, mode.as_u32()));
    }
    if let Ok(modes) = attrs.modes_supported() {
        out.extend(
            modes
                .iter()
                .map(|m| Attribute::u32(AttrId::ModeSupported, m.as_u32())),
        );
    }
    if let Ok(status) = attrs.lock_status() {
        out.push(Attribute::u32(AttrId::LockStatus, status.as_u32()));
    }
    if let Ok(temp) = attrs.temp() {
        out.push(Attribute::s32(AttrId::Temp, temp));
    }
    if let Ok(idx) = attrs.source_pin_idx() {
        out.push(Attribute::u32(AttrId::SourcePinIdx, idx));
    }
    out
}

/// Valid pin fields
pub(crate) fn pin_fields(attrs: &PinAttrs) -> Vec<Attribute> {
    let mut out = Vec::new();
    if let Ok(kind) = attrs.kind() {
        out.push(Attribute::u32(AttrId::PinType, kind.as_u32()));
    }
    if let Ok(signal_type) = attrs.signal_type() {
        out.push(Attribute::u32(AttrId::PinSignalType, signal_type.as_u32()));
    }
    if let Ok(types) = attrs.signal_types_supported() {
        out.extend(
            types
                .iter()
                .map(|t| Attribute::u32(AttrId::PinSignalTypeSupported, t.as_u32())),
        );
    }
    if let Ok(freq) = attrs.custom_freq() {
        out.push(Attribute::u32(AttrId::PinCustomFreq, freq));
    }
    if let Ok(states) = attrs.state() {
        out.extend(
            states
                .iter()
                .map(|s| Attribute::u32(AttrId::PinState, s.as_u32())),
        );
    }
    if let Ok(states) = attrs.states_supported() {
        out.extend(
            states
                .iter()
                .map(|s| Attribute::u32(AttrId::PinStateSupported, s.as_u32())),
        );
    }
    if let Ok(prio) = attrs.prio() {
        out.push(Attribute::u32(AttrId::PinPrio, prio));
    }
    if let Ok(netifindex) = attrs.netifindex() {
        out.push(Attribute::u32(AttrId::PinNetifindex, netifindex));
    }
    if let Ok(direction) = attrs.direction() {
        out.push(Attribute::u32(AttrId::PinDirection, direction.as_u32()));
    }
    out
}

/// Nested pin entry used in device replies
pub(crate) fn pin_entry(info: &PinInfo, parent: Option<PinId>, attrs: &PinAttrs) -> Attribute {
    let mut nest = vec![
        Attribute::u32(AttrId::PinIdx, info.id.get()),
        Attribute::string(AttrId::PinLabel, info.label.clone()),
    ];
    if let Some(parent) = parent {
        nest.push(Attribute::u32(AttrId::PinParentIdx, parent.get()));
    }
    nest.extend(pin_fields(attrs));
    if let Some(rclk) = &info.rclk_device {
        nest.push(Attribute::string(AttrId::PinRclkDevice, rclk.clone()));
    }
    Attribute::new(AttrId::Pin, AttrValue::Nested(nest))
}
