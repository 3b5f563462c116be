//! Client protocol: messages, request handling and notifications
//!
//! Requests arrive as [`Message`]s carrying typed [`Attribute`]s. The
//! [`Protocol`] handler resolves the addressed device, reads or changes it
//! through the registry, and answers with a [`Response`]. State changes are
//! broadcast on the registry's [`EventBus`] to the [`MONITOR_GROUP`].

mod encode;
pub mod events;
mod handler;
pub mod message;
pub mod request;
mod response;


pub use events::{ChangeType, Event, EventBus, EventFilter, MONITOR_GROUP};
pub use handler::Protocol;
pub use message::{
    ATTR_HEADER_LEN, AttrValue, Attribute, Command, MESSAGE_HEADER_LEN, Message, MessageWriter,
};
pub use request::{DeviceSelector, DeviceSetRequest, DumpFilter, PinSetRequest, Request};
pub use response::Response;
