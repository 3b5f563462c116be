use std::sync::Arc;

use super::encode;
use super::message::{Command, Message, MessageWriter};
use super::request::{DumpFilter, Request};
use super::response::Response;
use crate::dispatch::{device_snapshot, pin_snapshot};
use crate::error::Result;
use crate::registry::{Device, Registry};

/// Answers client requests against a registry
#[derive(Debug, Clone)]
pub struct Protocol {
    registry: Arc<Registry>,
}

impl Protocol {
    /// Create a handler for `registry`
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Registry this handler serves
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Handle one request message
    ///
    /// Every failure is turned into an error response; nothing is partially
    /// replied.
    pub async fn handle(&self, message: &Message) -> Response {
        match self.dispatch(message).await {
            Ok(replies) => Response::Reply(replies),
            Err(e) => {
                tracing::debug!("{} failed: {}", message.command, e);
                Response::from_error(&e)
            }
        }
    }

    async fn dispatch(&self, message: &Message) -> Result<Vec<Message>> {
        self.registry.check_live()?;
        let request = Request::parse(message)?;
        let selector = request.selector();

        if let Request::DeviceGet { filter, .. } = &request {
            if selector.is_empty() {
                return self.dump(*filter).await;
            }
        }
        let device = self
            .registry
            .resolve(selector.id, selector.name.as_deref())
            .await?;

        match request {
            Request::DeviceGet { filter, .. } => Ok(vec![self.describe(&device, filter).await?]),
            Request::DeviceSet { set, .. } => {
                self.registry.set_device_on(&device, &set).await?;
                Ok(Vec::new())
            }
            Request::PinSet { pin, set, .. } => {
                self.registry.set_pin_on(&device, pin, &set).await?;
                Ok(Vec::new())
            }
        }
    }

    /// One reply per registered device, in id order
    async fn dump(&self, filter: DumpFilter) -> Result<Vec<Message>> {
        let mut replies = Vec::new();
        for device in self.registry.registered_devices().await {
            replies.push(self.describe(&device, filter).await?);
        }
        Ok(replies)
    }

    /// Fresh description of one device, read under its lock
    async fn describe(&self, device: &Device, filter: DumpFilter) -> Result<Message> {
        let limit = self.registry.config().max_message_size;
        let guard = device.lock(self.registry.config().lock_timeout).await?;

        let mut writer = MessageWriter::new(Command::DeviceGet, limit);
        writer.put_all(encode::device_header(&device.info))?;
        if filter.contains(DumpFilter::STATUS) {
            let attrs = device_snapshot(&device.info, &device.registration).await?;
            writer.put_all(encode::device_identity(&device.info))?;
            writer.put_all(encode::device_status(&attrs))?;
        }
        if filter.contains(DumpFilter::PINS) {
            for member in guard.pins.values() {
                let attrs = pin_snapshot(&member.call(&device.info), &member.registration).await?;
                writer.put(encode::pin_entry(&member.info, member.parent, &attrs))?;
            }
        }
        Ok(writer.finish())
    }
}
