use super::message::Message;
use crate::attr::AttrId;
use crate::error::DpllError;

/// Outcome of one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Success; queries carry one message per device, sets carry none
    Reply(Vec<Message>),
    /// Failure
    Error {
        /// Negative errno-style code
        code: i32,
        /// Human readable reason
        message: String,
        /// Attribute the failure is about, when known
        attr: Option<AttrId>,
    },
}

impl Response {
    /// Error response for `err`
    #[must_use]
    pub fn from_error(err: &DpllError) -> Self {
        Response::Error {
            code: err.errno(),
            message: err.to_string(),
            attr: offending_attr(err),
        }
    }

    /// Whether this is an error response
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error { .. })
    }

    /// Error code, or 0 for a reply
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            Response::Reply(_) => 0,
            Response::Error { code, .. } => *code,
        }
    }

    /// Reply messages; empty for an error
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        match self {
            Response::Reply(messages) => messages,
            Response::Error { .. } => &[],
        }
    }
}

/// Attribute an error points at
pub(crate) fn offending_attr(err: &DpllError) -> Option<AttrId> {
    match err {
        DpllError::NotSet { attr } => Some(*attr),
        DpllError::InvalidArgument { name, .. } => AttrId::from_name(name),
        DpllError::NotSupported { op } => match *op {
            "mode_set" | "mode_supported" => Some(AttrId::Mode),
            "select" => Some(AttrId::SourcePinIdx),
            "signal_type_set" | "signal_type_supported" => Some(AttrId::PinSignalType),
            "frequency_set" => Some(AttrId::PinCustomFreq),
            "state_set" | "state_supported" => Some(AttrId::PinState),
            "prio_set" => Some(AttrId::PinPrio),
            _ => None,
        },
        _ => None,
    }
}
