use thiserror::Error;

use crate::attr::AttrId;

/// Errors that can occur during DPLL registry and protocol operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DpllError {
    // ===== Argument Errors =====
    /// Invalid value or handle provided
    #[error("invalid argument: {name} - {message}")]
    InvalidArgument {
        /// The name of the argument
        name: String,
        /// Description of the error
        message: String,
    },

    /// Attribute read before it was set
    #[error("attribute not set: {attr}")]
    NotSet {
        /// The attribute that was read
        attr: AttrId,
    },

    /// Object already registered
    #[error("already exists: {what}")]
    AlreadyExists {
        /// What was being registered
        what: String,
    },

    /// Object not registered
    #[error("not found: {what}")]
    NotFound {
        /// What was being looked up
        what: String,
    },

    /// Request addressed a device that does not exist
    #[error("no such device")]
    NoSuchDevice,

    // ===== Resource Errors =====
    /// Id space or table capacity exhausted
    #[error("resource exhausted: {what}")]
    ResourceExhausted {
        /// The exhausted resource
        what: String,
    },

    /// Serialized message exceeds the configured limit
    #[error("message too large: {size} bytes (limit {limit})")]
    MessageTooLarge {
        /// Size the message would have reached
        size: usize,
        /// Configured limit
        limit: usize,
    },

    // ===== Driver Errors =====
    /// Driver does not implement the operation
    #[error("operation not supported: {op}")]
    NotSupported {
        /// The callback name
        op: &'static str,
    },

    /// Driver callback failed
    #[error("hardware error in {op}: {message}")]
    Hardware {
        /// The callback name
        op: &'static str,
        /// Reason reported by the driver
        message: String,
    },

    // ===== Concurrency Errors =====
    /// Lock could not be acquired in time
    #[error("device busy")]
    Busy,

    /// Owner is tearing down; the operation was abandoned
    #[error("operation aborted, owner is shutting down")]
    Aborted,

    // ===== Lifecycle Errors =====
    /// Registry has been shut down
    #[error("registry shut down")]
    ShutDown,
}

impl DpllError {
    /// Shorthand for an [`DpllError::InvalidArgument`]
    pub fn invalid(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a [`DpllError::NotFound`]
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Shorthand for an [`DpllError::AlreadyExists`]
    pub fn exists(what: impl Into<String>) -> Self {
        Self::AlreadyExists { what: what.into() }
    }

    /// Check if this error is recoverable by retrying
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Busy)
    }

    /// Check if this error was detected before any state was touched
    #[must_use]
    pub fn is_argument_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument { .. }
                | Self::NotSet { .. }
                | Self::AlreadyExists { .. }
                | Self::NotFound { .. }
                | Self::NoSuchDevice
        )
    }

    /// Negative errno-style code carried in protocol error responses
    #[must_use]
    pub fn errno(&self) -> i32 {
        match self {
            Self::InvalidArgument { .. } | Self::NotSet { .. } => -22, // EINVAL
            Self::AlreadyExists { .. } => -17,                         // EEXIST
            Self::NotFound { .. } => -2,                               // ENOENT
            Self::NoSuchDevice => -19,                                 // ENODEV
            Self::ResourceExhausted { .. } => -12,                     // ENOMEM
            Self::MessageTooLarge { .. } => -90,                       // EMSGSIZE
            Self::NotSupported { .. } => -95,                          // EOPNOTSUPP
            Self::Hardware { .. } => -5,                               // EIO
            Self::Busy => -16,                                         // EBUSY
            Self::Aborted => -14,                                      // EFAULT
            Self::ShutDown => -108,                                    // ESHUTDOWN
        }
    }
}

/// Result type alias for DPLL operations
pub type Result<T> = std::result::Result<T, DpllError>;
