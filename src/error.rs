use thiserror::Error;

/// Errors raised by the occupancy engine and its collaborators.
///
/// None of these stop a running service. Device errors fail `start`,
/// frame errors skip one frame, transient I/O errors are retried.
#[derive(Debug, Error)]
pub enum CurtainError {
    #[error("no capture devices found")]
    NoDevices,

    #[error("device index {index} not found ({available} available)")]
    DeviceIndex { index: usize, available: usize },

    #[error("capture device error: {0}")]
    Device(String),

    #[error("frame rejected: {0}")]
    Frame(String),

    #[error("transient i/o error: {0}")]
    TransientIo(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Coarse error class, used to pick a recovery strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Device,
    Frame,
    TransientIo,
    Config,
}

impl CurtainError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CurtainError::NoDevices | CurtainError::DeviceIndex { .. } | CurtainError::Device(_) => {
                ErrorKind::Device
            }
            CurtainError::Frame(_) => ErrorKind::Frame,
            CurtainError::TransientIo(_) => ErrorKind::TransientIo,
            CurtainError::Config(_) => ErrorKind::Config,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::TransientIo
    }

    pub(crate) fn frame(msg: impl Into<String>) -> Self {
        CurtainError::Frame(msg.into())
    }

    pub(crate) fn device(msg: impl Into<String>) -> Self {
        CurtainError::Device(msg.into())
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        CurtainError::Config(msg.into())
    }
}

pub type Result<T, E = CurtainError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_cover_taxonomy() {
        assert_eq!(CurtainError::NoDevices.kind(), ErrorKind::Device);
        assert_eq!(
            CurtainError::DeviceIndex {
                index: 3,
                available: 1
            }
            .kind(),
            ErrorKind::Device
        );
        assert_eq!(CurtainError::frame("bad").kind(), ErrorKind::Frame);
        let io = std::io::Error::new(std::io::ErrorKind::Interrupted, "hiccup");
        assert!(CurtainError::from(io).is_transient());
        assert!(!CurtainError::config("x").is_transient());
    }

    #[test]
    fn device_index_message_names_both_counts() {
        let err = CurtainError::DeviceIndex {
            index: 2,
            available: 1,
        };
        assert_eq!(err.to_string(), "device index 2 not found (1 available)");
    }
}
