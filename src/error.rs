//! Error types for host registration and chip boot.

use crate::host::TimerId;

/// Errors raised by a host while registering pins, attributes or timers.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HostError {
    #[error("Pin '{0}' is already registered")]
    DuplicatePin(String),

    #[error("Attribute '{0}' is already registered")]
    DuplicateAttr(String),

    #[error("Timer {0:?} does not exist")]
    UnknownTimer(TimerId),

    #[error("Timer period must be non-zero (got {0} us)")]
    InvalidPeriod(u32),
}

/// What kind of chip resource a manifest check refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Pin,
    Attr,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Pin => write!(f, "pin"),
            ResourceKind::Attr => write!(f, "attribute"),
        }
    }
}

/// Errors that stop a chip from loading or its artifacts from being produced.
#[derive(Debug, thiserror::Error)]
pub enum ChipError {
    #[error("Host registration failed: {0}")]
    Host(#[from] HostError),

    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV export failed: {0}")]
    Wav(#[from] hound::Error),

    #[error("Invalid simulator config: {0}")]
    InvalidConfig(String),

    #[error("No pin named '{0}' to probe")]
    UnknownProbe(String),

    #[error("Trace has no probes to export")]
    EmptyTrace,

    #[error("Trace channel '{channel}' has {samples} samples for {expected} timestamps")]
    MisalignedTrace {
        channel: String,
        samples: usize,
        expected: usize,
    },

    #[error("Chip registered {kind} '{name}' that the manifest does not declare")]
    ManifestMismatch { kind: ResourceKind, name: String },
}

/// Result type for chip boot and tooling.
pub type ChipResult<T = ()> = Result<T, ChipError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_error_messages_name_the_resource() {
        let err = HostError::DuplicatePin("INA+".to_string());
        assert_eq!(err.to_string(), "Pin 'INA+' is already registered");

        let err = HostError::InvalidPeriod(0);
        assert!(err.to_string().contains("non-zero"));
    }

    #[test]
    fn host_error_converts_into_chip_error() {
        let chip_err: ChipError = HostError::DuplicateAttr("gainA".to_string()).into();
        assert!(matches!(chip_err, ChipError::Host(HostError::DuplicateAttr(ref n)) if n == "gainA"));
    }

    #[test]
    fn manifest_mismatch_display() {
        let err = ChipError::ManifestMismatch {
            kind: ResourceKind::Attr,
            name: "offsetB".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Chip registered attribute 'offsetB' that the manifest does not declare"
        );
    }
}
