//! The error kinds shared by every fallible operation in the crate

/// Result alias used throughout the crate
pub type Result<T, E = PtpError> = core::result::Result<T, E>;

/// The single error kind enumeration of the protocol engine.
///
/// Validation and correlation kinds never escape the engine: they are counted
/// in the per-port statistics and the offending message is dropped. External
/// kinds are produced by the host's [`Clock`](crate::Clock) and
/// [`PortIo`](crate::port::PortIo) implementations and escalate to
/// [`Fault`](PtpError::Fault) after three consecutive failures. Only `Fault`
/// and `InvalidParameter` are visible through the public API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
pub enum PtpError {
    // Validation
    #[cfg_attr(feature = "std", error("message version is not PTPv2"))]
    InvalidVersion,
    #[cfg_attr(feature = "std", error("message length field is inconsistent"))]
    InvalidLength,
    #[cfg_attr(feature = "std", error("timestamp nanoseconds out of range"))]
    InvalidTimestamp,
    #[cfg_attr(feature = "std", error("reserved field is not zero"))]
    InvalidReservedField,
    #[cfg_attr(feature = "std", error("steps removed out of range"))]
    InvalidStepsRemoved,
    #[cfg_attr(feature = "std", error("no such port"))]
    InvalidPortNumber,
    #[cfg_attr(feature = "std", error("configuration parameter out of range"))]
    InvalidParameter,
    #[cfg_attr(feature = "std", error("buffer too short"))]
    BufferTooShort,
    #[cfg_attr(feature = "std", error("enumeration value not recognized"))]
    InvalidEnumValue,

    // Correlation (silent; counted)
    #[cfg_attr(feature = "std", error("sequence id does not match"))]
    SequenceMismatch,
    #[cfg_attr(feature = "std", error("message source is not known"))]
    UnknownSource,
    #[cfg_attr(feature = "std", error("message belongs to another domain"))]
    DomainMismatch,

    // State
    #[cfg_attr(feature = "std", error("operation not allowed in the current state"))]
    StateError,
    #[cfg_attr(feature = "std", error("not ready"))]
    NotReady,

    // External (reported by host callbacks)
    #[cfg_attr(feature = "std", error("transmit failed"))]
    SendFailed,
    #[cfg_attr(feature = "std", error("transmit timestamp unavailable"))]
    TimestampUnavailable,
    #[cfg_attr(feature = "std", error("clock adjustment failed"))]
    ClockAdjustFailed,

    // Terminal for the port until re-initialized
    #[cfg_attr(feature = "std", error("port is faulty"))]
    Fault,
}

#[cfg(not(feature = "std"))]
impl core::fmt::Display for PtpError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let text = match self {
            PtpError::InvalidVersion => "message version is not PTPv2",
            PtpError::InvalidLength => "message length field is inconsistent",
            PtpError::InvalidTimestamp => "timestamp nanoseconds out of range",
            PtpError::InvalidReservedField => "reserved field is not zero",
            PtpError::InvalidStepsRemoved => "steps removed out of range",
            PtpError::InvalidPortNumber => "no such port",
            PtpError::InvalidParameter => "configuration parameter out of range",
            PtpError::BufferTooShort => "buffer too short",
            PtpError::InvalidEnumValue => "enumeration value not recognized",
            PtpError::SequenceMismatch => "sequence id does not match",
            PtpError::UnknownSource => "message source is not known",
            PtpError::DomainMismatch => "message belongs to another domain",
            PtpError::StateError => "operation not allowed in the current state",
            PtpError::NotReady => "not ready",
            PtpError::SendFailed => "transmit failed",
            PtpError::TimestampUnavailable => "transmit timestamp unavailable",
            PtpError::ClockAdjustFailed => "clock adjustment failed",
            PtpError::Fault => "port is faulty",
        };
        f.write_str(text)
    }
}

impl PtpError {
    /// Whether this kind belongs to the silently-counted correlation class.
    pub fn is_correlation(&self) -> bool {
        matches!(
            self,
            PtpError::SequenceMismatch | PtpError::UnknownSource | PtpError::DomainMismatch
        )
    }

    /// Whether this kind belongs to the validation class.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            PtpError::InvalidVersion
                | PtpError::InvalidLength
                | PtpError::InvalidTimestamp
                | PtpError::InvalidReservedField
                | PtpError::InvalidStepsRemoved
                | PtpError::InvalidPortNumber
                | PtpError::InvalidParameter
                | PtpError::BufferTooShort
                | PtpError::InvalidEnumValue
        )
    }
}
