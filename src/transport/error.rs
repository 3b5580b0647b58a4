//! Error types for device communication.

use thiserror::Error;

/// Errors that can occur while talking to a device, regardless of which
/// transport carries the conversation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No matching device could be found (USB enumeration found no
    /// vid/pid/interface match, or the HTTP host did not answer its status
    /// endpoint).
    #[error("no matching device found")]
    DeviceNotFound,

    /// A device was found but communication with it failed at the
    /// transport layer (a HID write/read error, or an HTTP transport-level
    /// failure such as a connection reset).
    #[error("transport I/O failed: {0}")]
    Io(String),

    /// A frame or response from the device did not match the expected
    /// wire format.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The device did not respond within the expected time.
    #[error("device did not respond in time")]
    Timeout,

    /// The requested resource (a stored program, an NVS key) does not
    /// exist on the device.
    #[error("not found")]
    NotFound,

    /// The device rejected the request (an oversized payload, an invalid
    /// NVS type tag, a malformed key).
    #[error("device rejected request: {0}")]
    Rejected(String),
}

/// Errors raised while building or parsing a protocol frame, independent of
/// the transport that carries it.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A value destined for a fixed-size wire field does not fit.
    #[error("{field} of {len} bytes exceeds the {limit} byte limit")]
    ValueTooLarge {
        /// Name of the oversized field.
        field: &'static str,
        /// Actual length in bytes.
        len: usize,
        /// Maximum allowed length in bytes.
        limit: usize,
    },

    /// A response frame was shorter than required to contain its fixed
    /// header.
    #[error("response frame too short: got {got} bytes, need at least {need}")]
    ShortFrame {
        /// Bytes actually received.
        got: usize,
        /// Minimum bytes required.
        need: usize,
    },

    /// The device returned its error response code.
    #[error("device returned an error response")]
    DeviceError,

    /// A response carried an NVS type tag this implementation does not
    /// recognize.
    #[error("unrecognized NVS type tag 0x{0:02X}")]
    UnknownNvsType(u8),
}
