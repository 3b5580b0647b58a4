//! Device communication: Raw HID and HTTP/REST transports behind one
//! capability trait.

mod error;
pub mod hid;
pub mod http;
pub mod protocol;

pub use error::{ProtocolError, TransportError};
pub use protocol::NvsValue;

use std::io::Write;

/// Where a program is stored and executed on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Volatile storage; programs here do not survive a power cycle and
    /// are bounded by [`protocol::PROGRAM_RAM_MAX_SIZE`].
    Ram,
    /// Persistent storage, bounded by [`protocol::PROGRAM_FLASH_MAX_SIZE`].
    Flash,
}

/// Operations common to every way of talking to an ODKey device.
///
/// Both the Raw HID and HTTP/REST transports implement this trait with the
/// same observable semantics; callers that only need device control, not
/// transport-specific tuning, should program against this trait.
pub trait DeviceTransport {
    /// Uploads a compiled program to `target`.
    fn upload_program(&mut self, target: Target, program: &[u8]) -> Result<(), TransportError>;

    /// Downloads the program currently stored at `target`.
    fn download_program(&mut self, target: Target) -> Result<Vec<u8>, TransportError>;

    /// Starts executing the program stored at `target`.
    fn execute_program(&mut self, target: Target) -> Result<(), TransportError>;

    /// Sets an NVS key to `value`, creating or overwriting it.
    fn nvs_set(&mut self, key: &str, value: &NvsValue) -> Result<(), TransportError>;

    /// Reads an NVS key's current value.
    fn nvs_get(&mut self, key: &str) -> Result<NvsValue, TransportError>;

    /// Deletes an NVS key. Deleting a key that does not exist is not an
    /// error.
    fn nvs_delete(&mut self, key: &str) -> Result<(), TransportError>;

    /// Streams the device's log buffer to `sink`.
    fn download_logs(&mut self, sink: &mut dyn Write) -> Result<(), TransportError>;

    /// Clears the device's log buffer.
    fn clear_logs(&mut self) -> Result<(), TransportError>;

    /// Releases the underlying connection. Transports also release their
    /// connection on `Drop`; calling this explicitly lets a caller observe
    /// and handle a close error instead of having it silently discarded.
    fn close(self) -> Result<(), TransportError>;
}
