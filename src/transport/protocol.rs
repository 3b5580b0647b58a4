//! Wire-level constants and framing shared by the HID and HTTP transports.

use super::error::ProtocolError;

/// Raw HID report size, including the leading Report ID byte.
pub const RAW_HID_REPORT_SIZE: usize = 64;
/// Payload bytes carried by each upload/download chunk frame.
pub const DATA_PAYLOAD_SIZE: usize = 60;

/// Default USB vendor ID.
pub const USB_VID: u16 = 0x303A;
/// Default USB product ID.
pub const USB_PID: u16 = 0x4008;

/// Maximum size of a program stored to flash: one 4 KiB page reserved out
/// of the 1 MiB partition.
pub const PROGRAM_FLASH_MAX_SIZE: usize = 1024 * 1024 - 4096;
/// Maximum size of a program executed directly from RAM.
pub const PROGRAM_RAM_MAX_SIZE: usize = 8 * 1024;

/// Maximum length of an NVS key, in bytes.
pub const NVS_KEY_MAX_LEN: usize = 15;
/// Maximum size of an NVS string or blob value, in bytes.
pub const NVS_VALUE_MAX_LEN: usize = 1024;

pub const RESP_OK: u8 = 0x10;
pub const RESP_ERROR: u8 = 0x11;

pub const CMD_FLASH_PROGRAM_WRITE_START: u8 = 0x20;
pub const CMD_FLASH_PROGRAM_WRITE_CHUNK: u8 = 0x21;
pub const CMD_FLASH_PROGRAM_WRITE_FINISH: u8 = 0x22;
pub const CMD_FLASH_PROGRAM_READ_START: u8 = 0x23;
pub const CMD_FLASH_PROGRAM_READ_CHUNK: u8 = 0x24;
pub const CMD_FLASH_PROGRAM_EXECUTE: u8 = 0x25;

pub const CMD_RAM_PROGRAM_WRITE_START: u8 = 0x26;
pub const CMD_RAM_PROGRAM_WRITE_CHUNK: u8 = 0x27;
pub const CMD_RAM_PROGRAM_WRITE_FINISH: u8 = 0x28;
pub const CMD_RAM_PROGRAM_READ_START: u8 = 0x29;
pub const CMD_RAM_PROGRAM_READ_CHUNK: u8 = 0x2A;
pub const CMD_RAM_PROGRAM_EXECUTE: u8 = 0x2B;

pub const CMD_NVS_SET_START: u8 = 0x30;
pub const CMD_NVS_SET_DATA: u8 = 0x31;
pub const CMD_NVS_SET_FINISH: u8 = 0x32;
pub const CMD_NVS_GET_START: u8 = 0x33;
pub const CMD_NVS_GET_DATA: u8 = 0x34;
pub const CMD_NVS_DELETE: u8 = 0x35;

/// Streams the device's log buffer. Assigned here because the HID transport
/// has no equivalent command in the original vendor firmware, which only
/// exposed logs over its HTTP/REST interface; this opcode gives Raw HID
/// parity with that surface.
pub const CMD_LOG_STREAM: u8 = 0x40;
/// Clears the device's log buffer. See [`CMD_LOG_STREAM`].
pub const CMD_LOG_CLEAR: u8 = 0x41;

pub const NVS_TYPE_U8: u8 = 0x01;
pub const NVS_TYPE_I8: u8 = 0x11;
pub const NVS_TYPE_U16: u8 = 0x02;
pub const NVS_TYPE_I16: u8 = 0x12;
pub const NVS_TYPE_U32: u8 = 0x04;
pub const NVS_TYPE_I32: u8 = 0x14;
pub const NVS_TYPE_U64: u8 = 0x08;
pub const NVS_TYPE_I64: u8 = 0x18;
pub const NVS_TYPE_STR: u8 = 0x21;
pub const NVS_TYPE_BLOB: u8 = 0x42;

/// A typed value stored in the device's non-volatile key/value store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NvsValue {
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    Str(String),
    Blob(Vec<u8>),
}

impl NvsValue {
    /// The wire type tag for this value.
    pub fn type_tag(&self) -> u8 {
        match self {
            NvsValue::U8(_) => NVS_TYPE_U8,
            NvsValue::I8(_) => NVS_TYPE_I8,
            NvsValue::U16(_) => NVS_TYPE_U16,
            NvsValue::I16(_) => NVS_TYPE_I16,
            NvsValue::U32(_) => NVS_TYPE_U32,
            NvsValue::I32(_) => NVS_TYPE_I32,
            NvsValue::U64(_) => NVS_TYPE_U64,
            NvsValue::I64(_) => NVS_TYPE_I64,
            NvsValue::Str(_) => NVS_TYPE_STR,
            NvsValue::Blob(_) => NVS_TYPE_BLOB,
        }
    }

    /// Encodes the value's payload bytes for the HID wire: little-endian
    /// for integers, NUL-terminated UTF-8 for strings, and verbatim for
    /// blobs. The HTTP transport carries strings as JSON instead and does
    /// not use this encoding.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            NvsValue::U8(v) => vec![*v],
            NvsValue::I8(v) => vec![*v as u8],
            NvsValue::U16(v) => v.to_le_bytes().to_vec(),
            NvsValue::I16(v) => v.to_le_bytes().to_vec(),
            NvsValue::U32(v) => v.to_le_bytes().to_vec(),
            NvsValue::I32(v) => v.to_le_bytes().to_vec(),
            NvsValue::U64(v) => v.to_le_bytes().to_vec(),
            NvsValue::I64(v) => v.to_le_bytes().to_vec(),
            NvsValue::Str(v) => {
                let mut bytes = v.as_bytes().to_vec();
                bytes.push(0);
                bytes
            }
            NvsValue::Blob(v) => v.clone(),
        }
    }

    /// Decodes a value from its wire type tag and payload bytes.
    pub fn from_wire(type_tag: u8, bytes: &[u8]) -> Result<Self, ProtocolError> {
        fn arr<const N: usize>(bytes: &[u8]) -> Result<[u8; N], ProtocolError> {
            bytes.try_into().map_err(|_| ProtocolError::ShortFrame {
                got: bytes.len(),
                need: N,
            })
        }

        Ok(match type_tag {
            NVS_TYPE_U8 => NvsValue::U8(*bytes.first().ok_or(ProtocolError::ShortFrame {
                got: bytes.len(),
                need: 1,
            })?),
            NVS_TYPE_I8 => NvsValue::I8(*bytes.first().ok_or(ProtocolError::ShortFrame {
                got: bytes.len(),
                need: 1,
            })? as i8),
            NVS_TYPE_U16 => NvsValue::U16(u16::from_le_bytes(arr(bytes)?)),
            NVS_TYPE_I16 => NvsValue::I16(i16::from_le_bytes(arr(bytes)?)),
            NVS_TYPE_U32 => NvsValue::U32(u32::from_le_bytes(arr(bytes)?)),
            NVS_TYPE_I32 => NvsValue::I32(i32::from_le_bytes(arr(bytes)?)),
            NVS_TYPE_U64 => NvsValue::U64(u64::from_le_bytes(arr(bytes)?)),
            NVS_TYPE_I64 => NvsValue::I64(i64::from_le_bytes(arr(bytes)?)),
            NVS_TYPE_STR => {
                let trimmed = bytes.strip_suffix(&[0]).unwrap_or(bytes);
                NvsValue::Str(
                    String::from_utf8(trimmed.to_vec())
                        .map_err(|_| ProtocolError::ShortFrame { got: bytes.len(), need: 0 })?,
                )
            }
            NVS_TYPE_BLOB => NvsValue::Blob(bytes.to_vec()),
            other => return Err(ProtocolError::UnknownNvsType(other)),
        })
    }
}

/// Validates an NVS key against the device's length limit.
pub fn check_key_len(key: &str) -> Result<(), ProtocolError> {
    if key.len() > NVS_KEY_MAX_LEN {
        return Err(ProtocolError::ValueTooLarge {
            field: "NVS key",
            len: key.len(),
            limit: NVS_KEY_MAX_LEN,
        });
    }
    Ok(())
}

/// Validates a string or blob NVS value against the device's size limit.
/// Fixed-width integer values are always within limits and skip this check.
pub fn check_value_len(value: &NvsValue) -> Result<(), ProtocolError> {
    let len = match value {
        NvsValue::Str(s) => s.len(),
        NvsValue::Blob(b) => b.len(),
        _ => return Ok(()),
    };
    if len > NVS_VALUE_MAX_LEN {
        return Err(ProtocolError::ValueTooLarge {
            field: "NVS value",
            len,
            limit: NVS_VALUE_MAX_LEN,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_integer_values() {
        let v = NvsValue::U32(0xDEAD_BEEF);
        let bytes = v.to_bytes();
        assert_eq!(NvsValue::from_wire(v.type_tag(), &bytes).unwrap(), v);
    }

    #[test]
    fn round_trips_string_values() {
        let v = NvsValue::Str("hello".to_string());
        let bytes = v.to_bytes();
        assert_eq!(NvsValue::from_wire(v.type_tag(), &bytes).unwrap(), v);
    }

    #[test]
    fn rejects_oversized_key() {
        let err = check_key_len("this-key-is-definitely-too-long").unwrap_err();
        assert!(matches!(err, ProtocolError::ValueTooLarge { .. }));
    }

    #[test]
    fn rejects_oversized_blob() {
        let value = NvsValue::Blob(vec![0u8; NVS_VALUE_MAX_LEN + 1]);
        let err = check_value_len(&value).unwrap_err();
        assert!(matches!(err, ProtocolError::ValueTooLarge { .. }));
    }

    #[test]
    fn unknown_type_tag_is_rejected() {
        let err = NvsValue::from_wire(0xFF, &[]).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownNvsType(0xFF)));
    }
}
