//! Raw HID transport.
//!
//! Frames are fixed-size [`RAW_HID_REPORT_SIZE`](super::protocol::RAW_HID_REPORT_SIZE)
//! reports: a leading Report ID byte (always `0`, this device uses a single
//! numberless report) followed by a command byte and up to
//! [`DATA_PAYLOAD_SIZE`](super::protocol::DATA_PAYLOAD_SIZE) bytes of
//! payload. Uploads and downloads are lockstep: one chunk request, one
//! chunk response, repeated until the transfer completes.

use std::io::Write;
use std::time::{Duration, Instant};

use hidapi::{HidApi, HidDevice};
use tracing::{debug, warn};

use super::error::{ProtocolError, TransportError};
use super::protocol::*;
use super::{DeviceTransport, Target};

const FRAME_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(10);
const REPORT_ID: u8 = 0;

/// The two device-facing operations [`HidTransport`] needs from a HID
/// handle. Exists so tests can swap in an in-memory fake instead of a real
/// `hidapi::HidDevice`, which can only ever name a physical node.
pub(crate) trait HidChannel {
    fn write(&self, frame: &[u8]) -> Result<usize, String>;
    fn read_timeout(&self, buf: &mut [u8], timeout_ms: i32) -> Result<usize, String>;
}

impl HidChannel for HidDevice {
    fn write(&self, frame: &[u8]) -> Result<usize, String> {
        HidDevice::write(self, frame).map_err(|e| e.to_string())
    }

    fn read_timeout(&self, buf: &mut [u8], timeout_ms: i32) -> Result<usize, String> {
        HidDevice::read_timeout(self, buf, timeout_ms).map_err(|e| e.to_string())
    }
}

/// Lays out one outbound 65-byte wire frame: a leading Report ID byte,
/// the command code, three reserved zero bytes, then up to
/// [`DATA_PAYLOAD_SIZE`] bytes of payload.
fn build_frame(command: u8, payload: &[u8]) -> [u8; RAW_HID_REPORT_SIZE + 1] {
    let mut frame = [0u8; RAW_HID_REPORT_SIZE + 1];
    frame[0] = REPORT_ID;
    frame[1] = command;
    frame[5..5 + payload.len()].copy_from_slice(payload);
    frame
}

/// Talks to an ODKey device over a Raw HID interface.
pub struct HidTransport<C: HidChannel = HidDevice> {
    device: C,
}

impl HidTransport<HidDevice> {
    /// Opens the first HID interface matching `vid`/`pid` whose interface
    /// number is `1`, the vendor-defined Raw HID interface carrying this
    /// protocol (interface `0` is the device's boot-keyboard interface).
    pub fn open(vid: u16, pid: u16) -> Result<Self, TransportError> {
        let api = HidApi::new().map_err(|e| TransportError::Io(e.to_string()))?;
        let info = api
            .device_list()
            .find(|d| d.vendor_id() == vid && d.product_id() == pid && d.interface_number() == 1)
            .ok_or(TransportError::DeviceNotFound)?;
        let device = info
            .open_device(&api)
            .map_err(|e| TransportError::Io(e.to_string()))?;
        Ok(Self { device })
    }

    /// Opens a specific device node directly, bypassing enumeration.
    pub fn open_path(path: &std::ffi::CStr) -> Result<Self, TransportError> {
        let api = HidApi::new().map_err(|e| TransportError::Io(e.to_string()))?;
        let device = api
            .open_path(path)
            .map_err(|e| TransportError::Io(e.to_string()))?;
        Ok(Self { device })
    }
}

impl<C: HidChannel> HidTransport<C> {
    #[cfg(test)]
    pub(crate) fn from_channel(device: C) -> Self {
        Self { device }
    }

    fn send_command(&self, command: u8, payload: &[u8]) -> Result<[u8; 64], TransportError> {
        if payload.len() > DATA_PAYLOAD_SIZE {
            return Err(ProtocolError::ValueTooLarge {
                field: "HID command payload",
                len: payload.len(),
                limit: DATA_PAYLOAD_SIZE,
            }
            .into());
        }

        // frame[0] is the Report ID hidapi prepends on the wire; within the
        // 64-byte report itself, byte 0 is the opcode, bytes 1-3 are
        // reserved, and the 60-byte payload starts at byte 4.
        let frame = build_frame(command, payload);

        self.device
            .write(&frame)
            .map_err(TransportError::Io)?;

        let deadline = Instant::now() + FRAME_TIMEOUT;
        loop {
            let mut response = [0u8; RAW_HID_REPORT_SIZE];
            let read = self
                .device
                .read_timeout(&mut response, POLL_INTERVAL.as_millis() as i32)
                .map_err(TransportError::Io)?;
            if read > 0 {
                if response[0] == RESP_ERROR {
                    return Err(ProtocolError::DeviceError.into());
                }
                if response[0] != RESP_OK {
                    warn!(code = response[0], "unexpected response code");
                }
                return Ok(response);
            }
            if Instant::now() >= deadline {
                return Err(TransportError::Timeout);
            }
        }
    }

    fn write_start(&self, target: Target, size: usize) -> Result<(), TransportError> {
        let cmd = match target {
            Target::Flash => CMD_FLASH_PROGRAM_WRITE_START,
            Target::Ram => CMD_RAM_PROGRAM_WRITE_START,
        };
        self.send_command(cmd, &(size as u32).to_le_bytes())?;
        Ok(())
    }

    fn write_chunk(&self, target: Target, chunk: &[u8]) -> Result<(), TransportError> {
        let cmd = match target {
            Target::Flash => CMD_FLASH_PROGRAM_WRITE_CHUNK,
            Target::Ram => CMD_RAM_PROGRAM_WRITE_CHUNK,
        };
        let mut padded = [0u8; DATA_PAYLOAD_SIZE];
        padded[..chunk.len()].copy_from_slice(chunk);
        self.send_command(cmd, &padded)?;
        Ok(())
    }

    fn write_finish(&self, target: Target, size: usize) -> Result<(), TransportError> {
        let cmd = match target {
            Target::Flash => CMD_FLASH_PROGRAM_WRITE_FINISH,
            Target::Ram => CMD_RAM_PROGRAM_WRITE_FINISH,
        };
        self.send_command(cmd, &(size as u32).to_le_bytes())?;
        Ok(())
    }
}

impl<C: HidChannel> DeviceTransport for HidTransport<C> {
    fn upload_program(&mut self, target: Target, program: &[u8]) -> Result<(), TransportError> {
        let limit = match target {
            Target::Flash => PROGRAM_FLASH_MAX_SIZE,
            Target::Ram => PROGRAM_RAM_MAX_SIZE,
        };
        if program.len() > limit {
            return Err(ProtocolError::ValueTooLarge {
                field: "program",
                len: program.len(),
                limit,
            }
            .into());
        }

        self.write_start(target, program.len())?;
        for chunk in program.chunks(DATA_PAYLOAD_SIZE) {
            self.write_chunk(target, chunk)?;
        }
        self.write_finish(target, program.len())?;
        debug!(bytes = program.len(), ?target, "uploaded program");
        Ok(())
    }

    fn download_program(&mut self, target: Target) -> Result<Vec<u8>, TransportError> {
        let (start_cmd, chunk_cmd) = match target {
            Target::Flash => (CMD_FLASH_PROGRAM_READ_START, CMD_FLASH_PROGRAM_READ_CHUNK),
            Target::Ram => (CMD_RAM_PROGRAM_READ_START, CMD_RAM_PROGRAM_READ_CHUNK),
        };

        let response = self.send_command(start_cmd, &[])?;
        let size = u32::from_le_bytes(response[4..8].try_into().unwrap()) as usize;
        if size == 0 {
            return Err(TransportError::NotFound);
        }

        let mut program = Vec::with_capacity(size);
        while program.len() < size {
            let response = self.send_command(chunk_cmd, &[])?;
            let remaining = size - program.len();
            let take = remaining.min(RAW_HID_REPORT_SIZE - 4);
            program.extend_from_slice(&response[4..4 + take]);
        }
        Ok(program)
    }

    fn execute_program(&mut self, target: Target) -> Result<(), TransportError> {
        let cmd = match target {
            Target::Flash => CMD_FLASH_PROGRAM_EXECUTE,
            Target::Ram => CMD_RAM_PROGRAM_EXECUTE,
        };
        self.send_command(cmd, &[])?;
        Ok(())
    }

    fn nvs_set(&mut self, key: &str, value: &NvsValue) -> Result<(), TransportError> {
        check_key_len(key)?;
        check_value_len(value)?;
        let bytes = value.to_bytes();

        let mut start_payload = vec![0u8; 25];
        start_payload[0] = value.type_tag();
        start_payload[1..5].copy_from_slice(&(bytes.len() as u32).to_le_bytes());
        start_payload[5..5 + key.len()].copy_from_slice(key.as_bytes());
        self.send_command(CMD_NVS_SET_START, &start_payload)?;

        for chunk in bytes.chunks(DATA_PAYLOAD_SIZE) {
            self.send_command(CMD_NVS_SET_DATA, chunk)?;
        }
        self.send_command(CMD_NVS_SET_FINISH, &[])?;
        Ok(())
    }

    fn nvs_get(&mut self, key: &str) -> Result<NvsValue, TransportError> {
        check_key_len(key)?;

        let mut start_payload = vec![0u8; 20];
        start_payload[..key.len()].copy_from_slice(key.as_bytes());
        let response = self.send_command(CMD_NVS_GET_START, &start_payload)?;

        let type_tag = response[4];
        let size = u32::from_le_bytes(response[5..9].try_into().unwrap()) as usize;
        if size == 0 && type_tag == 0 {
            return Err(TransportError::NotFound);
        }

        let first_chunk_len = size.min(RAW_HID_REPORT_SIZE - 9);
        let mut bytes = response[9..9 + first_chunk_len].to_vec();
        while bytes.len() < size {
            let response = self.send_command(CMD_NVS_GET_DATA, &[])?;
            let remaining = size - bytes.len();
            let take = remaining.min(RAW_HID_REPORT_SIZE - 4);
            bytes.extend_from_slice(&response[4..4 + take]);
        }

        Ok(NvsValue::from_wire(type_tag, &bytes)?)
    }

    fn nvs_delete(&mut self, key: &str) -> Result<(), TransportError> {
        check_key_len(key)?;
        let mut payload = vec![0u8; 20];
        payload[..key.len()].copy_from_slice(key.as_bytes());
        self.send_command(CMD_NVS_DELETE, &payload)?;
        Ok(())
    }

    fn download_logs(&mut self, sink: &mut dyn Write) -> Result<(), TransportError> {
        let response = self.send_command(CMD_LOG_STREAM, &[])?;
        let size = u32::from_le_bytes(response[4..8].try_into().unwrap()) as usize;
        let mut received = 0usize;
        while received < size {
            let response = self.send_command(CMD_LOG_STREAM, &[])?;
            let remaining = size - received;
            let take = remaining.min(RAW_HID_REPORT_SIZE - 4);
            sink.write_all(&response[4..4 + take])
                .map_err(|e| TransportError::Io(e.to_string()))?;
            received += take;
        }
        Ok(())
    }

    fn clear_logs(&mut self) -> Result<(), TransportError> {
        self.send_command(CMD_LOG_CLEAR, &[])?;
        Ok(())
    }

    fn close(self) -> Result<(), TransportError> {
        drop(self);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[test]
    fn frame_is_exactly_65_bytes_with_opcode_and_reserved_layout() {
        let frame = build_frame(CMD_FLASH_PROGRAM_EXECUTE, &[0xAA, 0xBB]);
        assert_eq!(frame.len(), 65);
        assert_eq!(frame[0], REPORT_ID);
        assert_eq!(frame[1], CMD_FLASH_PROGRAM_EXECUTE);
        assert_eq!(&frame[2..5], &[0, 0, 0]);
        assert_eq!(&frame[5..7], &[0xAA, 0xBB]);
        assert!(frame[7..].iter().all(|&b| b == 0));
    }

    /// An in-memory stand-in for a real device, replaying the same
    /// command/response shapes `HidTransport` expects: one 64-byte response
    /// per frame written, state threaded through write/read pairs rather
    /// than a background thread.
    struct MockState {
        flash: Vec<u8>,
        ram: Vec<u8>,
        write_target: Option<Target>,
        write_buf: Vec<u8>,
        read_pos: usize,
        nvs: HashMap<String, (u8, Vec<u8>)>,
        set_key: String,
        set_type: u8,
        set_len: usize,
        set_buf: Vec<u8>,
        get_bytes: Vec<u8>,
        get_pos: usize,
        response: [u8; 64],
    }

    impl Default for MockState {
        fn default() -> Self {
            Self {
                flash: Vec::new(),
                ram: Vec::new(),
                write_target: None,
                write_buf: Vec::new(),
                read_pos: 0,
                nvs: HashMap::new(),
                set_key: String::new(),
                set_type: 0,
                set_len: 0,
                set_buf: Vec::new(),
                get_bytes: Vec::new(),
                get_pos: 0,
                response: [0u8; 64],
            }
        }
    }

    #[derive(Default)]
    struct MockDevice(RefCell<MockState>);

    fn decode_key(bytes: &[u8]) -> String {
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        String::from_utf8(bytes[..end].to_vec()).unwrap()
    }

    impl HidChannel for MockDevice {
        fn write(&self, frame: &[u8]) -> Result<usize, String> {
            let mut s = self.0.borrow_mut();
            let command = frame[1];
            let payload = &frame[5..65];
            let mut resp = [0u8; 64];
            resp[0] = RESP_OK;

            match command {
                CMD_FLASH_PROGRAM_WRITE_START | CMD_RAM_PROGRAM_WRITE_START => {
                    s.write_target = Some(if command == CMD_FLASH_PROGRAM_WRITE_START {
                        Target::Flash
                    } else {
                        Target::Ram
                    });
                    s.write_buf.clear();
                }
                CMD_FLASH_PROGRAM_WRITE_CHUNK | CMD_RAM_PROGRAM_WRITE_CHUNK => {
                    s.write_buf.extend_from_slice(payload);
                }
                CMD_FLASH_PROGRAM_WRITE_FINISH | CMD_RAM_PROGRAM_WRITE_FINISH => {
                    let size = u32::from_le_bytes(payload[0..4].try_into().unwrap()) as usize;
                    let data = s.write_buf[..size].to_vec();
                    match s.write_target {
                        Some(Target::Flash) => s.flash = data,
                        Some(Target::Ram) => s.ram = data,
                        None => panic!("WRITE_FINISH with no preceding WRITE_START"),
                    }
                }
                CMD_FLASH_PROGRAM_READ_START | CMD_RAM_PROGRAM_READ_START => {
                    let target = if command == CMD_FLASH_PROGRAM_READ_START {
                        Target::Flash
                    } else {
                        Target::Ram
                    };
                    let data = if target == Target::Flash { &s.flash } else { &s.ram };
                    resp[4..8].copy_from_slice(&(data.len() as u32).to_le_bytes());
                    s.read_pos = 0;
                    s.write_target = Some(target);
                }
                CMD_FLASH_PROGRAM_READ_CHUNK | CMD_RAM_PROGRAM_READ_CHUNK => {
                    let target = s.write_target.expect("READ_CHUNK with no preceding READ_START");
                    let data = if target == Target::Flash {
                        s.flash.clone()
                    } else {
                        s.ram.clone()
                    };
                    let remaining = data.len() - s.read_pos;
                    let take = remaining.min(DATA_PAYLOAD_SIZE);
                    resp[4..4 + take].copy_from_slice(&data[s.read_pos..s.read_pos + take]);
                    s.read_pos += take;
                }
                CMD_NVS_SET_START => {
                    s.set_type = payload[0];
                    s.set_len = u32::from_le_bytes(payload[1..5].try_into().unwrap()) as usize;
                    s.set_key = decode_key(&payload[5..25]);
                    s.set_buf.clear();
                }
                CMD_NVS_SET_DATA => {
                    s.set_buf.extend_from_slice(payload);
                }
                CMD_NVS_SET_FINISH => {
                    let bytes = s.set_buf[..s.set_len].to_vec();
                    let key = s.set_key.clone();
                    let ty = s.set_type;
                    s.nvs.insert(key, (ty, bytes));
                }
                CMD_NVS_GET_START => {
                    let key = decode_key(&payload[..20]);
                    if let Some((ty, bytes)) = s.nvs.get(&key).cloned() {
                        resp[4] = ty;
                        resp[5..9].copy_from_slice(&(bytes.len() as u32).to_le_bytes());
                        let take = bytes.len().min(55);
                        resp[9..9 + take].copy_from_slice(&bytes[..take]);
                        s.get_pos = take;
                        s.get_bytes = bytes;
                    } else {
                        s.get_bytes.clear();
                        s.get_pos = 0;
                    }
                }
                CMD_NVS_GET_DATA => {
                    let remaining = s.get_bytes.len() - s.get_pos;
                    let take = remaining.min(DATA_PAYLOAD_SIZE);
                    resp[4..4 + take].copy_from_slice(&s.get_bytes[s.get_pos..s.get_pos + take]);
                    s.get_pos += take;
                }
                CMD_NVS_DELETE => {
                    let key = decode_key(&payload[..20]);
                    s.nvs.remove(&key);
                }
                _ => {}
            }

            s.response = resp;
            Ok(frame.len())
        }

        fn read_timeout(&self, buf: &mut [u8], _timeout_ms: i32) -> Result<usize, String> {
            buf.copy_from_slice(&self.0.borrow().response);
            Ok(buf.len())
        }
    }

    #[test]
    fn upload_then_download_returns_exact_bytes_for_both_targets() {
        for target in [Target::Flash, Target::Ram] {
            let mut transport = HidTransport::from_channel(MockDevice::default());
            let program: Vec<u8> = (0..500u32).map(|i| (i % 256) as u8).collect();
            transport.upload_program(target, &program).unwrap();
            let downloaded = transport.download_program(target).unwrap();
            assert_eq!(downloaded, program);
        }
    }

    #[test]
    fn download_with_no_program_stored_fails_not_found() {
        let mut transport = HidTransport::from_channel(MockDevice::default());
        let err = transport.download_program(Target::Flash).unwrap_err();
        assert!(matches!(err, TransportError::NotFound));
    }

    #[test]
    fn nvs_set_then_get_round_trips_every_type() {
        let mut transport = HidTransport::from_channel(MockDevice::default());
        let cases = vec![
            NvsValue::U8(7),
            NvsValue::I8(-7),
            NvsValue::U16(40000),
            NvsValue::I16(-1234),
            NvsValue::U32(0xCAFEBABE),
            NvsValue::I32(-100_000),
            NvsValue::U64(u64::MAX),
            NvsValue::I64(i64::MIN),
            NvsValue::Str("hello device".to_string()),
            NvsValue::Blob(vec![1, 2, 3, 4, 5]),
        ];
        for value in cases {
            transport.nvs_set("k", &value).unwrap();
            assert_eq!(transport.nvs_get("k").unwrap(), value);
        }
    }

    #[test]
    fn nvs_delete_then_get_fails_not_found() {
        let mut transport = HidTransport::from_channel(MockDevice::default());
        transport.nvs_set("k", &NvsValue::U8(1)).unwrap();
        transport.nvs_delete("k").unwrap();
        let err = transport.nvs_get("k").unwrap_err();
        assert!(matches!(err, TransportError::NotFound));
    }

    #[test]
    fn upload_rejects_oversized_program_before_sending_any_frame() {
        let mut transport = HidTransport::from_channel(MockDevice::default());
        let program = vec![0u8; PROGRAM_RAM_MAX_SIZE + 1];
        let err = transport.upload_program(Target::Ram, &program).unwrap_err();
        assert!(matches!(err, TransportError::Protocol(ProtocolError::ValueTooLarge { .. })));
    }
}
