//! HTTP/REST transport.
//!
//! Every operation maps to one request against the device's REST API; there
//! is no chunking or lockstep framing here, since HTTP already carries
//! arbitrarily large bodies. A 404 response is translated to
//! [`TransportError::NotFound`].

use std::io::{Read, Write};
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::TransportError;
use super::protocol::{check_key_len, check_value_len, NvsValue, PROGRAM_FLASH_MAX_SIZE, PROGRAM_RAM_MAX_SIZE};
use super::{DeviceTransport, Target};

const STATUS_TIMEOUT: Duration = Duration::from_secs(5);
const PROGRAM_TIMEOUT: Duration = Duration::from_secs(30);

fn target_path(target: Target) -> &'static str {
    match target {
        Target::Flash => "flash",
        Target::Ram => "ram",
    }
}

#[derive(Serialize, Deserialize)]
struct NvsJsonBody {
    #[serde(rename = "type")]
    type_name: String,
    value: serde_json::Value,
}

/// Talks to an ODKey device over its HTTP/REST API.
pub struct HttpTransport {
    base_url: String,
    client: Client,
}

impl HttpTransport {
    /// Connects to `host:port`, authenticating subsequent requests with a
    /// bearer token if `api_key` is given.
    pub fn new(host: &str, port: u16, api_key: Option<&str>) -> Result<Self, TransportError> {
        let mut builder = Client::builder().timeout(PROGRAM_TIMEOUT);
        if let Some(key) = api_key {
            let mut headers = reqwest::header::HeaderMap::new();
            let value = reqwest::header::HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|e| TransportError::Io(e.to_string()))?;
            headers.insert(reqwest::header::AUTHORIZATION, value);
            builder = builder.default_headers(headers);
        }
        let client = builder
            .build()
            .map_err(|e| TransportError::Io(e.to_string()))?;
        Ok(Self {
            base_url: format!("http://{host}:{port}"),
            client,
        })
    }

    /// Checks whether the device answers its status endpoint.
    pub fn find_device(&self) -> Result<bool, TransportError> {
        let response = self
            .client
            .get(format!("{}/api/status", self.base_url))
            .timeout(STATUS_TIMEOUT)
            .send()
            .map_err(|e| TransportError::Io(e.to_string()))?;
        Ok(response.status() == StatusCode::OK)
    }

    fn map_status(status: StatusCode) -> Option<TransportError> {
        if status == StatusCode::NOT_FOUND {
            Some(TransportError::NotFound)
        } else if !status.is_success() {
            Some(TransportError::Rejected(status.to_string()))
        } else {
            None
        }
    }
}

impl DeviceTransport for HttpTransport {
    fn upload_program(&mut self, target: Target, program: &[u8]) -> Result<(), TransportError> {
        let limit = match target {
            Target::Flash => PROGRAM_FLASH_MAX_SIZE,
            Target::Ram => PROGRAM_RAM_MAX_SIZE,
        };
        if program.len() > limit {
            return Err(TransportError::Rejected(format!(
                "program of {} bytes exceeds the {limit} byte limit",
                program.len()
            )));
        }

        let response = self
            .client
            .post(format!("{}/api/program/{}", self.base_url, target_path(target)))
            .header("content-type", "application/octet-stream")
            .body(program.to_vec())
            .send()
            .map_err(|e| TransportError::Io(e.to_string()))?;
        if let Some(err) = Self::map_status(response.status()) {
            return Err(err);
        }
        debug!(bytes = program.len(), ?target, "uploaded program");
        Ok(())
    }

    fn download_program(&mut self, target: Target) -> Result<Vec<u8>, TransportError> {
        let response = self
            .client
            .get(format!("{}/api/program/{}", self.base_url, target_path(target)))
            .send()
            .map_err(|e| TransportError::Io(e.to_string()))?;
        if let Some(err) = Self::map_status(response.status()) {
            return Err(err);
        }
        response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    fn execute_program(&mut self, target: Target) -> Result<(), TransportError> {
        let response = self
            .client
            .post(format!(
                "{}/api/program/{}/execute",
                self.base_url,
                target_path(target)
            ))
            .send()
            .map_err(|e| TransportError::Io(e.to_string()))?;
        if let Some(err) = Self::map_status(response.status()) {
            return Err(err);
        }
        Ok(())
    }

    fn nvs_set(&mut self, key: &str, value: &NvsValue) -> Result<(), TransportError> {
        check_key_len(key)?;
        check_value_len(value)?;

        let url = format!("{}/api/nvs/{key}", self.base_url);
        let response = if let NvsValue::Blob(bytes) = value {
            self.client
                .post(&url)
                .header("content-type", "application/octet-stream")
                .body(bytes.clone())
                .send()
        } else {
            let (type_name, json_value) = match value {
                NvsValue::U8(v) => ("u8", serde_json::json!(v)),
                NvsValue::I8(v) => ("i8", serde_json::json!(v)),
                NvsValue::U16(v) => ("u16", serde_json::json!(v)),
                NvsValue::I16(v) => ("i16", serde_json::json!(v)),
                NvsValue::U32(v) => ("u32", serde_json::json!(v)),
                NvsValue::I32(v) => ("i32", serde_json::json!(v)),
                NvsValue::U64(v) => ("u64", serde_json::json!(v)),
                NvsValue::I64(v) => ("i64", serde_json::json!(v)),
                NvsValue::Str(v) => ("string", serde_json::json!(v)),
                NvsValue::Blob(_) => unreachable!("blob handled above"),
            };
            self.client.post(&url).json(&NvsJsonBody {
                type_name: type_name.to_string(),
                value: json_value,
            })
        }
        .send()
        .map_err(|e| TransportError::Io(e.to_string()))?;

        if let Some(err) = Self::map_status(response.status()) {
            return Err(err);
        }
        Ok(())
    }

    fn nvs_get(&mut self, key: &str) -> Result<NvsValue, TransportError> {
        check_key_len(key)?;
        let response = self
            .client
            .get(format!("{}/api/nvs/{key}", self.base_url))
            .send()
            .map_err(|e| TransportError::Io(e.to_string()))?;
        if let Some(err) = Self::map_status(response.status()) {
            return Err(err);
        }

        let is_octet_stream = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with("application/octet-stream"))
            .unwrap_or(false);

        if is_octet_stream {
            let bytes = response
                .bytes()
                .map_err(|e| TransportError::Io(e.to_string()))?;
            return Ok(NvsValue::Blob(bytes.to_vec()));
        }

        let body: NvsJsonBody = response
            .json()
            .map_err(|e| TransportError::Io(e.to_string()))?;
        json_to_nvs_value(&body)
    }

    fn nvs_delete(&mut self, key: &str) -> Result<(), TransportError> {
        check_key_len(key)?;
        let response = self
            .client
            .delete(format!("{}/api/nvs/{key}", self.base_url))
            .send()
            .map_err(|e| TransportError::Io(e.to_string()))?;
        if let Some(err) = Self::map_status(response.status()) {
            if matches!(err, TransportError::NotFound) {
                return Ok(());
            }
            return Err(err);
        }
        Ok(())
    }

    fn download_logs(&mut self, sink: &mut dyn Write) -> Result<(), TransportError> {
        let response = self
            .client
            .get(format!("{}/api/logs", self.base_url))
            .send()
            .map_err(|e| TransportError::Io(e.to_string()))?;
        if let Some(err) = Self::map_status(response.status()) {
            return Err(err);
        }
        let mut reader = response;
        let mut buf = [0u8; 1024];
        loop {
            let n = reader
                .read(&mut buf)
                .map_err(|e| TransportError::Io(e.to_string()))?;
            if n == 0 {
                break;
            }
            sink.write_all(&buf[..n])
                .map_err(|e| TransportError::Io(e.to_string()))?;
        }
        Ok(())
    }

    fn clear_logs(&mut self) -> Result<(), TransportError> {
        let response = self
            .client
            .delete(format!("{}/api/logs", self.base_url))
            .send()
            .map_err(|e| TransportError::Io(e.to_string()))?;
        if let Some(err) = Self::map_status(response.status()) {
            return Err(err);
        }
        Ok(())
    }

    fn close(self) -> Result<(), TransportError> {
        drop(self);
        Ok(())
    }
}

fn json_to_nvs_value(body: &NvsJsonBody) -> Result<NvsValue, TransportError> {
    fn as_u64(v: &serde_json::Value) -> Result<u64, TransportError> {
        v.as_u64()
            .ok_or_else(|| TransportError::Rejected("expected an integer NVS value".to_string()))
    }
    fn as_i64(v: &serde_json::Value) -> Result<i64, TransportError> {
        v.as_i64()
            .ok_or_else(|| TransportError::Rejected("expected an integer NVS value".to_string()))
    }

    Ok(match body.type_name.as_str() {
        "u8" => NvsValue::U8(as_u64(&body.value)? as u8),
        "i8" => NvsValue::I8(as_i64(&body.value)? as i8),
        "u16" => NvsValue::U16(as_u64(&body.value)? as u16),
        "i16" => NvsValue::I16(as_i64(&body.value)? as i16),
        "u32" => NvsValue::U32(as_u64(&body.value)? as u32),
        "i32" => NvsValue::I32(as_i64(&body.value)? as i32),
        "u64" => NvsValue::U64(as_u64(&body.value)?),
        "i64" => NvsValue::I64(as_i64(&body.value)?),
        "string" => NvsValue::Str(
            body.value
                .as_str()
                .ok_or_else(|| TransportError::Rejected("expected a string NVS value".to_string()))?
                .to_string(),
        ),
        other => {
            return Err(TransportError::Rejected(format!(
                "unrecognized NVS type '{other}'"
            )))
        }
    })
}
