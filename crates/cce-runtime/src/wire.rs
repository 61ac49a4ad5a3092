//! Wire-level JSON request/response plumbing shared by every mediated
//! host function: a length-prefixed JSON payload read from guest
//! memory at a `(ptr, len)` packed into one `u64`, and a symmetric
//! encoding for the response.

use cce_core::{ErrorDetail, ErrorType};
use serde::{de::DeserializeOwned, Serialize};
use wasmtime::{Caller, Memory};

use crate::error::{Error, Result};
use crate::sandbox::StoreData;

/// Maximum size of a single guest memory read or write this module
/// will perform, independent of any sandbox memory limit.
const MAX_PAYLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Pack a `(ptr, len)` pair into the single `u64` word the guest ABI
/// uses for host call arguments and return values.
#[must_use]
pub fn pack(ptr: u32, len: u32) -> u64 {
    (u64::from(ptr) << 32) | u64::from(len)
}

/// Unpack a `u64` word into its `(ptr, len)` pair.
#[must_use]
pub fn unpack(word: u64) -> (u32, u32) {
    ((word >> 32) as u32, word as u32)
}

/// A generic wire response envelope: either the operation's typed
/// payload, or a structured `error`. Serializes with a flattened
/// success payload and an optional top-level `error`, matching the
/// "discriminant-free success path" contract.
#[derive(Debug, Serialize)]
pub struct WireResponse<T: Serialize> {
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub ok: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

impl<T: Serialize> WireResponse<T> {
    /// A successful response.
    #[must_use]
    pub fn ok(value: T) -> Self {
        Self {
            ok: Some(value),
            error: None,
        }
    }
}

/// Build an error-only response for a given [`ErrorDetail`]. `T` is
/// phantom here; callers pick it to match the success type their
/// operation would otherwise return.
#[must_use]
pub fn error_response<T: Serialize>(detail: ErrorDetail) -> WireResponse<T> {
    WireResponse {
        ok: None,
        error: Some(detail),
    }
}

/// Shorthand for the capability-denied response every host function
/// returns on a policy denial.
#[must_use]
pub fn capability_denied_response<T: Serialize>(capability: &str) -> WireResponse<T> {
    error_response(ErrorDetail::capability(format!(
        "capability not granted: {capability}"
    )))
}

/// A capability-denied response carrying a caller-supplied message,
/// for the host functions (e.g. exec) whose denial wording depends on
/// more than the bare capability string.
#[must_use]
pub fn capability_denied_response_with_message<T: Serialize>(message: impl Into<String>) -> WireResponse<T> {
    error_response(ErrorDetail::capability(message))
}

/// Shorthand for a config-error response (malformed request fields).
#[must_use]
pub fn config_error_response<T: Serialize>(message: impl Into<String>) -> WireResponse<T> {
    error_response(ErrorDetail::config(message))
}

fn get_memory(caller: &mut Caller<'_, StoreData>) -> Result<Memory> {
    caller
        .get_export("memory")
        .and_then(|e| e.into_memory())
        .ok_or_else(|| Error::memory("memory export not found"))
}

/// Read and decode a host function's JSON request from guest memory.
pub fn read_request<Req: DeserializeOwned>(
    caller: &mut Caller<'_, StoreData>,
    packed: u64,
) -> Result<Req> {
    let (ptr, len) = unpack(packed);
    if len as usize > MAX_PAYLOAD_BYTES {
        return Err(Error::malformed_payload(format!(
            "request too large: {len} bytes"
        )));
    }
    let memory = get_memory(caller)?;
    let mut buffer = vec![0u8; len as usize];
    memory
        .read(&mut *caller, ptr as usize, &mut buffer)
        .map_err(|e| Error::memory(format!("reading request: {e}")))?;
    serde_json::from_slice(&buffer).map_err(|e| Error::malformed_payload(e.to_string()))
}

/// Encode a host function's JSON response and write it into newly
/// allocated guest memory, returning the packed `(ptr, len)` word the
/// guest should receive as the call's return value.
pub fn write_response<Resp: Serialize>(
    caller: &mut Caller<'_, StoreData>,
    response: &Resp,
) -> Result<u64> {
    let bytes = serde_json::to_vec(response).map_err(|e| Error::malformed_payload(e.to_string()))?;
    if bytes.len() > MAX_PAYLOAD_BYTES {
        return Err(Error::memory("response too large to allocate"));
    }

    let alloc = caller
        .get_export("allocate")
        .and_then(|e| e.into_func())
        .ok_or_else(|| Error::memory("allocate function not found in guest module"))?;
    let alloc = alloc
        .typed::<i32, i32>(&*caller)
        .map_err(|e| Error::memory(format!("allocate has wrong signature: {e}")))?;
    let ptr = alloc
        .call(&mut *caller, bytes.len() as i32)
        .map_err(|e| Error::memory(format!("allocate trapped: {e}")))? as u32;

    let memory = get_memory(caller)?;
    memory
        .write(&mut *caller, ptr as usize, &bytes)
        .map_err(|e| Error::memory(format!("writing response: {e}")))?;

    Ok(pack(ptr, bytes.len() as u32))
}

/// Satisfy a host function call by writing `response` and returning
/// its packed word, collapsing any write failure into a malformed
/// `internal` response rather than propagating a trap — no host
/// function may panic on malformed input, including allocation
/// failures caused by a misbehaving guest.
pub fn respond<Resp: Serialize>(
    caller: &mut Caller<'_, StoreData>,
    response: WireResponse<Resp>,
) -> Result<u64> {
    match write_response(caller, &response) {
        Ok(word) => Ok(word),
        Err(_) => {
            let fallback = error_response::<Resp>(ErrorDetail::internal(
                "failed to write host response into guest memory",
            ));
            write_response(caller, &fallback)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_unpack_round_trips() {
        assert_eq!(unpack(pack(0xDEAD_BEEF, 0x1234)), (0xDEAD_BEEF, 0x1234));
        assert_eq!(unpack(pack(0, 0)), (0, 0));
    }

    #[test]
    fn wire_response_serializes_success_without_error_field() {
        #[derive(Serialize)]
        struct Payload {
            value: u32,
        }
        let response = WireResponse::ok(Payload { value: 7 });
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["value"], 7);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn error_response_carries_type() {
        let response = capability_denied_response::<serde_json::Value>("network:outbound:443");
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["error"]["type"], "capability");
    }
}
