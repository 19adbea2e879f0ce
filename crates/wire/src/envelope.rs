//! Request/Response envelope encoding for the wire protocol
//!
//! One JSON document per line:
//! - Request: `{"id", "command"}`
//! - Success response: `{"id", "ok": true, "output"}`
//! - Error response: `{"id", "ok": false, "error": {"code", "message"}}`
//!
//! `ok: false` is reserved for transport faults: unparseable requests,
//! malformed handles and internal errors. Operation failures arrive as
//! `ok: true` with a failed status inside `output`.

use serde::{Deserialize, Serialize};
use veneer_executor::{Command, Error, Output};

/// Wire protocol request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Request ID (echoed in response)
    pub id: String,
    /// Operation to run
    pub command: Command,
}

/// Wire protocol response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Request ID (from request)
    pub id: String,
    /// Whether the call itself succeeded
    pub ok: bool,
    /// Result (if ok=true)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Output>,
    /// Error (if ok=false)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

/// Transport fault carried by an `ok: false` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code (e.g. "HandleInvalid", "InvalidRequest")
    pub code: String,
    /// Human-readable message
    pub message: String,
}

/// Code of the fault sent for requests that cannot be parsed.
pub const INVALID_REQUEST: &str = "InvalidRequest";

impl Response {
    /// Create a success response
    pub fn success(id: &str, output: Output) -> Self {
        Response {
            id: id.to_string(),
            ok: true,
            output: Some(output),
            error: None,
        }
    }

    /// Create an error response
    pub fn error(id: &str, error: ApiError) -> Self {
        Response {
            id: id.to_string(),
            ok: false,
            output: None,
            error: Some(error),
        }
    }

    /// Error response for an executor fault
    pub fn fault(id: &str, err: &Error) -> Self {
        Self::error(
            id,
            ApiError {
                code: err.code().to_string(),
                message: err.to_string(),
            },
        )
    }
}

/// Encode a request as one line (without the newline)
pub fn encode_request(request: &Request) -> serde_json::Result<String> {
    serde_json::to_string(request)
}

/// Encode a response as one line (without the newline)
pub fn encode_response(response: &Response) -> serde_json::Result<String> {
    serde_json::to_string(response)
}

/// Decode a request line.
///
/// On failure, returns the request ID if one could be recovered, so the
/// error response can still be correlated.
pub fn decode_request(line: &str) -> Result<Request, (String, ApiError)> {
    serde_json::from_str(line).map_err(|e| {
        let id = serde_json::from_str::<serde_json::Value>(line)
            .ok()
            .and_then(|v| v.get("id").and_then(|id| id.as_str()).map(str::to_string))
            .unwrap_or_default();
        (
            id,
            ApiError {
                code: INVALID_REQUEST.to_string(),
                message: format!("Invalid request: {}", e),
            },
        )
    })
}

/// Decode a response line
pub fn decode_response(line: &str) -> serde_json::Result<Response> {
    serde_json::from_str(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use veneer_core::WireValue;
    use veneer_executor::{AckResponse, Status};

    #[test]
    fn test_request_round_trip() {
        let request = Request {
            id: "r1".into(),
            command: Command::Exec {
                sql: "insert into t values (?)".into(),
                params: vec![WireValue::Binary(vec![9])],
                timeout_ms: None,
            },
        };
        let line = encode_request(&request).unwrap();
        assert!(!line.contains('\n'));
        assert!(line.contains(r#""$bytes":"CQ==""#));
        assert_eq!(decode_request(&line).unwrap(), request);
    }

    #[test]
    fn test_decode_request_recovers_id() {
        let (id, err) = decode_request(r#"{"id":"r9","command":{"Bogus":{}}}"#).unwrap_err();
        assert_eq!(id, "r9");
        assert_eq!(err.code, INVALID_REQUEST);

        let (id, _) = decode_request("not json").unwrap_err();
        assert_eq!(id, "");
    }

    #[test]
    fn test_success_response_shape() {
        let response = Response::success(
            "r2",
            Output::Ack(AckResponse {
                status: Status {
                    success: true,
                    reason: "success".into(),
                    code: None,
                    elapsed: "3µs".into(),
                },
            }),
        );
        let json: serde_json::Value =
            serde_json::from_str(&encode_response(&response).unwrap()).unwrap();
        assert_eq!(json["ok"], true);
        assert!(json.get("error").is_none());
        assert_eq!(json["output"]["Ack"]["status"]["reason"], "success");
    }

    #[test]
    fn test_fault_response() {
        let err = Error::HandleInvalid {
            handle: "abc".into(),
            reason: "not a handle id".into(),
        };
        let response = Response::fault("r3", &err);
        let line = encode_response(&response).unwrap();
        let back = decode_response(&line).unwrap();
        assert!(!back.ok);
        let error = back.error.unwrap();
        assert_eq!(error.code, "HandleInvalid");
        assert_eq!(error.message, "handle 'abc' is not valid: not a handle id");
    }
}
