//! JSON-RPC 1.1 request/response codec.
//!
//! Requests are `{"version": "1.1", "method": ..., "id": ..., "params": [...]}`
//! with `params` omitted when empty. Responses carry `result` or `error`;
//! the error object is decoded as a [`Fault`].

use serde::Serialize;
use serde_json::Value as Json;

use crate::error::{Fault, WireError};
use crate::value::{DateEncoding, Value};

/// Protocol version stamped on every request.
pub const VERSION: &str = "1.1";

#[derive(Debug, Serialize)]
struct Request<'a> {
    version: &'static str,
    method: &'a str,
    id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Vec<Json>>,
}

/// A decoded response, before correlation.
///
/// `id` is `None` when the server omitted it; the transport substitutes the
/// request id in that case.
#[derive(Debug, Clone)]
pub struct Response {
    pub id: Option<u64>,
    pub outcome: Result<Json, Fault>,
}

/// Encode a request body.
///
/// # Errors
/// Returns [`WireError::Json`] if serialization fails (it cannot for this
/// shape in practice, but the error is propagated rather than swallowed).
pub fn encode_request(
    method: &str,
    id: u64,
    params: &[Value],
    encoding: DateEncoding,
) -> Result<String, WireError> {
    let params = if params.is_empty() {
        None
    } else {
        Some(params.iter().map(|v| v.to_json(encoding)).collect())
    };
    let request = Request {
        version: VERSION,
        method,
        id,
        params,
    };
    Ok(serde_json::to_string(&request)?)
}

/// Decode a response body.
///
/// # Errors
/// - [`WireError::Json`] for unparseable bodies
/// - [`WireError::NotAnObject`] when the body is valid JSON but not an object
/// - [`WireError::MissingOutcome`] when neither `result` nor `error` is present
pub fn decode_response(body: &str) -> Result<Response, WireError> {
    let root: Json = serde_json::from_str(body)?;
    let Json::Object(mut object) = root else {
        return Err(WireError::NotAnObject);
    };

    let id = object.get("id").and_then(response_id);

    match object.remove("error") {
        Some(error) if !error.is_null() => {
            let fault: Fault = serde_json::from_value(error)?;
            Ok(Response {
                id,
                outcome: Err(fault),
            })
        }
        _ => match object.remove("result") {
            Some(result) => Ok(Response {
                id,
                outcome: Ok(result),
            }),
            None => Err(WireError::MissingOutcome),
        },
    }
}

/// Response ids are numeric, but a string of digits is tolerated.
fn response_id(id: &Json) -> Option<u64> {
    match id {
        Json::Number(n) => n.as_u64(),
        Json::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_shape_with_params() {
        let body = encode_request(
            "core.get_torrent_status",
            7,
            &[Value::from("abc"), Value::Array(vec![Value::from("name")])],
            DateEncoding::Iso8601,
        )
        .unwrap();
        let json: Json = serde_json::from_str(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "version": "1.1",
                "method": "core.get_torrent_status",
                "id": 7,
                "params": ["abc", ["name"]],
            })
        );
    }

    #[test]
    fn request_omits_empty_params() {
        let body = encode_request("system.listMethods", 1, &[], DateEncoding::Iso8601).unwrap();
        let json: Json = serde_json::from_str(&body).unwrap();
        assert!(json.get("params").is_none());
        assert_eq!(json["id"], serde_json::json!(1));
    }

    #[test]
    fn decodes_result() {
        let response = decode_response(r#"{"version": "1.1", "id": 3, "result": [1, 2]}"#).unwrap();
        assert_eq!(response.id, Some(3));
        assert_eq!(response.outcome.unwrap(), serde_json::json!([1, 2]));
    }

    #[test]
    fn decodes_null_result() {
        let response = decode_response(r#"{"id": 1, "result": null}"#).unwrap();
        assert_eq!(response.outcome.unwrap(), Json::Null);
    }

    #[test]
    fn decodes_error() {
        let response =
            decode_response(r#"{"id": 4, "error": {"number": 123, "message": "unknown"}}"#)
                .unwrap();
        let fault = response.outcome.unwrap_err();
        assert_eq!(fault.code, 123);
        assert_eq!(fault.message, "unknown");
    }

    #[test]
    fn null_error_falls_through_to_result() {
        let response = decode_response(r#"{"id": 2, "error": null, "result": true}"#).unwrap();
        assert_eq!(response.outcome.unwrap(), serde_json::json!(true));
    }

    #[test]
    fn missing_id_is_tolerated() {
        let response = decode_response(r#"{"result": "ok"}"#).unwrap();
        assert_eq!(response.id, None);
    }

    #[test]
    fn string_id_is_tolerated() {
        let response = decode_response(r#"{"id": "12", "result": "ok"}"#).unwrap();
        assert_eq!(response.id, Some(12));
    }

    #[test]
    fn rejects_non_object() {
        assert!(matches!(
            decode_response("[1, 2]"),
            Err(WireError::NotAnObject)
        ));
    }

    #[test]
    fn rejects_missing_outcome() {
        assert!(matches!(
            decode_response(r#"{"id": 1}"#),
            Err(WireError::MissingOutcome)
        ));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(decode_response("nonsense"), Err(WireError::Json(_))));
    }
}
