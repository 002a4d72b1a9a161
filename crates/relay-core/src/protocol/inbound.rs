//! Inbound frame decoding.
//!
//! The donor's Ext Lane envelope stores its payload as a lazily-parsed
//! `RawValue` so services deserialize only the fields they need. Frames in
//! this protocol are flat JSON objects (no nested `data`), so the same idea
//! is expressed as a flattened `serde_json::Map`: the `type` discriminant is
//! parsed eagerly, every other field stays as `Value` until a handler asks
//! for it.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{RelayError, Result};

// Note: `deny_unknown_fields` is deliberately not used here. serde rejects
// that combination with `#[serde(flatten)]` at compile time since the
// flattened map already absorbs every field the `type` tag doesn't claim,
// so there is nothing left for `deny_unknown_fields` to reject.
#[derive(Debug, Deserialize)]
pub struct RawFrame {
    #[serde(rename = "type")]
    pub frame_type: String,
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl RawFrame {
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| RelayError::BadRequest(format!("invalid frame json: {e}")))
    }

    /// Deserialize a field if present; `None` if absent, error if present but
    /// the wrong shape.
    pub fn field<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        match self.body.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => serde_json::from_value(v.clone())
                .map(Some)
                .map_err(|e| RelayError::BadRequest(format!("invalid field `{name}`: {e}"))),
        }
    }

    /// Deserialize a required field, erroring if it is absent.
    pub fn require<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        self.field(name)?
            .ok_or_else(|| RelayError::BadRequest(format!("missing field `{name}`")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_header_and_lazy_body() {
        let raw = RawFrame::parse(r#"{"type":"register","role":"teacher","languageCode":"en-US"}"#)
            .expect("valid frame");
        assert_eq!(raw.frame_type, "register");
        let role: String = raw.require("role").expect("role present");
        assert_eq!(role, "teacher");
        let missing: Option<String> = raw.field("teacherId").expect("no error");
        assert!(missing.is_none());
    }

    #[test]
    fn rejects_invalid_json() {
        assert!(RawFrame::parse("not json").is_err());
    }

    #[test]
    fn require_errors_on_missing_field() {
        let raw = RawFrame::parse(r#"{"type":"ping"}"#).expect("valid frame");
        let err = raw.require::<String>("timestamp").unwrap_err();
        assert_eq!(err.client_code().as_str(), "BAD_REQUEST");
    }
}
