//! Thrift-JSON envelope codec.
//!
//! The upstream server speaks the Thrift JSON protocol over HTTP POST. Every
//! message is a self-describing array:
//!
//! ```text
//! [1, "method_name", message_type, sequence_id, {"<field_id>": {"<type>": value}, ...}]
//! ```
//!
//! where message_type is 1 (CALL), 2 (REPLY) or 3 (EXCEPTION), and field values
//! are tagged by a short type key ("str", "i64", "tf", "lst", "rec"). The
//! envelope is parsed into a `serde_json::Value` tree and fields are addressed
//! by stable path rather than byte position, so whitespace and field order in
//! the inbound payload never matter.

use serde_json::{json, Map, Value};

use crate::upstream::types::{Column, ResultSet, ServerStatus, UpstreamError, UpstreamResult};

/// Thrift JSON protocol version carried in every envelope.
pub const PROTOCOL_VERSION: i64 = 1;

/// Message type: outgoing call.
pub const MSG_CALL: i64 = 1;
/// Message type: successful reply.
pub const MSG_REPLY: i64 = 2;
/// Message type: server-side exception.
pub const MSG_EXCEPTION: i64 = 3;

const IDX_METHOD: usize = 1;
const IDX_MSG_TYPE: usize = 2;
const IDX_SEQ: usize = 3;
const IDX_FIELDS: usize = 4;

/// A parsed Thrift-JSON envelope.
#[derive(Debug, Clone)]
pub struct Envelope {
    value: Value,
}

impl Envelope {
    /// Parse raw bytes into an envelope.
    ///
    /// Accepts any five-element JSON array with a string method name; deeper
    /// structure is validated lazily by the accessors.
    pub fn parse(bytes: &[u8]) -> UpstreamResult<Self> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| UpstreamError::Protocol(format!("not JSON: {e}")))?;
        let arr = value
            .as_array()
            .ok_or_else(|| UpstreamError::Protocol("envelope is not an array".into()))?;
        if arr.len() < 5 {
            return Err(UpstreamError::Protocol(format!(
                "envelope has {} elements, expected 5",
                arr.len()
            )));
        }
        if !arr[IDX_METHOD].is_string() {
            return Err(UpstreamError::Protocol("method name is not a string".into()));
        }
        Ok(Self { value })
    }

    /// Build a CALL envelope for `method` with the given tagged fields.
    pub fn call(method: &str, seq: i64, fields: Value) -> Self {
        Self {
            value: json!([PROTOCOL_VERSION, method, MSG_CALL, seq, fields]),
        }
    }

    pub fn method(&self) -> &str {
        self.value[IDX_METHOD].as_str().unwrap_or_default()
    }

    pub fn message_type(&self) -> i64 {
        self.value[IDX_MSG_TYPE].as_i64().unwrap_or_default()
    }

    pub fn seq(&self) -> i64 {
        self.value[IDX_SEQ].as_i64().unwrap_or_default()
    }

    /// Overwrite the sequence-id element.
    pub fn set_seq(&mut self, seq: i64) {
        self.value[IDX_SEQ] = json!(seq);
    }

    fn fields(&self) -> Option<&Map<String, Value>> {
        self.value[IDX_FIELDS].as_object()
    }

    /// Read a string field by id, e.g. `field_str("1")` for the first argument.
    pub fn field_str(&self, id: &str) -> Option<&str> {
        self.fields()?.get(id)?.get("str")?.as_str()
    }

    /// Replace a string field in place. Returns false if the field is absent
    /// or not string-tagged.
    pub fn set_field_str(&mut self, id: &str, new: &str) -> bool {
        match self.value[IDX_FIELDS]
            .get_mut(id)
            .and_then(|f| f.get_mut("str"))
        {
            Some(slot) => {
                *slot = json!(new);
                true
            }
            None => false,
        }
    }

    /// The success field ("0") of a REPLY envelope.
    pub fn reply_value(&self) -> UpstreamResult<&Value> {
        match self.message_type() {
            MSG_REPLY => {}
            MSG_EXCEPTION => return Err(UpstreamError::Exception(self.exception_message())),
            other => {
                return Err(UpstreamError::Protocol(format!(
                    "expected reply, got message type {other}"
                )))
            }
        }
        let fields = self
            .fields()
            .ok_or_else(|| UpstreamError::Protocol("reply has no field map".into()))?;
        // A reply carrying field "1" instead of "0" is a declared thrift
        // exception (e.g. invalid session) even though the message type says REPLY.
        if let Some(exc) = fields.get("1") {
            return Err(UpstreamError::Exception(
                exc.pointer("/rec/1/str")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown server exception")
                    .to_string(),
            ));
        }
        fields
            .get("0")
            .ok_or_else(|| UpstreamError::Protocol("reply missing success field".into()))
    }

    fn exception_message(&self) -> String {
        self.fields()
            .and_then(|f| f.get("1"))
            .and_then(|f| f.get("str"))
            .and_then(Value::as_str)
            .unwrap_or("unknown upstream exception")
            .to_string()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        // Value serialization of a finite tree cannot fail.
        serde_json::to_vec(&self.value).unwrap_or_default()
    }
}

/// Decode a tagged thrift list `["<elem_type>", n, v1, v2, ...]` into its values.
fn list_values(v: &Value) -> UpstreamResult<&[Value]> {
    let arr = v
        .get("lst")
        .and_then(Value::as_array)
        .ok_or_else(|| UpstreamError::Protocol("expected list field".into()))?;
    if arr.len() < 2 {
        return Err(UpstreamError::Protocol("list header truncated".into()));
    }
    Ok(&arr[2..])
}

/// Decode the reply of `get_server_status`: a record with read-only flag,
/// version string and start timestamp.
pub fn decode_server_status(reply: &Value) -> UpstreamResult<ServerStatus> {
    let rec = reply
        .get("rec")
        .ok_or_else(|| UpstreamError::Protocol("server status is not a record".into()))?;
    Ok(ServerStatus {
        read_only: rec.pointer("/1/tf").and_then(Value::as_i64).unwrap_or(0) != 0,
        version: rec
            .pointer("/2/str")
            .and_then(Value::as_str)
            .ok_or_else(|| UpstreamError::Protocol("server status missing version".into()))?
            .to_string(),
        start_time: rec.pointer("/3/i64").and_then(Value::as_i64).unwrap_or(0),
    })
}

/// Decode the reply of `get_tables`: a list of table names.
pub fn decode_table_list(reply: &Value) -> UpstreamResult<Vec<String>> {
    list_values(reply)?
        .iter()
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| UpstreamError::Protocol("table name is not a string".into()))
        })
        .collect()
}

/// Decode the reply of `sql_execute`: a record holding a list of column records.
///
/// Each column record carries field "1" (i64 data list) and field "2"
/// (null bitmap as a tf list).
pub fn decode_result_set(reply: &Value) -> UpstreamResult<ResultSet> {
    let columns_field = reply
        .pointer("/rec/1")
        .ok_or_else(|| UpstreamError::Protocol("result set missing column list".into()))?;
    let mut columns = Vec::new();
    for col in list_values(columns_field)? {
        let int_data = col
            .get("1")
            .map(list_values)
            .transpose()?
            .unwrap_or_default()
            .iter()
            .map(|v| v.as_i64().unwrap_or_default())
            .collect();
        let nulls = col
            .get("2")
            .map(list_values)
            .transpose()?
            .unwrap_or_default()
            .iter()
            .map(|v| v.as_i64().unwrap_or_default() != 0)
            .collect();
        columns.push(Column { nulls, int_data });
    }
    Ok(ResultSet { columns })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_round_trip() {
        let env = Envelope::call("connect", 0, json!({"1": {"str": "mapd"}}));
        let parsed = Envelope::parse(&env.to_bytes()).unwrap();
        assert_eq!(parsed.method(), "connect");
        assert_eq!(parsed.message_type(), MSG_CALL);
        assert_eq!(parsed.field_str("1"), Some("mapd"));
    }

    #[test]
    fn test_set_field_and_seq() {
        let mut env = Envelope::parse(
            br#"[1,"sql_execute",1,0,{"1":{"str":"stale"},"2":{"str":"SELECT 1"}}]"#,
        )
        .unwrap();
        assert!(env.set_field_str("1", "fresh"));
        env.set_seq(7);
        assert_eq!(env.field_str("1"), Some("fresh"));
        assert_eq!(env.seq(), 7);
        // untouched fields survive re-serialization
        let reparsed = Envelope::parse(&env.to_bytes()).unwrap();
        assert_eq!(reparsed.field_str("2"), Some("SELECT 1"));
    }

    #[test]
    fn test_set_field_absent() {
        let mut env = Envelope::parse(br#"[1,"sql_execute",1,0,{}]"#).unwrap();
        assert!(!env.set_field_str("1", "fresh"));
    }

    #[test]
    fn test_reject_malformed() {
        assert!(Envelope::parse(b"not json").is_err());
        assert!(Envelope::parse(b"{}").is_err());
        assert!(Envelope::parse(br#"[1,"connect",1]"#).is_err());
        assert!(Envelope::parse(br#"[1,2,3,4,{}]"#).is_err());
    }

    #[test]
    fn test_reply_value_and_exception() {
        let reply =
            Envelope::parse(br#"[1,"connect",2,0,{"0":{"str":"abc"}}]"#).unwrap();
        assert_eq!(reply.reply_value().unwrap()["str"], "abc");

        let exc = Envelope::parse(
            br#"[1,"connect",3,0,{"1":{"str":"Invalid credentials"}}]"#,
        )
        .unwrap();
        match exc.reply_value() {
            Err(UpstreamError::Exception(msg)) => assert_eq!(msg, "Invalid credentials"),
            other => panic!("expected exception, got {other:?}"),
        }

        let declared = Envelope::parse(
            br#"[1,"sql_execute",2,0,{"1":{"rec":{"1":{"str":"Session not valid"}}}}]"#,
        )
        .unwrap();
        assert!(matches!(
            declared.reply_value(),
            Err(UpstreamError::Exception(_))
        ));
    }

    #[test]
    fn test_decode_server_status() {
        let reply: Value = serde_json::json!({
            "rec": {"1": {"tf": 0}, "2": {"str": "4.1.0"}, "3": {"i64": 1714000000}}
        });
        let status = decode_server_status(&reply).unwrap();
        assert_eq!(status.version, "4.1.0");
        assert_eq!(status.start_time, 1714000000);
        assert!(!status.read_only);
    }

    #[test]
    fn test_decode_table_list() {
        let reply: Value = serde_json::json!({"lst": ["str", 2, "flights", "weather"]});
        assert_eq!(
            decode_table_list(&reply).unwrap(),
            vec!["flights".to_string(), "weather".to_string()]
        );
    }

    #[test]
    fn test_decode_result_set() {
        let reply: Value = serde_json::json!({
            "rec": {"1": {"lst": ["rec", 1, {
                "1": {"lst": ["i64", 1, 3]},
                "2": {"lst": ["tf", 1, 0]},
            }]}}
        });
        let rs = decode_result_set(&reply).unwrap();
        assert_eq!(rs.scalar(), Some(3));
    }
}
