//! 各协议族的解码规则。
//!
//! 每个协议族一个解码函数，由 [`decode_payload`] 中对 `ProtocolFamily` 的穷尽 `match` 选择；
//! 新增协议族时编译器会强制补齐对应分支。

use crate::DecodeError;
use domain::{ProtocolFamily, RawPayload, TapPayload};
use serde_json::{Map, Value};

/// 单个事件的解码结果。
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPayload {
    pub payload: TapPayload,
    pub summary: String,
    pub size_bytes: u64,
    /// 降级原因；为空表示按协议规则正常解码。
    pub degraded: Option<DecodeError>,
}

/// 原始内容 → (payload, summary)。全函数：畸形输入降级为 `Len: <n>` 摘要而不是报错。
pub fn decode_payload(raw: &RawPayload, protocol: ProtocolFamily) -> DecodedPayload {
    let value = raw_to_value(raw, protocol);
    let decoded = match protocol {
        ProtocolFamily::Mqtt => decode_mqtt(&value),
        ProtocolFamily::Kafka => decode_kafka(&value),
        ProtocolFamily::Http => decode_http(&value),
        ProtocolFamily::GenericTcp => decode_tcp(&value),
    };
    match decoded {
        Ok((payload, summary)) => {
            let size_bytes = serialized_len(&payload);
            DecodedPayload {
                payload,
                summary,
                size_bytes,
                degraded: None,
            }
        }
        Err(err) => {
            let payload = degraded_payload(value);
            let size_bytes = serialized_len(&payload);
            DecodedPayload {
                payload,
                summary: format!("Len: {}", size_bytes),
                size_bytes,
                degraded: Some(err),
            }
        }
    }
}

fn raw_to_value(raw: &RawPayload, protocol: ProtocolFamily) -> Value {
    match raw {
        RawPayload::Structured(value) => value.clone(),
        RawPayload::Bytes(bytes) => {
            if protocol != ProtocolFamily::GenericTcp {
                if let Ok(value @ Value::Object(_)) = serde_json::from_slice::<Value>(bytes) {
                    return value;
                }
            }
            Value::String(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

fn degraded_payload(value: Value) -> TapPayload {
    match value {
        Value::Object(map) => map,
        Value::String(text) => single("raw", Value::String(text)),
        other => single("raw", Value::String(other.to_string())),
    }
}

fn single(key: &str, value: Value) -> TapPayload {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    map
}

fn serialized_len(payload: &TapPayload) -> u64 {
    serde_json::to_string(payload)
        .map(|text| text.len() as u64)
        .unwrap_or(0)
}

fn as_object(value: &Value, protocol: ProtocolFamily) -> Result<&Map<String, Value>, DecodeError> {
    value
        .as_object()
        .ok_or(DecodeError::NotAnObject(protocol))
}

fn required_str<'a>(
    fields: &'a Map<String, Value>,
    protocol: ProtocolFamily,
    field: &'static str,
) -> Result<&'a str, DecodeError> {
    match fields.get(field) {
        Some(Value::String(text)) => Ok(text),
        Some(_) => Err(DecodeError::InvalidField { protocol, field }),
        None => Err(DecodeError::MissingField { protocol, field }),
    }
}

fn required_u64(
    fields: &Map<String, Value>,
    protocol: ProtocolFamily,
    field: &'static str,
) -> Result<u64, DecodeError> {
    match fields.get(field) {
        Some(value) => value
            .as_u64()
            .ok_or(DecodeError::InvalidField { protocol, field }),
        None => Err(DecodeError::MissingField { protocol, field }),
    }
}

fn optional(fields: &Map<String, Value>, field: &str) -> Value {
    fields.get(field).cloned().unwrap_or(Value::Null)
}

/// MQTT：`{topic, qos, value}`，摘要 `PUBLISH [<topic>] (<n> bytes)`。
fn decode_mqtt(value: &Value) -> Result<(TapPayload, String), DecodeError> {
    let protocol = ProtocolFamily::Mqtt;
    let fields = as_object(value, protocol)?;
    let topic = match fields.get("topic") {
        None | Some(Value::Null) => "",
        Some(Value::String(topic)) => topic.as_str(),
        Some(_) => return Err(DecodeError::InvalidField { protocol, field: "topic" }),
    };
    let qos = match fields.get("qos") {
        None | Some(Value::Null) => 0,
        Some(value) => match value.as_u64() {
            Some(qos) if qos <= 2 => qos,
            _ => return Err(DecodeError::InvalidField { protocol, field: "qos" }),
        },
    };
    let message = optional(fields, "value");
    let message_len = match &message {
        Value::String(text) => text.len(),
        other => other.to_string().len(),
    };

    let mut payload = Map::new();
    payload.insert("topic".to_string(), Value::String(topic.to_string()));
    payload.insert("qos".to_string(), Value::from(qos));
    payload.insert("value".to_string(), message);
    let summary = format!("PUBLISH [{}] ({} bytes)", topic, message_len);
    Ok((payload, summary))
}

/// Kafka：`{partition, offset, key, value}`，摘要 `Message: Partition <p>, Offset <o>`。
fn decode_kafka(value: &Value) -> Result<(TapPayload, String), DecodeError> {
    let protocol = ProtocolFamily::Kafka;
    let fields = as_object(value, protocol)?;
    let partition = required_u64(fields, protocol, "partition")?;
    let offset = required_u64(fields, protocol, "offset")?;
    let key = match fields.get("key") {
        None | Some(Value::Null) => Value::Null,
        Some(Value::String(text)) => Value::String(text.clone()),
        Some(_) => return Err(DecodeError::InvalidField { protocol, field: "key" }),
    };

    let mut payload = Map::new();
    payload.insert("partition".to_string(), Value::from(partition));
    payload.insert("offset".to_string(), Value::from(offset));
    payload.insert("key".to_string(), key);
    payload.insert("value".to_string(), optional(fields, "value"));
    let summary = format!("Message: Partition {}, Offset {}", partition, offset);
    Ok((payload, summary))
}

/// HTTP：`{method, path, headers, body}`，摘要 `<METHOD> <path> 200 OK`（状态码仅为示意）。
fn decode_http(value: &Value) -> Result<(TapPayload, String), DecodeError> {
    let protocol = ProtocolFamily::Http;
    let fields = as_object(value, protocol)?;
    let method = required_str(fields, protocol, "method")?.to_ascii_uppercase();
    let path = required_str(fields, protocol, "path")?;
    let headers = match fields.get("headers") {
        None | Some(Value::Null) => Value::Object(Map::new()),
        Some(Value::Object(headers)) => Value::Object(headers.clone()),
        Some(_) => {
            return Err(DecodeError::InvalidField {
                protocol,
                field: "headers",
            });
        }
    };

    let mut payload = Map::new();
    payload.insert("method".to_string(), Value::String(method.clone()));
    payload.insert("path".to_string(), Value::String(path.to_string()));
    payload.insert("headers".to_string(), headers);
    payload.insert("body".to_string(), optional(fields, "body"));
    let summary = format!("{} {} 200 OK", method, path);
    Ok((payload, summary))
}

/// 通用 TCP：`{raw, flags}`，摘要 `Len: <raw 字节数>`。
fn decode_tcp(value: &Value) -> Result<(TapPayload, String), DecodeError> {
    let protocol = ProtocolFamily::GenericTcp;
    let (raw, flags) = match value {
        Value::String(text) => (text.clone(), Vec::new()),
        Value::Object(fields) => {
            let raw = required_str(fields, protocol, "raw")?.to_string();
            let flags = match fields.get("flags") {
                None | Some(Value::Null) => Vec::new(),
                Some(Value::Array(items)) => items.clone(),
                Some(_) => return Err(DecodeError::InvalidField { protocol, field: "flags" }),
            };
            (raw, flags)
        }
        _ => return Err(DecodeError::NotAnObject(protocol)),
    };

    let summary = format!("Len: {}", raw.len());
    let mut payload = Map::new();
    payload.insert("raw".to_string(), Value::String(raw));
    payload.insert("flags".to_string(), Value::Array(flags));
    Ok((payload, summary))
}
