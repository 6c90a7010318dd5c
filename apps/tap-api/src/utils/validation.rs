//! 输入验证辅助函数
//!
//! 查询参数与请求体中的枚举值统一在这里解析，失败返回 bad_request_error 响应。
//! 空字符串与缺省等价。

use crate::utils::response::bad_request_error;
use axum::response::Response;
use domain::{Direction, ProtocolFamily};

/// 可选字段去除首尾空格；空串视为未提供
pub fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn parse_protocol(value: Option<String>, field: &str) -> Result<Option<ProtocolFamily>, Response> {
    match normalize_optional(value) {
        Some(value) => value
            .parse::<ProtocolFamily>()
            .map(Some)
            .map_err(|_| bad_request_error(format!("{field} invalid: {value}"))),
        None => Ok(None),
    }
}

pub fn parse_direction(value: Option<String>, field: &str) -> Result<Option<Direction>, Response> {
    match normalize_optional(value) {
        Some(value) => value
            .parse::<Direction>()
            .map(Some)
            .map_err(|_| bad_request_error(format!("{field} invalid: {value}"))),
        None => Ok(None),
    }
}
