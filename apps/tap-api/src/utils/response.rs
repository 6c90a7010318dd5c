//! HTTP 响应辅助函数和 DTO 转换
//!
//! - 错误响应：bad_request_error, not_captured_error, ingest_error
//! - DTO 转换：event_to_dto, inspection_to_dto
//!
//! 所有错误返回统一的 ApiResponse 格式，HTTP 状态码与错误码一一对应。

use api_contract::{ApiResponse, InspectionDto, InspectionMetadataDto, TapEventDto};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use domain::TapEvent;
use serde_json::Value;
use tap_ingest::IngestError;
use tap_inspect::{InspectError, Inspection};

/// 成功响应
pub fn ok<T: serde::Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
}

/// 错误请求响应
pub fn bad_request_error(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::<()>::error("INVALID.REQUEST", message.into())),
    )
        .into_response()
}

/// 事件不在抓包缓冲中
pub fn not_captured_error(err: InspectError) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::<()>::error("TAP.NOT_CAPTURED", err.to_string())),
    )
        .into_response()
}

/// 采集错误响应
pub fn ingest_error(err: IngestError) -> Response {
    let (status, code) = match &err {
        IngestError::InvalidTransition { .. } => (StatusCode::CONFLICT, "TAP.INVALID_STATE"),
        IngestError::QueueFull | IngestError::QueueClosed => {
            (StatusCode::SERVICE_UNAVAILABLE, "TAP.BACKPRESSURE")
        }
        IngestError::Source(_) | IngestError::Exhausted | IngestError::Config(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL.ERROR")
        }
    };
    (status, Json(ApiResponse::<()>::error(code, err.to_string()))).into_response()
}

/// 非 push 类采集源不接受推送
pub fn push_disabled_error() -> Response {
    (
        StatusCode::CONFLICT,
        Json(ApiResponse::<()>::error(
            "TAP.INVALID_STATE",
            "source does not accept pushed events",
        )),
    )
        .into_response()
}

/// TapEvent 转 TapEventDto
pub fn event_to_dto(event: &TapEvent) -> TapEventDto {
    TapEventDto {
        sequence_id: event.sequence_id,
        captured_at_ms: event.captured_at_ms,
        direction: event.direction.as_str().to_string(),
        protocol: event.protocol.as_str().to_string(),
        size_bytes: event.size_bytes,
        payload: Value::Object(event.payload.clone()),
        summary: event.summary.clone(),
        raw_preview: event.raw_preview.clone(),
    }
}

/// Inspection 转 InspectionDto
pub fn inspection_to_dto(inspection: Inspection) -> InspectionDto {
    let metadata = inspection.metadata;
    InspectionDto {
        payload: Value::Object(inspection.payload),
        raw_preview: inspection.raw_preview,
        metadata: InspectionMetadataDto {
            sequence_id: metadata.sequence_id,
            captured_at_ms: metadata.captured_at_ms,
            protocol: metadata.protocol.as_str().to_string(),
            direction: metadata.direction.as_str().to_string(),
            size_bytes: metadata.size_bytes,
            summary: metadata.summary,
        },
    }
}
