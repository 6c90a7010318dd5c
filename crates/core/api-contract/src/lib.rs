//! 稳定的 DTO 与 API 响应契约。

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 标准 API 响应封装。
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

/// 失败响应的错误体。
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.into(),
                message: message.into(),
            }),
        }
    }
}

/// 健康检查返回结构。
#[derive(Debug, Serialize)]
pub struct HealthDto {
    pub ok: bool,
}

/// 抓包事件列表项。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TapEventDto {
    pub sequence_id: u64,
    pub captured_at_ms: i64,
    pub direction: String,
    pub protocol: String,
    pub size_bytes: u64,
    pub payload: Value,
    pub summary: String,
    pub raw_preview: String,
}

/// 事件元数据。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectionMetadataDto {
    pub sequence_id: u64,
    pub captured_at_ms: i64,
    pub protocol: String,
    pub direction: String,
    pub size_bytes: u64,
    pub summary: String,
}

/// 单事件详情。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectionDto {
    pub payload: Value,
    pub raw_preview: String,
    pub metadata: InspectionMetadataDto,
}

/// 采集源描述。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDto {
    pub name: String,
    pub protocol: String,
    pub kind: String,
}

/// 会话状态。空缓冲或停滞的采集源在这里体现，而不是作为错误返回。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TapStatusDto {
    pub source: SourceDto,
    pub state: String,
    pub stalled: bool,
    pub buffered: usize,
    pub capacity: usize,
    pub captured: u64,
    pub evicted: u64,
    pub dropped_while_paused: u64,
    pub adapter_errors: u64,
    pub next_sequence_id: u64,
    pub last_capture_ms: Option<i64>,
    pub selected_sequence_id: Option<u64>,
}

/// 运行状态变更结果。
#[derive(Debug, Serialize)]
pub struct RunStateDto {
    pub state: String,
}

/// 清空缓冲结果。
#[derive(Debug, Serialize)]
pub struct ClearDto {
    pub cleared: usize,
}

/// 事件列表查询参数。
#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    /// 不区分大小写的子串
    pub q: Option<String>,
    pub protocol: Option<String>,
    pub direction: Option<String>,
}

/// 选中请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectRequest {
    #[serde(alias = "sequence_id")]
    pub sequence_id: u64,
}

/// 推送原始事件请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestRequest {
    pub payload: Value,
    /// `IN` / `OUT`；为空时由方向策略决定
    pub direction: Option<String>,
    #[serde(alias = "received_at_ms")]
    pub received_at_ms: Option<i64>,
}

/// 推送结果。
#[derive(Debug, Serialize)]
pub struct AcceptedDto {
    pub accepted: bool,
}

/// 抓包指标。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsDto {
    pub arrivals: u64,
    pub captured: u64,
    pub dropped_paused: u64,
    pub adapter_errors: u64,
    pub decode_degraded: u64,
    pub evicted: u64,
    pub cleared: u64,
}
