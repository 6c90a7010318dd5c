//! 协议抓包 HTTP API：单个抓包会话的状态、事件列表、详情与运行控制。

mod handlers;
mod middleware;
mod routes;
mod source;
mod utils;

use axum::{Router, middleware as axum_middleware};
use domain::SourceDescriptor;
use std::sync::Arc;
use tap_capture::CaptureConfig;
use tap_config::{AppConfig, SourceKind};
use tap_decode::{DecodeConfig, RandomDirection};
use tap_ingest::{PushHandle, SessionConfig, TapSession};
use tap_telemetry::init_tracing;
use tracing::info;

/// 停滞判定：RUNNING 下连续多少个到达间隔没有新事件。
const STALL_INTERVALS: u64 = 5;

#[derive(Clone)]
pub struct AppState {
    pub session: Arc<TapSession>,
    pub source_kind: SourceKind,
    /// 仅 push 类采集源存在
    pub push: Option<PushHandle>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    // 从环境变量加载运行配置
    let config = AppConfig::from_env()?;
    // 初始化结构化日志
    init_tracing();

    let (arrivals, push) = source::build_source(&config).await?;
    let session = Arc::new(TapSession::open(
        SourceDescriptor::new(config.source_name.clone(), config.source_protocol),
        session_config(&config),
        arrivals,
        Arc::new(RandomDirection::new(config.out_probability)),
    ));
    let state = AppState {
        session: Arc::clone(&session),
        source_kind: config.source_kind,
        push,
    };

    let app = build_app(state);
    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    info!(addr = %config.http_addr, kind = config.source_kind.as_str(), "tap_api_listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    session.close().await;
    Ok(())
}

/// 组装完整应用：/ 与 /api 两种前缀 + 请求追踪中间件。
pub fn build_app(state: AppState) -> Router {
    let api = routes::create_api_router();
    Router::new()
        .merge(api.clone())
        .nest("/api", api)
        .with_state(state)
        // 注入 request_id/trace_id
        .layer(axum_middleware::from_fn(middleware::request_context))
}

fn session_config(config: &AppConfig) -> SessionConfig {
    SessionConfig {
        capture: CaptureConfig {
            capacity: config.buffer_capacity,
        },
        decode: DecodeConfig {
            preview_max_chars: config.preview_max_chars,
            ..DecodeConfig::default()
        },
        stall_after_ms: config.arrival_interval_ms.saturating_mul(STALL_INTERVALS),
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // 无法安装信号处理时保持运行
        std::future::pending::<()>().await;
    }
    info!("shutdown_requested");
}
