//! 路由定义
//!
//! 集中管理所有 API 路由，将路径映射到对应的 handlers：
//! - 健康检查：/health
//! - 会话状态与运行控制：/tap/status, /tap/pause, /tap/resume, /tap/stop, /tap/clear
//! - 事件列表与详情：/tap/events, /tap/events/:sequence_id
//! - 选中状态：/tap/selection
//! - 推送采集：/tap/ingest
//! - 指标：/metrics

use super::AppState;
use super::handlers::*;
use axum::{
    Router,
    routing::{get, post},
};

/// 创建 API 路由
///
/// 返回包含所有 API 端点的 Router，由调用方挂载到 / 和 /api/ 两种前缀
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(get_metrics))
        .route("/tap/status", get(get_status))
        .route("/tap/events", get(list_events))
        .route("/tap/events/:sequence_id", get(get_event))
        .route("/tap/pause", post(pause))
        .route("/tap/resume", post(resume))
        .route("/tap/stop", post(stop))
        .route("/tap/clear", post(clear))
        .route(
            "/tap/selection",
            get(get_selection).put(put_selection).delete(delete_selection),
        )
        .route("/tap/ingest", post(ingest))
}

#[cfg(test)]
mod tests {
    use crate::{AppState, build_app};
    use axum::{
        Router,
        body::Body,
        http::{Method, Request, StatusCode},
    };
    use domain::{Direction, ProtocolFamily, SourceDescriptor};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use std::sync::Arc;
    use std::time::Duration;
    use tap_config::SourceKind;
    use tap_decode::FixedDirection;
    use tap_ingest::{SessionConfig, SyntheticConfig, SyntheticSource, TapSession, push_channel};
    use tower::ServiceExt;

    fn push_app(protocol: ProtocolFamily) -> (Router, Arc<TapSession>) {
        let (handle, source) = push_channel(16);
        let session = Arc::new(TapSession::open(
            SourceDescriptor::new("test-source", protocol),
            SessionConfig::default(),
            Box::new(source),
            Arc::new(FixedDirection(Direction::In)),
        ));
        let state = AppState {
            session: Arc::clone(&session),
            source_kind: SourceKind::Push,
            push: Some(handle),
        };
        (build_app(state), session)
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                builder = builder.header("content-type", "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        let response = app
            .clone()
            .oneshot(builder.body(body).expect("request"))
            .await
            .expect("response");
        let status = response.status();
        let bytes: bytes::Bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json")
        };
        (status, value)
    }

    async fn wait_for_captured(session: &TapSession, count: u64) {
        for _ in 0..200 {
            if session.stats().captured >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("events not captured in time");
    }

    async fn ingest_publish(app: &Router, topic: &str) {
        let (status, _) = call(
            app,
            Method::POST,
            "/tap/ingest",
            Some(json!({"payload": {"topic": topic, "qos": 1, "value": "on"}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn health_is_served_under_both_prefixes() {
        let (app, session) = push_app(ProtocolFamily::Mqtt);
        for uri in ["/health", "/api/health"] {
            let response = app
                .clone()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).expect("request"))
                .await
                .expect("response");
            assert_eq!(response.status(), StatusCode::OK);
            assert!(response.headers().contains_key("x-request-id"));
            assert!(response.headers().contains_key("x-trace-id"));
        }
        session.close().await;
    }

    #[tokio::test]
    async fn ingested_events_are_listed_and_filtered() {
        let (app, session) = push_app(ProtocolFamily::Mqtt);
        ingest_publish(&app, "sensors/temp").await;
        ingest_publish(&app, "sensors/hum").await;
        wait_for_captured(&session, 2).await;

        let (status, body) = call(&app, Method::GET, "/api/tap/events", None).await;
        assert_eq!(status, StatusCode::OK);
        let events = body["data"].as_array().expect("events");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["sequenceId"], 1);
        assert_eq!(events[0]["summary"], "PUBLISH [sensors/temp] (2 bytes)");
        assert_eq!(events[0]["protocol"], "MQTT");

        let (_, body) = call(&app, Method::GET, "/tap/events?q=HUM", None).await;
        let events = body["data"].as_array().expect("events");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["sequenceId"], 2);

        // 关键字原样使用：前导空格参与匹配，全空白不等于"不过滤"
        let (_, body) = call(&app, Method::GET, "/tap/events?q=%20%5Bsensors%2Fhum", None).await;
        let events = body["data"].as_array().expect("events");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["sequenceId"], 2);
        let (_, body) = call(&app, Method::GET, "/tap/events?q=%20%20", None).await;
        assert!(body["data"].as_array().expect("events").is_empty());

        let (status, body) = call(&app, Method::GET, "/tap/events?protocol=AMQP", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID.REQUEST");
        session.close().await;
    }

    #[tokio::test]
    async fn event_detail_and_missing_event() {
        let (app, session) = push_app(ProtocolFamily::Mqtt);
        ingest_publish(&app, "a/b").await;
        wait_for_captured(&session, 1).await;

        let (status, body) = call(&app, Method::GET, "/tap/events/1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["metadata"]["sequenceId"], 1);
        assert_eq!(body["data"]["payload"]["topic"], "a/b");

        let (status, body) = call(&app, Method::GET, "/tap/events/99", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "TAP.NOT_CAPTURED");
        session.close().await;
    }

    #[tokio::test]
    async fn run_state_commands_report_conflicts() {
        let (app, session) = push_app(ProtocolFamily::Mqtt);
        let (status, body) = call(&app, Method::POST, "/tap/pause", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["state"], "PAUSED");

        let (status, body) = call(&app, Method::POST, "/tap/pause", None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "TAP.INVALID_STATE");

        let (status, _) = call(&app, Method::POST, "/tap/stop", None).await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = call(&app, Method::GET, "/tap/status", None).await;
        assert_eq!(body["data"]["state"], "STOPPED");
        assert_eq!(body["data"]["stalled"], false);
        assert_eq!(body["data"]["source"]["kind"], "push");
        session.close().await;
    }

    #[tokio::test]
    async fn selection_lifecycle() {
        let (app, session) = push_app(ProtocolFamily::Mqtt);
        ingest_publish(&app, "a/b").await;
        wait_for_captured(&session, 1).await;

        let (status, body) = call(&app, Method::GET, "/tap/selection", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"].is_null());

        let (status, _) = call(
            &app,
            Method::PUT,
            "/tap/selection",
            Some(json!({"sequenceId": 7})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = call(
            &app,
            Method::PUT,
            "/tap/selection",
            Some(json!({"sequenceId": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["metadata"]["sequenceId"], 1);

        let (_, body) = call(&app, Method::POST, "/tap/clear", None).await;
        assert_eq!(body["data"]["cleared"], 1);
        let (_, body) = call(&app, Method::GET, "/tap/selection", None).await;
        assert!(body["data"].is_null());
        session.close().await;
    }

    #[tokio::test]
    async fn ingest_is_rejected_for_non_push_sources() {
        let session = Arc::new(TapSession::open(
            SourceDescriptor::new("demo", ProtocolFamily::Kafka),
            SessionConfig::default(),
            Box::new(SyntheticSource::new(SyntheticConfig {
                protocol: ProtocolFamily::Kafka,
                arrival_interval_ms: 60_000,
                seed: Some(1),
            })),
            Arc::new(FixedDirection::default()),
        ));
        let app = build_app(AppState {
            session: Arc::clone(&session),
            source_kind: SourceKind::Synthetic,
            push: None,
        });
        let (status, body) = call(
            &app,
            Method::POST,
            "/tap/ingest",
            Some(json!({"payload": {"partition": 0, "offset": 1}})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "TAP.INVALID_STATE");
        session.close().await;
    }

    #[tokio::test]
    async fn metrics_snapshot_is_exposed() {
        let (app, session) = push_app(ProtocolFamily::Mqtt);
        let (status, body) = call(&app, Method::GET, "/metrics", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"]["arrivals"].is_number());
        assert!(body["data"]["decodeDegraded"].is_number());
        session.close().await;
    }
}
