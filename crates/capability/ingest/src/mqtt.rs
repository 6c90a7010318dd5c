//! MQTT 采集源
//!
//! 订阅一个主题过滤器，每个到达的 PUBLISH 转为 `{topic, qos, value}`。
//! eventloop 出错时丢弃连接并报告本次错误，下一次拉取前退避 1 秒后重连。

use crate::{ArrivalSource, IngestError};
use async_trait::async_trait;
use domain::{Direction, RawSourceEvent, now_epoch_ms};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, Publish, QoS};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::info;

const RECONNECT_BACKOFF: Duration = Duration::from_secs(1);

/// MQTT 采集源配置。
#[derive(Debug, Clone)]
pub struct MqttSourceConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub topic: String,
}

pub struct MqttSource {
    config: MqttSourceConfig,
    connection: Option<(AsyncClient, EventLoop)>,
    backoff: bool,
}

impl MqttSource {
    pub fn new(config: MqttSourceConfig) -> Self {
        Self {
            config,
            connection: None,
            backoff: false,
        }
    }

    pub fn config(&self) -> &MqttSourceConfig {
        &self.config
    }

    /// 不借用 `self`：EventLoop 不是 Sync，`&Self` 不能跨 await 持有。
    async fn connect(config: MqttSourceConfig) -> Result<(AsyncClient, EventLoop), IngestError> {
        let client_id = format!("tap-mqtt-{}", uuid::Uuid::new_v4());
        let mut options = MqttOptions::new(client_id, config.host.clone(), config.port);
        options.set_keep_alive(Duration::from_secs(30));
        if let (Some(username), Some(password)) =
            (config.username.as_ref(), config.password.as_ref())
        {
            options.set_credentials(username, password);
        }

        let (client, eventloop) = AsyncClient::new(options, 10);
        client
            .subscribe(config.topic.clone(), QoS::AtMostOnce)
            .await
            .map_err(|err| IngestError::Source(err.to_string()))?;
        info!(
            target: "tap.ingest",
            host = %config.host,
            port = config.port,
            topic = %config.topic,
            "mqtt_subscribed"
        );
        Ok((client, eventloop))
    }
}

#[async_trait]
impl ArrivalSource for MqttSource {
    async fn next_arrival(&mut self) -> Result<RawSourceEvent, IngestError> {
        if self.backoff {
            tokio::time::sleep(RECONNECT_BACKOFF).await;
            self.backoff = false;
        }
        if self.connection.is_none() {
            match Self::connect(self.config.clone()).await {
                Ok(connection) => self.connection = Some(connection),
                Err(err) => {
                    self.backoff = true;
                    return Err(err);
                }
            }
        }
        let Some((_, eventloop)) = self.connection.as_mut() else {
            return Err(IngestError::Source("mqtt connection unavailable".to_string()));
        };
        let polled = loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => break Ok(publish),
                Ok(_) => {}
                Err(err) => break Err(err),
            }
        };
        match polled {
            Ok(publish) => Ok(publish_to_raw(&publish)),
            Err(err) => {
                self.connection = None;
                self.backoff = true;
                Err(IngestError::Source(err.to_string()))
            }
        }
    }
}

/// PUBLISH → `{topic, qos, value}`；payload 能解析为 JSON 时保留结构，否则按 UTF-8 文本。
fn publish_to_raw(publish: &Publish) -> RawSourceEvent {
    let value = serde_json::from_slice::<Value>(&publish.payload)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&publish.payload).into_owned()));
    RawSourceEvent::structured(
        now_epoch_ms(),
        json!({
            "topic": publish.topic,
            "qos": publish.qos as u8,
            "value": value,
        }),
    )
    .with_direction(Direction::In)
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::RawPayload;

    #[test]
    fn publish_payload_is_parsed_as_json_when_possible() {
        let publish = Publish::new("sensors/temp", QoS::AtLeastOnce, r#"{"c":21.5}"#);
        let raw = publish_to_raw(&publish);
        assert_eq!(raw.direction, Some(Direction::In));
        assert_eq!(
            raw.payload,
            RawPayload::Structured(json!({"topic": "sensors/temp", "qos": 1, "value": {"c": 21.5}}))
        );
    }

    #[tokio::test]
    async fn unreachable_broker_reports_source_error_and_resets() {
        // 端口 1 上没有 broker：订阅请求只入队，首次 poll 时连接被拒绝
        let mut source: Box<dyn ArrivalSource> = Box::new(MqttSource::new(MqttSourceConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            username: None,
            password: None,
            topic: "sensors/#".to_string(),
        }));
        let result = tokio::time::timeout(Duration::from_secs(5), source.next_arrival())
            .await
            .expect("poll should fail fast");
        assert!(matches!(result, Err(IngestError::Source(_))));
    }

    #[test]
    fn non_json_payload_becomes_text() {
        let publish = Publish::new("a/b", QoS::AtMostOnce, "on");
        let raw = publish_to_raw(&publish);
        assert_eq!(
            raw.payload,
            RawPayload::Structured(json!({"topic": "a/b", "qos": 0, "value": "on"}))
        );
    }
}
