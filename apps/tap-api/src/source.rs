//! 按配置构造采集源。

use std::net::{Ipv4Addr, SocketAddr};
use tap_config::{AppConfig, SourceKind};
use tap_ingest::{
    ArrivalSource, IngestError, MqttSource, MqttSourceConfig, PushHandle, SyntheticConfig,
    SyntheticSource, TcpFrameConfig, TcpFrameSource, push_channel,
};

/// 返回采集源；push 类额外返回推送句柄供 `/tap/ingest` 使用。
pub async fn build_source(
    config: &AppConfig,
) -> Result<(Box<dyn ArrivalSource>, Option<PushHandle>), IngestError> {
    match config.source_kind {
        SourceKind::Synthetic => {
            let source = SyntheticSource::new(SyntheticConfig {
                protocol: config.source_protocol,
                arrival_interval_ms: config.arrival_interval_ms,
                seed: None,
            });
            Ok((Box::new(source), None))
        }
        SourceKind::Push => {
            let (handle, source) = push_channel(config.push_queue_capacity);
            Ok((Box::new(source), Some(handle)))
        }
        SourceKind::Mqtt => {
            let source = MqttSource::new(MqttSourceConfig {
                host: config.mqtt_host.clone(),
                port: config.mqtt_port,
                username: config.mqtt_username.clone(),
                password: config.mqtt_password.clone(),
                topic: config.mqtt_topic.clone(),
            });
            Ok((Box::new(source), None))
        }
        SourceKind::Tcp => {
            let listen_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.tcp_listen_port));
            let source = TcpFrameSource::bind(TcpFrameConfig {
                frame_delimiter: config.tcp_frame_delimiter.clone(),
                queue_capacity: config.push_queue_capacity,
                ..TcpFrameConfig::new(listen_addr)
            })
            .await?;
            Ok((Box::new(source), None))
        }
    }
}
