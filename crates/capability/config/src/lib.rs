//! 抓包服务运行配置加载。

use domain::ProtocolFamily;
use std::env;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 采集源类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// 按到达间隔生成模拟事件。
    Synthetic,
    /// 外部适配器通过 API 推送事件。
    Push,
    Mqtt,
    Tcp,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Synthetic => "synthetic",
            SourceKind::Push => "push",
            SourceKind::Mqtt => "mqtt",
            SourceKind::Tcp => "tcp",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "synthetic" | "demo" => Some(SourceKind::Synthetic),
            "push" => Some(SourceKind::Push),
            "mqtt" => Some(SourceKind::Mqtt),
            "tcp" => Some(SourceKind::Tcp),
            _ => None,
        }
    }
}

/// 应用运行配置。
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_addr: String,
    pub source_name: String,
    pub source_protocol: ProtocolFamily,
    pub source_kind: SourceKind,
    pub buffer_capacity: usize,
    pub arrival_interval_ms: u64,
    pub preview_max_chars: usize,
    pub out_probability: f64,
    pub push_queue_capacity: usize,
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_username: Option<String>,
    pub mqtt_password: Option<String>,
    pub mqtt_topic: String,
    pub tcp_listen_port: u16,
    pub tcp_frame_delimiter: String,
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let http_addr = env::var("TAP_HTTP_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let source_name =
            read_optional("TAP_SOURCE_NAME").unwrap_or_else(|| "demo-source".to_string());
        let source_protocol = match read_optional("TAP_SOURCE_PROTOCOL") {
            Some(value) => value
                .parse::<ProtocolFamily>()
                .map_err(|_| ConfigError::Invalid("TAP_SOURCE_PROTOCOL".to_string(), value))?,
            None => ProtocolFamily::Mqtt,
        };
        let source_kind = match read_optional("TAP_SOURCE_KIND") {
            Some(value) => SourceKind::parse(&value)
                .ok_or_else(|| ConfigError::Invalid("TAP_SOURCE_KIND".to_string(), value))?,
            None => SourceKind::Synthetic,
        };
        let buffer_capacity = read_usize_at_least("TAP_BUFFER_CAPACITY", 100, 1)?;
        let arrival_interval_ms = read_u64_with_default("TAP_ARRIVAL_INTERVAL_MS", 800)?;
        if arrival_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "TAP_ARRIVAL_INTERVAL_MS".to_string(),
                "0".to_string(),
            ));
        }
        let preview_max_chars = read_usize_at_least("TAP_PREVIEW_MAX_CHARS", 100, 1)?;
        let out_probability = read_probability_with_default("TAP_OUT_PROBABILITY", 0.1)?;
        let push_queue_capacity = read_usize_at_least("TAP_PUSH_QUEUE_CAPACITY", 256, 1)?;
        let mqtt_host = env::var("TAP_MQTT_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let mqtt_port = read_u16_with_default("TAP_MQTT_PORT", 1883)?;
        let mqtt_username = read_optional("TAP_MQTT_USERNAME");
        let mqtt_password = read_optional("TAP_MQTT_PASSWORD");
        let mqtt_topic = read_optional("TAP_MQTT_TOPIC").unwrap_or_else(|| "#".to_string());
        let tcp_listen_port = read_u16_with_default("TAP_TCP_LISTEN_PORT", 9000)?;
        let tcp_frame_delimiter =
            read_optional("TAP_TCP_FRAME_DELIMITER").unwrap_or_else(|| "\n".to_string());

        Ok(Self {
            http_addr,
            source_name,
            source_protocol,
            source_kind,
            buffer_capacity,
            arrival_interval_ms,
            preview_max_chars,
            out_probability,
            push_queue_capacity,
            mqtt_host,
            mqtt_port,
            mqtt_username,
            mqtt_password,
            mqtt_topic,
            tcp_listen_port,
            tcp_frame_delimiter,
        })
    }
}

fn read_u16_with_default(key: &str, default: u16) -> Result<u16, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u16>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u64_with_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

/// 读取 usize 并校验下限。
fn read_usize_at_least(key: &str, default: usize, min: usize) -> Result<usize, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    match value.parse::<usize>() {
        Ok(parsed) if parsed >= min => Ok(parsed),
        _ => Err(ConfigError::Invalid(key.to_string(), value)),
    }
}

fn read_probability_with_default(key: &str, default: f64) -> Result<f64, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    match value.parse::<f64>() {
        Ok(parsed) if (0.0..=1.0).contains(&parsed) => Ok(parsed),
        _ => Err(ConfigError::Invalid(key.to_string(), value)),
    }
}

fn read_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}
