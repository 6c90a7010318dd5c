//! TCP 帧采集源
//!
//! 监听 TCP 端口，每个连接按分隔符切帧（默认 `\n`），帧经内部有界队列交给采集循环。
//! 单个连接的错误只影响该连接。

use crate::{ArrivalSource, IngestError};
use async_trait::async_trait;
use domain::{Direction, RawSourceEvent, now_epoch_ms};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// accept 持续失败（如 EMFILE）时的退避
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// TCP 帧源配置。
#[derive(Debug, Clone)]
pub struct TcpFrameConfig {
    pub listen_addr: SocketAddr,
    /// 帧分隔符；为空时按 `\n` 处理
    pub frame_delimiter: String,
    /// 单帧上限，超出的帧整帧丢弃
    pub max_frame_bytes: usize,
    pub queue_capacity: usize,
}

impl TcpFrameConfig {
    pub fn new(listen_addr: SocketAddr) -> Self {
        Self {
            listen_addr,
            frame_delimiter: "\n".to_string(),
            max_frame_bytes: 64 * 1024,
            queue_capacity: 256,
        }
    }
}

pub struct TcpFrameSource {
    rx: mpsc::Receiver<RawSourceEvent>,
    local_addr: SocketAddr,
    accept_task: JoinHandle<()>,
}

impl TcpFrameSource {
    /// 绑定端口并开始接受连接。
    pub async fn bind(config: TcpFrameConfig) -> Result<Self, IngestError> {
        let listener = TcpListener::bind(config.listen_addr)
            .await
            .map_err(|err| IngestError::Config(format!("tcp bind {}: {}", config.listen_addr, err)))?;
        let local_addr = listener
            .local_addr()
            .map_err(|err| IngestError::Config(err.to_string()))?;
        info!(target: "tap.ingest", addr = %local_addr, "tcp_listening");

        let delimiter = if config.frame_delimiter.is_empty() {
            b"\n".to_vec()
        } else {
            config.frame_delimiter.into_bytes()
        };
        let framing = Framing {
            delimiter,
            max_frame_bytes: config.max_frame_bytes.max(1),
        };
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let accept_task = tokio::spawn(accept_loop(listener, framing, tx));
        Ok(Self {
            rx,
            local_addr,
            accept_task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl Drop for TcpFrameSource {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

#[async_trait]
impl ArrivalSource for TcpFrameSource {
    async fn next_arrival(&mut self) -> Result<RawSourceEvent, IngestError> {
        self.rx.recv().await.ok_or(IngestError::Exhausted)
    }
}

#[derive(Debug, Clone)]
struct Framing {
    delimiter: Vec<u8>,
    max_frame_bytes: usize,
}

/// 单个连接的切帧状态。
///
/// 超过 `max_frame_bytes` 的帧整帧丢弃：分隔符已到达的直接跳过；
/// 未完成的帧清空后进入 discarding，直到下一个分隔符之前的字节都不再转发。
struct FrameSplitter {
    framing: Framing,
    pending: Vec<u8>,
    discarding: bool,
}

impl FrameSplitter {
    fn new(framing: Framing) -> Self {
        Self {
            framing,
            pending: Vec::new(),
            discarding: false,
        }
    }

    /// 追加读到的字节，返回其中所有完整且未超限的帧（不含分隔符）。
    fn feed(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        let delimiter_len = self.framing.delimiter.len();
        self.pending.extend_from_slice(bytes);
        let mut frames = Vec::new();
        while let Some(index) = find(&self.pending, &self.framing.delimiter) {
            let mut frame: Vec<u8> = self.pending.drain(..index + delimiter_len).collect();
            frame.truncate(index);
            if std::mem::take(&mut self.discarding) {
                continue;
            }
            if self.framing.delimiter == b"\n" && frame.last() == Some(&b'\r') {
                frame.pop();
            }
            if frame.len() > self.framing.max_frame_bytes {
                warn!(target: "tap.ingest", len = frame.len(), "tcp_frame_oversized");
                continue;
            }
            if !frame.is_empty() {
                frames.push(frame);
            }
        }
        // 尾部可能是尚未到齐的分隔符（以及 `\r\n` 的 `\r`），不计入帧长
        let slack = delimiter_len - 1 + usize::from(self.framing.delimiter == b"\n");
        if !self.discarding && self.pending.len() > self.framing.max_frame_bytes + slack {
            warn!(target: "tap.ingest", len = self.pending.len(), "tcp_frame_oversized");
            self.discarding = true;
        }
        if self.discarding {
            // 只保留可能是半个分隔符的尾部
            let keep = delimiter_len.saturating_sub(1).min(self.pending.len());
            let skip = self.pending.len() - keep;
            self.pending.drain(..skip);
        }
        frames
    }

    /// 连接关闭时剩余的未完成帧。
    fn finish(self) -> Option<Vec<u8>> {
        let keep = !self.discarding
            && !self.pending.is_empty()
            && self.pending.len() <= self.framing.max_frame_bytes;
        keep.then_some(self.pending)
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

async fn accept_loop(listener: TcpListener, framing: Framing, tx: mpsc::Sender<RawSourceEvent>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                info!(target: "tap.ingest", peer = %peer, "tcp_connection_opened");
                let framing = framing.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    if let Err(err) = read_frames(stream, peer, framing, tx).await {
                        warn!(target: "tap.ingest", peer = %peer, error = %err, "tcp_connection_error");
                    }
                });
            }
            Err(err) => {
                error!(target: "tap.ingest", error = %err, "tcp_accept_failed");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }
}

async fn read_frames(
    mut stream: TcpStream,
    peer: SocketAddr,
    framing: Framing,
    tx: mpsc::Sender<RawSourceEvent>,
) -> std::io::Result<()> {
    let mut splitter = FrameSplitter::new(framing);
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            if let Some(frame) = splitter.finish() {
                let _ = forward(&tx, peer, frame);
            }
            info!(target: "tap.ingest", peer = %peer, "tcp_connection_closed");
            return Ok(());
        }
        for frame in splitter.feed(&chunk[..n]) {
            if !forward(&tx, peer, frame) {
                return Ok(());
            }
        }
    }
}

/// 队列满时丢弃该帧；返回 false 表示采集源已关闭。
fn forward(tx: &mpsc::Sender<RawSourceEvent>, peer: SocketAddr, frame: Vec<u8>) -> bool {
    let event = RawSourceEvent::bytes(now_epoch_ms(), frame).with_direction(Direction::In);
    match tx.try_send(event) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(_)) => {
            warn!(target: "tap.ingest", peer = %peer, "tcp_frame_dropped_queue_full");
            true
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!(target: "tap.ingest", peer = %peer, "tcp_source_closed");
            false
        }
    }
}
