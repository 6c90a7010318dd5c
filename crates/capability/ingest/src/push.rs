//! 推送式采集源：外部适配器（Kafka 消费者、HTTP webhook、测试）经有界队列推入原始事件。

use crate::{ArrivalSource, IngestError};
use async_trait::async_trait;
use domain::RawSourceEvent;
use tokio::sync::mpsc;

/// 创建一对推送句柄与采集源。
pub fn push_channel(capacity: usize) -> (PushHandle, PushSource) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (PushHandle { tx }, PushSource { rx })
}

/// 推送句柄，可克隆给多个生产者。
#[derive(Debug, Clone)]
pub struct PushHandle {
    tx: mpsc::Sender<RawSourceEvent>,
}

impl PushHandle {
    /// 非阻塞推送；队列满时直接报错（尽力而为的抓包，不对上游施加背压）。
    pub fn try_push(&self, event: RawSourceEvent) -> Result<(), IngestError> {
        self.tx.try_send(event).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => IngestError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => IngestError::QueueClosed,
        })
    }

    /// 等待队列空位后推送。
    pub async fn push(&self, event: RawSourceEvent) -> Result<(), IngestError> {
        self.tx
            .send(event)
            .await
            .map_err(|_| IngestError::QueueClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// 推送式采集源；所有句柄释放后报告 [`IngestError::Exhausted`]。
#[derive(Debug)]
pub struct PushSource {
    rx: mpsc::Receiver<RawSourceEvent>,
}

#[async_trait]
impl ArrivalSource for PushSource {
    async fn next_arrival(&mut self) -> Result<RawSourceEvent, IngestError> {
        self.rx.recv().await.ok_or(IngestError::Exhausted)
    }
}
