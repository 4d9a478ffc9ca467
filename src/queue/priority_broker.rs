// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::task::{Priority, Task};
use crate::utils::errors::QueueError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{timeout_at, Instant};

/// 各优先级队列长度
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueDepths {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl QueueDepths {
    pub fn get(&self, priority: Priority) -> usize {
        match priority {
            Priority::High => self.high,
            Priority::Medium => self.medium,
            Priority::Low => self.low,
        }
    }

    pub fn total(&self) -> usize {
        self.high + self.medium + self.low
    }
}

/// 优先级消息代理特质
///
/// 三个独立的 FIFO 队列，出队严格按 high → medium → low 检查。
/// 高优先级流量可以无限期推迟低优先级任务，这是有意接受的取舍。
/// 重试任务追加到原优先级队列的尾部，不会插到同级新任务之前。
#[async_trait]
pub trait PriorityBroker: Send + Sync {
    /// 入队到任务优先级对应队列的尾部
    async fn enqueue(&self, task: Task) -> Result<(), QueueError>;

    /// 放回到任务优先级对应队列的头部
    ///
    /// 用于已出队但尚未开始处理的任务，保持同级任务的原有顺序
    async fn requeue_front(&self, task: Task) -> Result<(), QueueError>;

    /// 出队；三个队列都为空时最多等待 `wait`，超时返回 `None`
    async fn dequeue(&self, wait: Duration) -> Result<Option<Task>, QueueError>;

    /// 非阻塞出队，队列为空时立即返回 `None`
    async fn try_dequeue(&self) -> Result<Option<Task>, QueueError>;

    /// 队列长度
    async fn depths(&self) -> Result<QueueDepths, QueueError>;
}

#[async_trait]
impl<T: PriorityBroker + ?Sized> PriorityBroker for Arc<T> {
    async fn enqueue(&self, task: Task) -> Result<(), QueueError> {
        (**self).enqueue(task).await
    }

    async fn requeue_front(&self, task: Task) -> Result<(), QueueError> {
        (**self).requeue_front(task).await
    }

    async fn dequeue(&self, wait: Duration) -> Result<Option<Task>, QueueError> {
        (**self).dequeue(wait).await
    }

    async fn try_dequeue(&self) -> Result<Option<Task>, QueueError> {
        (**self).try_dequeue().await
    }

    async fn depths(&self) -> Result<QueueDepths, QueueError> {
        (**self).depths().await
    }
}

fn slot(priority: Priority) -> usize {
    match priority {
        Priority::High => 0,
        Priority::Medium => 1,
        Priority::Low => 2,
    }
}

/// 进程内优先级代理
///
/// 每个优先级一个 `VecDeque`，由同一把锁保护；空队列上的消费者
/// 通过 `Notify` 等待，每次入队唤醒一个等待者。
#[derive(Default)]
pub struct InMemoryPriorityBroker {
    queues: Mutex<[VecDeque<Task>; 3]>,
    available: Notify,
}

impl InMemoryPriorityBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn pop_ready(&self) -> Option<Task> {
        self.queues.lock().iter_mut().find_map(|queue| queue.pop_front())
    }

    fn push(&self, task: Task, front: bool) {
        {
            let mut queues = self.queues.lock();
            let queue = &mut queues[slot(task.priority)];
            if front {
                queue.push_front(task);
            } else {
                queue.push_back(task);
            }
        }
        self.available.notify_one();
    }
}

#[async_trait]
impl PriorityBroker for InMemoryPriorityBroker {
    async fn enqueue(&self, task: Task) -> Result<(), QueueError> {
        self.push(task, false);
        Ok(())
    }

    async fn requeue_front(&self, task: Task) -> Result<(), QueueError> {
        self.push(task, true);
        Ok(())
    }

    async fn dequeue(&self, wait: Duration) -> Result<Option<Task>, QueueError> {
        let deadline = Instant::now() + wait;

        loop {
            // 先登记等待再检查队列，检查与等待之间的入队不会丢失唤醒
            let notified = self.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(task) = self.pop_ready() {
                return Ok(Some(task));
            }

            if timeout_at(deadline, notified).await.is_err() {
                return Ok(self.pop_ready());
            }
        }
    }

    async fn try_dequeue(&self) -> Result<Option<Task>, QueueError> {
        Ok(self.pop_ready())
    }

    async fn depths(&self) -> Result<QueueDepths, QueueError> {
        let queues = self.queues.lock();
        Ok(QueueDepths {
            high: queues[0].len(),
            medium: queues[1].len(),
            low: queues[2].len(),
        })
    }
}
