//! In-process regeneration queue.
//!
//! Write operations publish tasks and return immediately; the worker drains
//! in FIFO order. At-least-once execution of a task is harmless because
//! regeneration is a pure function of current authoritative state, so the
//! queue makes no delivery guarantees beyond ordering within one process.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use metrics::gauge;
use tokio::sync::Notify;
use tracing::debug;

use super::plan::RegenPlan;

pub const QUEUE_LEN_GAUGE: &str = "lamina_regen_queue_len";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegenTask {
    /// Make the cached page for `slug` match authoritative state.
    RenderPost { slug: String },
    /// Remove the cached page for `slug`.
    DeleteBlob { slug: String },
    /// Regenerate every visible post unconditionally.
    RebuildAll,
}

#[derive(Default)]
pub struct RegenQueue {
    queue: Mutex<VecDeque<RegenTask>>,
    notify: Notify,
}

impl RegenQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, task: RegenTask) {
        debug!(task = ?task, "regeneration task enqueued");
        let len = {
            let mut queue = self.lock();
            queue.push_back(task);
            queue.len()
        };
        gauge!(QUEUE_LEN_GAUGE).set(len as f64);
        self.notify.notify_one();
    }

    /// Enqueue every task a plan implies: the blob deletion first, then the
    /// regenerations in plan order.
    pub fn publish_plan(&self, plan: RegenPlan) {
        if let Some(slug) = plan.delete_blob {
            self.publish(RegenTask::DeleteBlob { slug });
        }
        for slug in plan.regenerate {
            self.publish(RegenTask::RenderPost { slug });
        }
    }

    /// Pop up to `limit` tasks in FIFO order.
    pub fn drain_batch(&self, limit: usize) -> Vec<RegenTask> {
        let tasks: Vec<_> = {
            let mut queue = self.lock();
            let count = limit.min(queue.len());
            queue.drain(..count).collect()
        };
        gauge!(QUEUE_LEN_GAUGE).set(self.len() as f64);
        tasks
    }

    /// Wait until a publish happens. Returns immediately when a publish
    /// raced ahead of the wait.
    pub async fn wait(&self) {
        self.notify.notified().await;
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<RegenTask>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_plan_orders_deletion_before_regeneration() {
        let queue = RegenQueue::new();
        queue.publish_plan(RegenPlan {
            delete_blob: Some("gone".to_string()),
            regenerate: vec!["a".to_string(), "b".to_string()],
        });

        let tasks = queue.drain_batch(10);
        assert_eq!(
            tasks,
            vec![
                RegenTask::DeleteBlob {
                    slug: "gone".to_string()
                },
                RegenTask::RenderPost {
                    slug: "a".to_string()
                },
                RegenTask::RenderPost {
                    slug: "b".to_string()
                },
            ]
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn drain_batch_respects_limit_and_order() {
        let queue = RegenQueue::new();
        for slug in ["one", "two", "three"] {
            queue.publish(RegenTask::RenderPost {
                slug: slug.to_string(),
            });
        }

        let first = queue.drain_batch(2);
        assert_eq!(first.len(), 2);
        assert_eq!(
            first[0],
            RegenTask::RenderPost {
                slug: "one".to_string()
            }
        );
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn wait_returns_after_racing_publish() {
        let queue = RegenQueue::new();
        queue.publish(RegenTask::RebuildAll);
        // The permit from the publish above must satisfy a later wait.
        queue.wait().await;
    }
}
