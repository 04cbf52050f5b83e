//! Per-device command queues, drained by the device's next poll.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;

use super::metrics::METRICS;
use crate::error::AppError;
use crate::models::{CommandRequest, QueuedCommand, MAX_QUEUED_COMMANDS};
use crate::store::{entity, JsonStore};

type Queues = HashMap<String, Vec<QueuedCommand>>;

pub struct CommandQueue {
    store: Arc<JsonStore>,
}

impl CommandQueue {
    pub fn new(store: Arc<JsonStore>) -> Self {
        Self { store }
    }

    /// Append a command; the queue keeps only the newest entries.
    /// Returns the queue depth after the append.
    pub async fn enqueue(
        &self,
        device_id: &str,
        request: CommandRequest,
    ) -> Result<usize, AppError> {
        let command = QueuedCommand {
            command: request.command,
            duration_ms: request.duration_ms,
            timestamp: Utc::now(),
            device_id: device_id.to_string(),
        };
        let device_id = device_id.to_string();
        let mut depth = 0;
        self.store
            .update(entity::COMMANDS, |queues: &mut Queues| {
                let queue = queues.entry(device_id).or_default();
                queue.push(command);
                while queue.len() > MAX_QUEUED_COMMANDS {
                    queue.remove(0);
                }
                depth = queue.len();
            })
            .await?;
        METRICS.commands_enqueued.inc();
        Ok(depth)
    }

    /// Take every pending command in insertion order, atomically. A second
    /// drain without intervening enqueues returns an empty list.
    pub async fn drain(&self, device_id: &str) -> Result<Vec<QueuedCommand>, AppError> {
        let device_id_owned = device_id.to_string();
        let mut drained = Vec::new();
        self.store
            .update(entity::COMMANDS, |queues: &mut Queues| {
                if let Some(queue) = queues.get_mut(&device_id_owned) {
                    drained = std::mem::take(queue);
                }
                queues.retain(|_, q| !q.is_empty());
            })
            .await?;
        if !drained.is_empty() {
            METRICS.commands_drained.inc_by(drained.len() as u64);
            tracing::info!(device_id = %device_id, count = drained.len(), "Commands drained");
        }
        Ok(drained)
    }

    /// Drop every pending command for a device.
    pub async fn clear(&self, device_id: &str) -> Result<(), AppError> {
        let device_id = device_id.to_string();
        self.store
            .update(entity::COMMANDS, |queues: &mut Queues| {
                queues.remove(&device_id);
            })
            .await?;
        Ok(())
    }
}
