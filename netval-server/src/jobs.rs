// netval-server/src/jobs.rs
// ============================================================================
// Module: Job Manager
// Description: Job lifecycle persistence and WebSocket event multiplexing.
// Purpose: Stream progress events in submission order and persist terminal
//          results so late subscribers read them from the job row.
// Dependencies: netval-core, serde, tokio
// ============================================================================

//! ## Overview
//! The manager pairs persisted job rows with a process-wide subscription
//! table guarded by a mutex. Events on one subscription deliver in
//! submission order; the last event for any terminated job is the full
//! result payload. Subscribers joining after termination read the persisted
//! row instead. `publish` is synchronous so blocking engine code can emit
//! progress without touching the runtime.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use netval_core::interfaces::TopologyStore;
use netval_core::model::DeviceId;
use netval_core::model::JobId;
use netval_core::model::JobStatus;
use serde::Deserialize;
use serde::Serialize;
use tokio::sync::mpsc;

// ============================================================================
// SECTION: Events
// ============================================================================

/// Structured events streamed to job subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEvent {
    /// A validation check is about to run.
    CheckStart {
        /// Stable check identifier.
        check_id: String,
    },
    /// A validation check finished.
    CheckComplete {
        /// Stable check identifier.
        check_id: String,
        /// Failure findings the check produced.
        failed: usize,
    },
    /// One configuration line is being pushed.
    PushLine {
        /// Target device.
        device_id: DeviceId,
        /// Line content.
        line: String,
    },
    /// One device finished its push.
    PushDeviceComplete {
        /// Target device.
        device_id: DeviceId,
        /// Whether the device push succeeded.
        success: bool,
    },
    /// Terminal success; carries the full result payload.
    Complete {
        /// Self-describing job result.
        result: serde_json::Value,
    },
    /// Terminal failure; carries the full result payload.
    Failed {
        /// Self-describing job result including the error.
        result: serde_json::Value,
    },
}

impl JobEvent {
    /// Returns true for the two terminal event kinds.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Failed { .. })
    }
}

// ============================================================================
// SECTION: Manager
// ============================================================================

/// Subscription table entry.
type Subscribers = Vec<mpsc::UnboundedSender<JobEvent>>;

/// Job manager multiplexing progress events to WebSocket subscribers.
#[derive(Clone)]
pub struct JobManager {
    /// Persistent store for job rows.
    store: Arc<dyn TopologyStore>,
    /// Process-wide subscription table, mutated under the internal lock.
    subscribers: Arc<Mutex<HashMap<JobId, Subscribers>>>,
}

impl JobManager {
    /// Creates a manager over the store.
    #[must_use]
    pub fn new(store: Arc<dyn TopologyStore>) -> Self {
        Self {
            store,
            subscribers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Subscribes to a job's event stream.
    #[must_use]
    pub fn subscribe(&self, job: &JobId) -> mpsc::UnboundedReceiver<JobEvent> {
        let (sender, receiver) = mpsc::unbounded_channel();
        if let Ok(mut table) = self.subscribers.lock() {
            table.entry(job.clone()).or_default().push(sender);
        }
        receiver
    }

    /// Publishes one event to every live subscriber, in submission order.
    ///
    /// Safe to call from blocking worker threads.
    pub fn publish(&self, job: &JobId, event: &JobEvent) {
        if let Ok(mut table) = self.subscribers.lock() {
            if let Some(senders) = table.get_mut(job) {
                senders.retain(|sender| sender.send(event.clone()).is_ok());
            }
        }
    }

    /// Terminates a job: persists the final status and result, then emits
    /// the terminal event and drops the subscription entry.
    pub async fn finish(&self, job: &JobId, status: JobStatus, result: serde_json::Value) {
        let store = Arc::clone(&self.store);
        let job_id = job.clone();
        let persisted = result.clone();
        let write = tokio::task::spawn_blocking(move || {
            store.finish_job(&job_id, status, &persisted)
        })
        .await;
        match write {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::warn!(job = %job, error = %err, "job result persist failed"),
            Err(err) => tracing::warn!(job = %job, error = %err, "job persist task failed"),
        }
        let event = if status == JobStatus::Complete {
            JobEvent::Complete {
                result,
            }
        } else {
            JobEvent::Failed {
                result,
            }
        };
        self.publish(job, &event);
        if let Ok(mut table) = self.subscribers.lock() {
            table.remove(job);
        }
    }

    /// Marks every non-terminal job failed, for graceful shutdown.
    pub async fn fail_open_jobs(&self) {
        let store = Arc::clone(&self.store);
        let open = tokio::task::spawn_blocking(move || store.list_open_jobs()).await;
        let Ok(Ok(open)) = open else {
            return;
        };
        for job in open {
            self.finish(
                &job.id,
                JobStatus::Failed,
                serde_json::json!({"error": "server shut down while the job was running"}),
            )
            .await;
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use netval_core::interfaces::TopologyStore;
    use netval_core::model::JobKind;
    use netval_core::model::JobStatus;
    use netval_core::model::NewProject;
    use netval_store_sqlite::SqliteStoreConfig;
    use netval_store_sqlite::SqliteTopologyStore;
    use serde_json::json;
    use tempfile::TempDir;

    use super::JobEvent;
    use super::JobManager;

    fn store_in(temp: &TempDir) -> Arc<dyn TopologyStore> {
        let config = SqliteStoreConfig::at(temp.path().join("netval.db"));
        Arc::new(SqliteTopologyStore::open(&config).expect("store open"))
    }

    #[tokio::test]
    async fn events_deliver_in_submission_order_then_terminate() {
        let temp = TempDir::new().expect("tempdir");
        let store = store_in(&temp);
        let project = store
            .create_project(&NewProject {
                name: "p".to_string(),
                description: None,
            })
            .expect("project");
        let job = store.create_job(&project.id, JobKind::Simulation).expect("job");

        let manager = JobManager::new(Arc::clone(&store));
        let mut receiver = manager.subscribe(&job.id);
        manager.publish(
            &job.id,
            &JobEvent::CheckStart {
                check_id: "VLAN_CONTINUITY".to_string(),
            },
        );
        manager.publish(
            &job.id,
            &JobEvent::CheckComplete {
                check_id: "VLAN_CONTINUITY".to_string(),
                failed: 1,
            },
        );
        manager.finish(&job.id, JobStatus::Complete, json!({"summary": 1})).await;

        assert!(matches!(receiver.recv().await, Some(JobEvent::CheckStart { .. })));
        assert!(matches!(receiver.recv().await, Some(JobEvent::CheckComplete { .. })));
        let terminal = receiver.recv().await.expect("terminal event");
        assert!(terminal.is_terminal());

        let row = store.get_job(&job.id).expect("job row");
        assert_eq!(row.status, JobStatus::Complete);
        assert_eq!(row.result, Some(json!({"summary": 1})));
    }

    #[tokio::test]
    async fn shutdown_marks_running_jobs_failed() {
        let temp = TempDir::new().expect("tempdir");
        let store = store_in(&temp);
        let project = store
            .create_project(&NewProject {
                name: "p".to_string(),
                description: None,
            })
            .expect("project");
        let job = store.create_job(&project.id, JobKind::Ingestion).expect("job");
        store.start_job(&job.id).expect("start");

        let manager = JobManager::new(Arc::clone(&store));
        manager.fail_open_jobs().await;
        let row = store.get_job(&job.id).expect("job row");
        assert_eq!(row.status, JobStatus::Failed);
    }
}
