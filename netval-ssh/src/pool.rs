// netval-ssh/src/pool.rs
// ============================================================================
// Module: SSH Worker Pool
// Description: Bounded pool for blocking device I/O off the request path.
// Purpose: Cap concurrent sessions and dispatch work onto blocking threads.
// Dependencies: netval-core, tokio
// ============================================================================

//! ## Overview
//! The pool holds a semaphore with `max_ssh_connections` permits (default 5).
//! Every operation acquires a permit, then runs the blocking session work on
//! a worker thread; excess requests queue on the semaphore. Request handlers
//! only ever await the pool, never a socket.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use netval_core::interfaces::DeviceConnector;
use netval_core::interfaces::IngestOutput;
use netval_core::interfaces::PushResult;
use netval_core::interfaces::SshError;
use netval_core::interfaces::SshTarget;
use tokio::sync::Semaphore;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default concurrent session cap.
pub const DEFAULT_MAX_SESSIONS: usize = 5;

/// Fixed command set one ingest run executes, keyed into the result map.
pub const INGEST_COMMANDS: [&str; 5] = [
    "show running-config",
    "show vlan",
    "show ip interface brief",
    "show cdp neighbors detail",
    "show version",
];

// ============================================================================
// SECTION: Pool
// ============================================================================

/// Bounded SSH worker pool.
#[derive(Clone)]
pub struct SshPool {
    /// Session factory.
    connector: Arc<dyn DeviceConnector>,
    /// Concurrency cap; excess requests queue here.
    permits: Arc<Semaphore>,
}

impl SshPool {
    /// Creates a pool over a connector with the given session cap.
    #[must_use]
    pub fn new(connector: Arc<dyn DeviceConnector>, max_sessions: usize) -> Self {
        Self {
            connector,
            permits: Arc::new(Semaphore::new(max_sessions.max(1))),
        }
    }

    /// Runs one blocking session closure under a pool permit.
    async fn with_session<T, F>(&self, target: SshTarget, body: F) -> Result<T, SshError>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn netval_core::interfaces::DeviceSession) -> Result<T, SshError>
            + Send
            + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| SshError::DeviceUnreachable {
                class: "tokio::sync::AcquireError".to_string(),
                message: "ssh pool is shut down".to_string(),
            })?;
        let connector = Arc::clone(&self.connector);
        let result = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let mut session = connector.connect(&target)?;
            body(session.as_mut())
        })
        .await
        .map_err(|err| SshError::PushFailure {
            class: "tokio::task::JoinError".to_string(),
            message: err.to_string(),
        })?;
        result
    }

    /// Opens one session as a liveness probe and returns the device banner
    /// line from `show version`.
    ///
    /// # Errors
    ///
    /// Returns [`SshError`] when connect, auth, or the probe command fails.
    pub async fn probe(&self, target: SshTarget) -> Result<String, SshError> {
        self.with_session(target, |session| {
            let output = session.run_command("show version")?;
            Ok(output.lines().next().unwrap_or_default().to_string())
        })
        .await
    }

    /// Opens one session and executes the fixed ingest command set,
    /// returning each output keyed by command.
    ///
    /// # Errors
    ///
    /// Returns [`SshError`] when any command fails.
    pub async fn ingest(&self, target: SshTarget) -> Result<IngestOutput, SshError> {
        self.with_session(target, |session| {
            let mut outputs = IngestOutput::new();
            for command in INGEST_COMMANDS {
                let output = session.run_command(command)?;
                outputs.insert(command.to_string(), output);
            }
            Ok(outputs)
        })
        .await
    }

    /// Fetches only the running configuration, for pre-push snapshots.
    ///
    /// # Errors
    ///
    /// Returns [`SshError`] when the command fails.
    pub async fn fetch_running_config(&self, target: SshTarget) -> Result<String, SshError> {
        self.with_session(target, |session| session.run_command("show running-config")).await
    }

    /// Pushes a configuration block line by line.
    ///
    /// The caller is responsible for confirmation gating and for capturing
    /// the pre-push snapshot before invoking this.
    ///
    /// # Errors
    ///
    /// Returns [`SshError`] when any push step fails.
    pub async fn push(
        &self,
        target: SshTarget,
        lines: Vec<String>,
    ) -> Result<PushResult, SshError> {
        self.with_session(target, move |session| session.push_config(&lines)).await
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    use netval_core::interfaces::CredentialMaterial;
    use netval_core::interfaces::DeviceConnector;
    use netval_core::interfaces::DeviceSession;
    use netval_core::interfaces::PushResult;
    use netval_core::interfaces::SshError;
    use netval_core::interfaces::SshTarget;

    use super::INGEST_COMMANDS;
    use super::SshPool;

    /// Connector that tracks peak concurrency and scripts outputs.
    struct FakeConnector {
        active: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
        pushes: Arc<Mutex<Vec<Vec<String>>>>,
    }

    struct FakeSession {
        active: Arc<AtomicUsize>,
        pushes: Arc<Mutex<Vec<Vec<String>>>>,
    }

    impl DeviceConnector for FakeConnector {
        fn connect(&self, _target: &SshTarget) -> Result<Box<dyn DeviceSession>, SshError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            Ok(Box::new(FakeSession {
                active: Arc::clone(&self.active),
                pushes: Arc::clone(&self.pushes),
            }))
        }
    }

    impl DeviceSession for FakeSession {
        fn run_command(&mut self, command: &str) -> Result<String, SshError> {
            std::thread::sleep(std::time::Duration::from_millis(20));
            Ok(format!("output of {command}"))
        }

        fn push_config(&mut self, lines: &[String]) -> Result<PushResult, SshError> {
            self.pushes.lock().unwrap().push(lines.to_vec());
            Ok(PushResult {
                lines_sent: lines.to_vec(),
                transcript: String::new(),
            })
        }
    }

    impl Drop for FakeSession {
        fn drop(&mut self) {
            self.active.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn target() -> SshTarget {
        SshTarget {
            host: "198.51.100.10".to_string(),
            port: 22,
            material: CredentialMaterial {
                username: "admin".to_string(),
                password: Some("secret".to_string()),
                key_path: None,
            },
        }
    }

    #[tokio::test]
    async fn ingest_returns_every_fixed_command() {
        let connector = Arc::new(FakeConnector {
            active: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
            pushes: Arc::new(Mutex::new(Vec::new())),
        });
        let pool = SshPool::new(connector, 2);
        let outputs = pool.ingest(target()).await.expect("ingest");
        assert_eq!(outputs.len(), INGEST_COMMANDS.len());
        for command in INGEST_COMMANDS {
            assert_eq!(outputs[command], format!("output of {command}"));
        }
    }

    #[tokio::test]
    async fn pool_caps_concurrent_sessions() {
        let peak = Arc::new(AtomicUsize::new(0));
        let connector = Arc::new(FakeConnector {
            active: Arc::new(AtomicUsize::new(0)),
            peak: Arc::clone(&peak),
            pushes: Arc::new(Mutex::new(Vec::new())),
        });
        let pool = SshPool::new(connector, 2);
        let mut handles = Vec::new();
        for _ in 0..6 {
            let pool = pool.clone();
            handles.push(tokio::spawn(async move { pool.probe(target()).await }));
        }
        for handle in handles {
            handle.await.expect("join").expect("probe");
        }
        assert!(peak.load(Ordering::SeqCst) <= 2, "peak {} exceeded cap", peak.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn push_forwards_lines_in_order() {
        let pushes = Arc::new(Mutex::new(Vec::new()));
        let connector = Arc::new(FakeConnector {
            active: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
            pushes: Arc::clone(&pushes),
        });
        let pool = SshPool::new(connector, 1);
        let lines = vec!["vlan 30".to_string(), " name VLAN30".to_string()];
        let result = pool.push(target(), lines.clone()).await.expect("push");
        assert_eq!(result.lines_sent, lines);
        assert_eq!(pushes.lock().unwrap().as_slice(), &[lines]);
    }
}
