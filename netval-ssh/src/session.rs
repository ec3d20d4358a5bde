// netval-ssh/src/session.rs
// ============================================================================
// Module: SSH Device Session
// Description: Blocking ssh2-backed DeviceSession and connector.
// Purpose: Open authenticated sessions and run exec/config operations.
// Dependencies: netval-core, ssh2
// ============================================================================

//! ## Overview
//! [`Ssh2Connector`] opens blocking libssh2 sessions with a 15 s connect
//! timeout and a 30 s per-command timeout. The underlying error class name
//! is preserved in every [`SshError`] so job results can report it. These
//! types never run on the request path; the pool dispatches them onto
//! blocking worker threads.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Read;
use std::io::Write;
use std::net::TcpStream;
use std::net::ToSocketAddrs;
use std::path::Path;
use std::time::Duration;

use netval_core::interfaces::DeviceConnector;
use netval_core::interfaces::DeviceSession;
use netval_core::interfaces::PushResult;
use netval_core::interfaces::SshError;
use netval_core::interfaces::SshTarget;
use ssh2::Channel;
use ssh2::Session;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// TCP connect timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
/// Per-command timeout in milliseconds, applied to the whole session.
const COMMAND_TIMEOUT_MS: u32 = 30_000;
/// Settle delay between configuration lines.
const LINE_SETTLE: Duration = Duration::from_millis(200);

// ============================================================================
// SECTION: Connector
// ============================================================================

/// Connector producing blocking libssh2 sessions.
#[derive(Debug, Clone, Default)]
pub struct Ssh2Connector;

impl Ssh2Connector {
    /// Creates the connector.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl DeviceConnector for Ssh2Connector {
    fn connect(&self, target: &SshTarget) -> Result<Box<dyn DeviceSession>, SshError> {
        let address = (target.host.as_str(), target.port)
            .to_socket_addrs()
            .map_err(|err| unreachable_error(&err))?
            .next()
            .ok_or_else(|| SshError::DeviceUnreachable {
                class: "std::io::Error".to_string(),
                message: format!("no address resolved for {}", target.host),
            })?;
        let tcp = TcpStream::connect_timeout(&address, CONNECT_TIMEOUT)
            .map_err(|err| unreachable_error(&err))?;
        let mut session = Session::new().map_err(|err| SshError::DeviceUnreachable {
            class: "ssh2::Error".to_string(),
            message: err.to_string(),
        })?;
        session.set_tcp_stream(tcp);
        session.set_timeout(COMMAND_TIMEOUT_MS);
        session.handshake().map_err(|err| SshError::DeviceUnreachable {
            class: "ssh2::Error".to_string(),
            message: err.to_string(),
        })?;

        let material = &target.material;
        let auth_result = if let Some(password) = &material.password {
            session.userauth_password(&material.username, password)
        } else if let Some(key_path) = &material.key_path {
            session.userauth_pubkey_file(&material.username, None, Path::new(key_path), None)
        } else {
            return Err(SshError::AuthFailure {
                class: "ssh2::Error".to_string(),
                message: "no password or key material provided".to_string(),
            });
        };
        auth_result.map_err(|err| SshError::AuthFailure {
            class: "ssh2::Error".to_string(),
            message: err.to_string(),
        })?;
        if !session.authenticated() {
            return Err(SshError::AuthFailure {
                class: "ssh2::Error".to_string(),
                message: "authentication was not accepted".to_string(),
            });
        }
        Ok(Box::new(Ssh2Session {
            session,
        }))
    }
}

/// Maps a transport-level I/O failure, keeping the error class name.
fn unreachable_error(err: &std::io::Error) -> SshError {
    SshError::DeviceUnreachable {
        class: "std::io::Error".to_string(),
        message: format!("{} ({:?})", err, err.kind()),
    }
}

// ============================================================================
// SECTION: Session
// ============================================================================

/// One authenticated libssh2 session.
struct Ssh2Session {
    /// Underlying session; owns the TCP stream.
    session: Session,
}

impl Ssh2Session {
    /// Opens a fresh exec channel.
    fn channel(&self) -> Result<Channel, SshError> {
        self.session.channel_session().map_err(|err| SshError::DeviceUnreachable {
            class: "ssh2::Error".to_string(),
            message: err.to_string(),
        })
    }
}

impl DeviceSession for Ssh2Session {
    fn run_command(&mut self, command: &str) -> Result<String, SshError> {
        let mut channel = self.channel()?;
        channel.exec(command).map_err(|err| SshError::PushFailure {
            class: "ssh2::Error".to_string(),
            message: format!("exec '{command}' failed: {err}"),
        })?;
        let mut output = String::new();
        channel.read_to_string(&mut output).map_err(|err| {
            if err.kind() == std::io::ErrorKind::TimedOut
                || err.kind() == std::io::ErrorKind::WouldBlock
            {
                SshError::Timeout {
                    seconds: u64::from(COMMAND_TIMEOUT_MS) / 1_000,
                }
            } else {
                SshError::PushFailure {
                    class: "std::io::Error".to_string(),
                    message: format!("read of '{command}' output failed: {err}"),
                }
            }
        })?;
        let _ = channel.wait_close();
        Ok(output)
    }

    fn push_config(&mut self, lines: &[String]) -> Result<PushResult, SshError> {
        let mut channel = self.channel()?;
        channel.request_pty("vt100", None, None).map_err(|err| SshError::PushFailure {
            class: "ssh2::Error".to_string(),
            message: format!("pty request failed: {err}"),
        })?;
        channel.shell().map_err(|err| SshError::PushFailure {
            class: "ssh2::Error".to_string(),
            message: format!("shell open failed: {err}"),
        })?;

        let mut sent = Vec::new();
        let send = |channel: &mut Channel, line: &str| -> Result<(), SshError> {
            channel
                .write_all(line.as_bytes())
                .and_then(|()| channel.write_all(b"\n"))
                .map_err(|err| SshError::PushFailure {
                    class: "std::io::Error".to_string(),
                    message: format!("send of '{line}' failed: {err}"),
                })?;
            std::thread::sleep(LINE_SETTLE);
            Ok(())
        };

        send(&mut channel, "configure terminal")?;
        for line in lines {
            for config_line in line.lines() {
                send(&mut channel, config_line)?;
                sent.push(config_line.to_string());
            }
        }
        send(&mut channel, "end")?;
        send(&mut channel, "write memory")?;
        std::thread::sleep(LINE_SETTLE);

        let mut transcript = String::new();
        let mut buffer = [0_u8; 4096];
        // Drain whatever the device echoed; a timeout here is not a failure.
        while let Ok(read) = channel.read(&mut buffer) {
            if read == 0 {
                break;
            }
            transcript.push_str(&String::from_utf8_lossy(&buffer[..read]));
        }
        let _ = channel.close();
        Ok(PushResult {
            lines_sent: sent,
            transcript,
        })
    }
}
