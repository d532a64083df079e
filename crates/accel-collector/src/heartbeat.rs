//! Liveness notifications to an external process monitor.
//!
//! Speaks the systemd notify protocol: one datagram per state change
//! (`READY=1`, `WATCHDOG=1`, `STATUS=...`, `STOPPING=1`) to the socket named
//! by `$NOTIFY_SOCKET` or the configured path. A leading `@` names a Linux
//! abstract socket. With no socket configured every call is a no-op, and a
//! failed send is logged at debug level and otherwise ignored.

use std::env;
use std::os::unix::net::UnixDatagram;
use std::path::PathBuf;

use accel_core::config::HeartbeatConfig;
use tracing::{debug, warn};

/// Environment variable set by the service manager.
pub const NOTIFY_SOCKET_ENV: &str = "NOTIFY_SOCKET";

#[derive(Debug)]
enum Target {
    Path(PathBuf),
    #[cfg(target_os = "linux")]
    Abstract(Vec<u8>),
}

#[derive(Debug)]
struct Channel {
    socket: UnixDatagram,
    target: Target,
}

/// Notification sender; disabled when there is nobody to notify.
#[derive(Debug)]
pub struct Heartbeat {
    channel: Option<Channel>,
}

impl Heartbeat {
    /// A heartbeat that never sends anything.
    pub fn disabled() -> Self {
        Self { channel: None }
    }

    /// Build from configuration, falling back to `$NOTIFY_SOCKET`.
    pub fn from_config(config: &HeartbeatConfig) -> Self {
        if !config.enabled {
            return Self::disabled();
        }
        let socket = config
            .socket
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned())
            .or_else(|| env::var(NOTIFY_SOCKET_ENV).ok());
        match socket {
            Some(name) if !name.is_empty() => Self::connect(&name),
            _ => {
                debug!("No notify socket, heartbeat disabled");
                Self::disabled()
            }
        }
    }

    fn connect(name: &str) -> Self {
        let target = match name.strip_prefix('@') {
            #[cfg(target_os = "linux")]
            Some(abstract_name) => Target::Abstract(abstract_name.as_bytes().to_vec()),
            #[cfg(not(target_os = "linux"))]
            Some(_) => {
                warn!(socket = name, "Abstract notify sockets are not supported here");
                return Self::disabled();
            }
            None => Target::Path(PathBuf::from(name)),
        };
        match UnixDatagram::unbound() {
            Ok(socket) => {
                debug!(socket = name, "Heartbeat enabled");
                Self {
                    channel: Some(Channel { socket, target }),
                }
            }
            Err(e) => {
                warn!(error = %e, "Cannot create notify socket, heartbeat disabled");
                Self::disabled()
            }
        }
    }

    /// Whether notifications are actually sent.
    pub fn is_enabled(&self) -> bool {
        self.channel.is_some()
    }

    /// Startup finished.
    pub fn ready(&self) {
        self.notify("READY=1");
    }

    /// Still alive.
    pub fn watchdog(&self) {
        self.notify("WATCHDOG=1");
    }

    /// Free-form one-line status.
    pub fn status(&self, status: &str) {
        self.notify(&format!("STATUS={status}"));
    }

    /// Shutdown started.
    pub fn stopping(&self) {
        self.notify("STOPPING=1");
    }

    fn notify(&self, message: &str) {
        let Some(channel) = &self.channel else {
            return;
        };
        let sent = match &channel.target {
            Target::Path(path) => channel.socket.send_to(message.as_bytes(), path),
            #[cfg(target_os = "linux")]
            Target::Abstract(name) => {
                use std::os::linux::net::SocketAddrExt;
                std::os::unix::net::SocketAddr::from_abstract_name(name)
                    .and_then(|addr| channel.socket.send_to_addr(message.as_bytes(), &addr))
            }
        };
        if let Err(e) = sent {
            debug!(notification = message, error = %e, "Notify send failed");
        }
    }
}
