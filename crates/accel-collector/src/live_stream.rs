//! Single-client TCP mirror of live samples.
//!
//! The listener is non-blocking and polled from the sampling loop. At most
//! one client is attached; a second connection gets [`REJECTION_LINE`] and
//! is closed. Sends never block: if the client cannot take a whole line
//! right now it is dropped rather than slowing down sampling.

use std::io::{self, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;

use accel_core::{Sample, SampleLine, SensorIdentity};
use tracing::{debug, info, warn};

use crate::error::ProtocolError;

/// Sent to a connection refused because a client is already attached.
pub const REJECTION_LINE: &str = "ERROR: another client is connected\n";

const REJECT_WRITE_TIMEOUT: Duration = Duration::from_millis(100);

/// Connection and delivery counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LiveStreamStats {
    /// Clients attached
    pub clients_accepted: u64,
    /// Connections refused with the rejection line
    pub clients_rejected: u64,
    /// Clients dropped after a failed send
    pub clients_dropped: u64,
    /// Lines delivered
    pub lines_sent: u64,
}

#[derive(Debug)]
struct Client {
    stream: TcpStream,
    peer: SocketAddr,
}

/// Non-blocking single-client line server.
#[derive(Debug)]
pub struct LiveStreamServer {
    listener: TcpListener,
    client: Option<Client>,
    line: String,
    stats: LiveStreamStats,
}

impl LiveStreamServer {
    /// Listen on `addr`.
    pub fn bind(addr: impl ToSocketAddrs) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        info!(addr = %listener.local_addr()?, "Live stream listening");
        Ok(Self {
            listener,
            client: None,
            line: String::with_capacity(64),
            stats: LiveStreamStats::default(),
        })
    }

    /// Bound address (useful when binding port 0).
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Whether a client is attached.
    pub fn has_client(&self) -> bool {
        self.client.is_some()
    }

    /// Counters so far.
    pub fn stats(&self) -> LiveStreamStats {
        self.stats
    }

    /// Handle every connection waiting in the backlog.
    pub fn accept_if_pending(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    if self.client.is_some() {
                        self.reject(stream, peer);
                    } else {
                        self.attach(stream, peer);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!(error = %e, "Live stream accept failed");
                    break;
                }
            }
        }
    }

    fn attach(&mut self, stream: TcpStream, peer: SocketAddr) {
        let setup = stream
            .set_nonblocking(true)
            .and_then(|()| stream.set_nodelay(true));
        if let Err(e) = setup {
            warn!(%peer, error = %e, "Live client setup failed");
            return;
        }
        info!(%peer, "Live client connected");
        self.stats.clients_accepted += 1;
        self.client = Some(Client { stream, peer });
    }

    fn reject(&mut self, mut stream: TcpStream, peer: SocketAddr) {
        let _ = stream.set_write_timeout(Some(REJECT_WRITE_TIMEOUT));
        if let Err(e) = stream.write_all(REJECTION_LINE.as_bytes()) {
            debug!(%peer, error = %e, "Could not send rejection line");
        }
        let _ = stream.shutdown(Shutdown::Both);
        self.stats.clients_rejected += 1;
        info!(%peer, "Rejected live client, one is already connected");
    }

    /// Send one sample line to the attached client, if any.
    ///
    /// On error the client has been dropped and the server keeps listening.
    pub fn broadcast(&mut self, sample: &Sample, identity: &SensorIdentity) -> Result<(), ProtocolError> {
        let Some(client) = self.client.as_mut() else {
            return Ok(());
        };

        self.line.clear();
        SampleLine::new(identity.bus, identity.address, *sample).write_to(&mut self.line);
        let expected = self.line.len();

        let result = match client.stream.write(self.line.as_bytes()) {
            Ok(written) if written == expected => Ok(()),
            Ok(written) => Err(ProtocolError::PartialWrite { written, expected }),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Err(ProtocolError::Backpressure),
            Err(e) => Err(ProtocolError::Disconnected(e)),
        };

        match result {
            Ok(()) => {
                self.stats.lines_sent += 1;
                Ok(())
            }
            Err(e) => {
                let peer = client.peer;
                self.client = None;
                self.stats.clients_dropped += 1;
                info!(%peer, reason = %e, "Live client dropped");
                Err(e)
            }
        }
    }
}
