//! Wireless peripheral link.
//!
//! Stands in for the GATT service: connected clients write command bytes
//! and receive every notification. One byte on the stream is one
//! characteristic write.

use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::NotifyError;
use crate::protocol::Notification;

const WRITE_QUEUE_SIZE: usize = 64;
const NOTIFY_BUFFER_SIZE: usize = 32;
const READ_CHUNK_SIZE: usize = 64;

/// One write to the command characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandWrite {
    pub value: [u8; 1],
    pub client: SocketAddr,
}

#[derive(Debug)]
pub struct WirelessLink {
    writes: mpsc::Receiver<CommandWrite>,
    notifications: broadcast::Sender<Notification>,
    local_addr: SocketAddr,
    server: JoinHandle<()>,
}

impl WirelessLink {
    pub async fn open(listen: SocketAddr) -> std::io::Result<Self> {
        let listener = TcpListener::bind(listen).await?;
        let local_addr = listener.local_addr()?;
        info!("Wireless link listening on {}", local_addr);

        let (write_tx, writes) = mpsc::channel(WRITE_QUEUE_SIZE);
        let (notifications, _) = broadcast::channel(NOTIFY_BUFFER_SIZE);

        let server = tokio::spawn(accept_loop(listener, write_tx, notifications.clone()));

        Ok(Self {
            writes,
            notifications,
            local_addr,
            server,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub async fn next_write(&mut self) -> Option<CommandWrite> {
        self.writes.recv().await
    }

    /// Pushes a notification to every connected client. Returns how many got it.
    pub fn notify(&self, notification: Notification) -> Result<usize, NotifyError> {
        self.notifications
            .send(notification)
            .map_err(|_| NotifyError::NoSubscribers)
    }
}

impl Drop for WirelessLink {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn accept_loop(
    listener: TcpListener,
    writes: mpsc::Sender<CommandWrite>,
    notifications: broadcast::Sender<Notification>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("Wireless client connected: {}", addr);
                let client_writes = writes.clone();
                let client_notifications = notifications.subscribe();

                tokio::spawn(async move {
                    if let Err(e) = handle_client(stream, addr, client_writes, client_notifications).await {
                        warn!("Wireless client {} error: {}", addr, e);
                    }
                    info!("Wireless client disconnected: {}", addr);
                });
            }
            Err(e) => {
                error!("Failed to accept wireless client: {}", e);
            }
        }
    }
}

async fn handle_client(
    stream: TcpStream,
    addr: SocketAddr,
    writes: mpsc::Sender<CommandWrite>,
    mut notifications: broadcast::Receiver<Notification>,
) -> std::io::Result<()> {
    let (mut reader, mut writer) = stream.into_split();

    let notify_task = tokio::spawn(async move {
        loop {
            match notifications.recv().await {
                Ok(notification) => {
                    if let Err(e) = writer.write_all(notification.as_bytes()).await {
                        debug!("Failed to notify {}: {}", addr, e);
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("Client {} skipped {} notifications", addr, skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let mut buf = [0u8; READ_CHUNK_SIZE];
    let result = loop {
        match reader.read(&mut buf).await {
            Ok(0) => break Ok(()),
            Ok(n) => {
                for &byte in &buf[..n] {
                    let write = CommandWrite {
                        value: [byte],
                        client: addr,
                    };
                    if writes.send(write).await.is_err() {
                        // Reactor is gone; nothing left to deliver to.
                        notify_task.abort();
                        return Ok(());
                    }
                }
            }
            Err(e) => break Err(e),
        }
    };

    notify_task.abort();
    result
}
