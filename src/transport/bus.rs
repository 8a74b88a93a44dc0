//! Vehicle bus bridge over UDP.
//!
//! Each datagram carries exactly one frame in the `SocketCAN` `can_frame`
//! layout. Reads are non-blocking and only attempted after the reactor
//! reports readiness.

use std::io::ErrorKind;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::info;

use crate::error::TransportError;
use crate::protocol::{CanFrame, WIRE_FRAME_LEN};

#[derive(Debug)]
pub struct CanBus {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl CanBus {
    pub async fn open(bind: SocketAddr, peer: SocketAddr) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(bind)
            .await
            .map_err(|source| TransportError::Open { addr: bind, source })?;
        info!("Bus bridge bound on {}, sending to {}", socket.local_addr()?, peer);
        Ok(Self { socket, peer })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.socket.local_addr()?)
    }

    /// Waits until at least one datagram may be available.
    pub async fn readable(&self) -> Result<(), TransportError> {
        self.socket.readable().await?;
        Ok(())
    }

    /// Takes one pending frame without blocking.
    pub fn try_recv(&self) -> nb::Result<CanFrame, TransportError> {
        // One spare byte so oversized datagrams show up as a length error.
        let mut buf = [0u8; WIRE_FRAME_LEN + 1];
        match self.socket.try_recv_from(&mut buf) {
            Ok((len, _from)) => CanFrame::from_wire(&buf[..len]).map_err(nb::Error::Other),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Err(nb::Error::WouldBlock),
            Err(e) => Err(nb::Error::Other(e.into())),
        }
    }

    pub async fn send(&self, frame: &CanFrame) -> Result<(), TransportError> {
        let wire = frame.to_wire();
        let sent = self.socket.send_to(&wire, self.peer).await?;
        if sent != WIRE_FRAME_LEN {
            return Err(TransportError::FrameLength {
                got: sent,
                expected: WIRE_FRAME_LEN,
            });
        }
        Ok(())
    }
}
