//! Waking sleeping workers.

use std::net::SocketAddr;

use async_trait::async_trait;
use fsim_core::error::CoreError;
use fsim_core::worker::{parse_mac_address, Worker};
use tokio::net::UdpSocket;

/// Length of a wake-on-LAN magic packet: six sync bytes plus 16 MACs.
const MAGIC_PACKET_LEN: usize = 6 + 16 * 6;

#[async_trait]
pub trait WorkerWaker: Send + Sync {
    async fn wake(&self, worker: &Worker) -> Result<(), CoreError>;
}

/// Sends a wake-on-LAN magic packet to a broadcast address.
pub struct WakeOnLan {
    broadcast_addr: SocketAddr,
}

impl WakeOnLan {
    pub fn new(broadcast_addr: SocketAddr) -> Self {
        Self { broadcast_addr }
    }
}

pub fn magic_packet(mac: [u8; 6]) -> [u8; MAGIC_PACKET_LEN] {
    let mut packet = [0xFF; MAGIC_PACKET_LEN];
    for chunk in packet[6..].chunks_exact_mut(6) {
        chunk.copy_from_slice(&mac);
    }
    packet
}

#[async_trait]
impl WorkerWaker for WakeOnLan {
    async fn wake(&self, worker: &Worker) -> Result<(), CoreError> {
        let mac = parse_mac_address(&worker.mac_address)?;
        let transport = |e: std::io::Error| CoreError::Transport(e.to_string());

        let socket = UdpSocket::bind("0.0.0.0:0").await.map_err(transport)?;
        socket.set_broadcast(true).map_err(transport)?;
        socket
            .send_to(&magic_packet(mac), self.broadcast_addr)
            .await
            .map_err(transport)?;

        tracing::info!(
            worker_id = worker.id,
            mac = %worker.mac_address,
            target = %self.broadcast_addr,
            "Sent wake-on-LAN packet",
        );
        Ok(())
    }
}

/// Waker that does nothing. For deployments where workers are always on.
pub struct NoopWaker;

#[async_trait]
impl WorkerWaker for NoopWaker {
    async fn wake(&self, worker: &Worker) -> Result<(), CoreError> {
        tracing::debug!(worker_id = worker.id, "Skipping wake-up");
        Ok(())
    }
}
