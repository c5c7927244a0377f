//! Collection of ensemble summaries across processes.
//!
//! The exchange is synchronous and one-shot: a sender transmits its
//! measurement count followed by its raw measurements, and a receiver takes
//! the next packet from any source and reports which source it came from.
//! Retries and backoff belong to the transport, not to the metrics.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, PoisonError};

use ens_core::errors::{EnsembleError, ErrorInfo};
use serde::{Deserialize, Serialize};

use crate::serde::{from_json_slice, to_canonical_json_bytes};

/// Wire payload carrying one node's raw measurements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryPacket {
    /// Number of items the sender absorbed.
    pub count: usize,
    /// Raw measurements in the sender's absorption order.
    pub values: Vec<f64>,
}

impl SummaryPacket {
    /// Checks that the advertised count matches the payload.
    pub fn validate(&self) -> Result<(), EnsembleError> {
        if self.count != self.values.len() {
            return Err(EnsembleError::Data(
                ErrorInfo::new("transport.count_mismatch", "packet count disagrees with payload")
                    .with_context("count", self.count.to_string())
                    .with_context("values", self.values.len().to_string()),
            ));
        }
        Ok(())
    }
}

/// Point-to-point transport between collection nodes.
pub trait SummaryTransport: Send + Sync {
    /// Index of the local node.
    fn rank(&self) -> usize;

    /// Sends a packet to the node with index `to`.
    fn send(&self, to: usize, packet: &SummaryPacket) -> Result<(), EnsembleError>;

    /// Blocks until a packet arrives from any node, returning its source.
    fn receive(&self) -> Result<(usize, SummaryPacket), EnsembleError>;
}

type Envelope = (usize, Vec<u8>);

/// In-process transport over std channels; packets travel as canonical JSON.
#[derive(Debug)]
pub struct ChannelTransport {
    rank: usize,
    peers: Mutex<Vec<Sender<Envelope>>>,
    inbox: Mutex<Receiver<Envelope>>,
}

impl ChannelTransport {
    /// Builds a fully connected mesh of `nodes` transports, indexed by rank.
    pub fn mesh(nodes: usize) -> Vec<ChannelTransport> {
        let (senders, receivers): (Vec<_>, Vec<_>) = (0..nodes).map(|_| mpsc::channel()).unzip();
        receivers
            .into_iter()
            .enumerate()
            .map(|(rank, inbox)| ChannelTransport {
                rank,
                peers: Mutex::new(senders.clone()),
                inbox: Mutex::new(inbox),
            })
            .collect()
    }

    fn disconnected(&self, code: &str) -> EnsembleError {
        EnsembleError::Io(
            ErrorInfo::new(code, "transport channel disconnected")
                .with_context("rank", self.rank.to_string()),
        )
    }
}

impl SummaryTransport for ChannelTransport {
    fn rank(&self) -> usize {
        self.rank
    }

    fn send(&self, to: usize, packet: &SummaryPacket) -> Result<(), EnsembleError> {
        packet.validate()?;
        let bytes = to_canonical_json_bytes(packet)?;
        let peers = self.peers.lock().unwrap_or_else(PoisonError::into_inner);
        let peer = peers.get(to).ok_or_else(|| {
            EnsembleError::NotFound(
                ErrorInfo::new("transport.unknown_node", "no node with this index")
                    .with_context("to", to.to_string())
                    .with_context("nodes", peers.len().to_string()),
            )
        })?;
        peer.send((self.rank, bytes))
            .map_err(|_| self.disconnected("transport.send"))
    }

    fn receive(&self) -> Result<(usize, SummaryPacket), EnsembleError> {
        let inbox = self.inbox.lock().unwrap_or_else(PoisonError::into_inner);
        let (source, bytes) = inbox
            .recv()
            .map_err(|_| self.disconnected("transport.receive"))?;
        let packet: SummaryPacket = from_json_slice(&bytes)?;
        packet.validate()?;
        Ok((source, packet))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packets_reach_the_addressed_node() {
        let mesh = ChannelTransport::mesh(3);
        let packet = SummaryPacket {
            count: 2,
            values: vec![1.5, -2.0],
        };
        mesh[2].send(0, &packet).expect("send");
        let (source, received) = mesh[0].receive().expect("receive");
        assert_eq!(source, 2);
        assert_eq!(received, packet);
    }

    #[test]
    fn unknown_destination_is_rejected() {
        let mesh = ChannelTransport::mesh(1);
        let packet = SummaryPacket {
            count: 0,
            values: Vec::new(),
        };
        let err = mesh[0].send(5, &packet).expect_err("no such node");
        assert_eq!(err.code(), "transport.unknown_node");
    }

    #[test]
    fn inconsistent_packet_is_rejected() {
        let mesh = ChannelTransport::mesh(2);
        let packet = SummaryPacket {
            count: 3,
            values: vec![1.0],
        };
        let err = mesh[0].send(1, &packet).expect_err("count mismatch");
        assert_eq!(err.code(), "transport.count_mismatch");
    }
}
