//! RecordingPublisher: keeps every published packet for inspection.

use crate::egress::EgressPublisher;
use crate::error::PublishError;
use crate::id::{EndpointRef, UowId};
use crate::work::TransportPacket;
use async_trait::async_trait;
use std::sync::Mutex;

/// A publisher that records every packet it is given.
/// Use `.published()` to inspect what was sent.
pub struct RecordingPublisher {
    packets: Mutex<Vec<(EndpointRef, TransportPacket)>>,
}

impl RecordingPublisher {
    /// Create an empty publisher.
    pub fn new() -> Self {
        Self {
            packets: Mutex::new(Vec::new()),
        }
    }

    /// Snapshot of everything published so far, in publish order.
    pub fn published(&self) -> Vec<(EndpointRef, TransportPacket)> {
        self.packets.lock().unwrap().clone()
    }

    /// How many packets were published for `uow`.
    pub fn count_for(&self, uow: &UowId) -> usize {
        self.packets
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, p)| &p.uow.id == uow)
            .count()
    }
}

impl Default for RecordingPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EgressPublisher for RecordingPublisher {
    async fn publish(
        &self,
        endpoint: &EndpointRef,
        packet: TransportPacket,
    ) -> Result<(), PublishError> {
        self.packets.lock().unwrap().push((endpoint.clone(), packet));
        Ok(())
    }
}
