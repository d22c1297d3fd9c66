//! Egress seams: encoding outcomes, resolving routes, publishing packets.

use crate::error::{EncodeError, PublishError};
use crate::id::{EndpointRef, NodeRef};
use crate::outcome::OutputResource;
use crate::stimulus::ResourceKind;
use crate::work::TransportPacket;
use async_trait::async_trait;

/// Turns an output resource into the wire form carried by an egress
/// payload. A failure here fails the whole unit of work.
pub trait ResourceEncoder<K: ResourceKind>: Send + Sync {
    /// Encode `resource`.
    fn encode(&self, resource: &OutputResource<K>) -> Result<String, EncodeError>;
}

/// Encodes the resource body as compact JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEncoder;

impl<K: ResourceKind> ResourceEncoder<K> for JsonEncoder {
    fn encode(&self, resource: &OutputResource<K>) -> Result<String, EncodeError> {
        Ok(serde_json::to_string(&resource.body)?)
    }
}

/// Resolves the egress endpoint for the node a unit of work came from.
pub trait EgressTopology: Send + Sync {
    /// Endpoint for `origin`, or `None` if the node has no egress route.
    fn resolve(&self, origin: &NodeRef) -> Option<EndpointRef>;
}

/// Derives the egress endpoint by appending a fixed suffix to the node
/// reference: `ingest.fhir` becomes `ingest.fhir.egress`.
#[derive(Debug, Clone)]
pub struct SuffixTopology {
    suffix: String,
}

impl SuffixTopology {
    /// Use `suffix` for every node.
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }
}

impl Default for SuffixTopology {
    fn default() -> Self {
        Self::new(".egress")
    }
}

impl EgressTopology for SuffixTopology {
    fn resolve(&self, origin: &NodeRef) -> Option<EndpointRef> {
        if origin.as_str().is_empty() {
            return None;
        }
        Some(EndpointRef::new(format!("{}{}", origin, self.suffix)))
    }
}

/// Sends a concluded unit of work on its way.
#[async_trait]
pub trait EgressPublisher: Send + Sync {
    /// Forward `packet` to `endpoint`.
    async fn publish(
        &self,
        endpoint: &EndpointRef,
        packet: TransportPacket,
    ) -> Result<(), PublishError>;
}
