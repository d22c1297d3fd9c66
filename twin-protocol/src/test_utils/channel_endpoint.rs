//! ChannelEndpoint: hands dispatch packages to the test over a channel.

use crate::behaviour::BehaviourEndpoint;
use crate::dispatch::DispatchPackage;
use crate::error::DispatchError;
use crate::stimulus::ResourceKind;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// A behaviour endpoint that forwards every delivered package to an
/// unbounded channel. The test plays the behaviour: it receives packages
/// and reports completions itself.
pub struct ChannelEndpoint<K> {
    tx: mpsc::UnboundedSender<DispatchPackage<K>>,
}

impl<K: ResourceKind> ChannelEndpoint<K> {
    /// Create an endpoint and the receiver its packages arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DispatchPackage<K>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl<K: ResourceKind> BehaviourEndpoint<K> for ChannelEndpoint<K> {
    async fn deliver(&self, package: DispatchPackage<K>) -> Result<(), DispatchError> {
        self.tx
            .send(package)
            .map_err(|e| DispatchError::Unavailable(e.to_string()))
    }
}

/// A behaviour endpoint that rejects every package.
pub struct FailingEndpoint;

#[async_trait]
impl<K: ResourceKind> BehaviourEndpoint<K> for FailingEndpoint {
    async fn deliver(&self, package: DispatchPackage<K>) -> Result<(), DispatchError> {
        Err(DispatchError::Rejected(format!(
            "refusing package for twin {}",
            package.twin
        )))
    }
}
