//! NonceGate: serializes nonce allocation for one signer.

use std::future::Future;

use mediator_types::{ContractGateway, GatewayError};
use tokio::sync::Mutex;
use tracing::debug;

/// One allocation in progress at a time: the pending nonce is read and the
/// broadcast that consumes it completes before the next reader proceeds.
///
/// Share one gate (behind an `Arc`) between every client signing with the
/// same key.
#[derive(Debug, Default)]
pub struct NonceGate {
    lock: Mutex<()>,
}

impl NonceGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `op` with the signer's pending nonce while holding the gate. The
    /// gate is released when `op` resolves, whether it succeeded or not.
    pub async fn with_nonce<G, F, Fut, T, E>(&self, gateway: &G, op: F) -> Result<T, E>
    where
        G: ContractGateway + ?Sized,
        F: FnOnce(u64) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<GatewayError>,
    {
        let _guard = self.lock.lock().await;
        let nonce = gateway.pending_nonce(gateway.signer_address()).await?;
        debug!(nonce, "nonce reserved");
        op(nonce).await
    }
}

#[cfg(test)]
mod tests {
    use mediator_node_mock::DemoScenario;
    use mediator_types::GatewayError;

    use super::NonceGate;

    #[tokio::test]
    async fn releases_on_error() {
        let scenario = DemoScenario::new();
        let node = scenario.node.as_ref();
        let gate = NonceGate::new();

        let failed: Result<(), GatewayError> = gate
            .with_nonce(node, |_| async { Err(GatewayError::Rpc("boom".to_string())) })
            .await;
        assert!(failed.is_err());

        let nonce: Result<u64, GatewayError> = gate.with_nonce(node, |n| async move { Ok(n) }).await;
        assert_eq!(nonce.unwrap(), 0);
    }
}
