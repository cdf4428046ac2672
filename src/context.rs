//! Everything one bridge session needs, bundled: network parameters, the
//! chain and platform collaborators, the optional faucet, and the event
//! channel to the presenter. Sessions never share a context, so no key
//! material can leak between them.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::bridge::{BridgeError, BridgeEvent};
use crate::clients::faucet::FaucetClient;
use crate::clients::insight::{CoreChainApi, InsightClient};
use crate::clients::islock::{InstantLockApi, IslockClient};
use crate::clients::retry::RetryOptions;
use crate::config::NetworkParams;
use crate::platform::PlatformDriver;

pub struct BridgeContext {
    pub params: NetworkParams,
    pub chain: Arc<dyn CoreChainApi>,
    pub islocks: Arc<dyn InstantLockApi>,
    pub platform: Arc<dyn PlatformDriver>,
    pub faucet: Option<FaucetClient>,
    pub backup_dir: PathBuf,
    pub retry_options: RetryOptions,
    events: mpsc::UnboundedSender<BridgeEvent>,
}

impl BridgeContext {
    /// Wires the HTTP clients up from the network parameters. The platform
    /// driver is injected: production passes the SDK-backed driver, tests
    /// pass a fake.
    pub fn new(
        params: NetworkParams,
        platform: Arc<dyn PlatformDriver>,
        events: mpsc::UnboundedSender<BridgeEvent>,
    ) -> Self {
        let chain = Arc::new(InsightClient::new(params.insight_base_url.clone()));
        let islocks = Arc::new(IslockClient::new(params.islock_rpc_url.clone()));
        let faucet = params
            .faucet_base_url
            .as_ref()
            .map(|url| FaucetClient::new(url.clone()));
        BridgeContext {
            params,
            chain,
            islocks,
            platform,
            faucet,
            backup_dir: PathBuf::from("."),
            retry_options: RetryOptions::default(),
            events,
        }
    }

    pub fn with_chain(mut self, chain: Arc<dyn CoreChainApi>) -> Self {
        self.chain = chain;
        self
    }

    pub fn with_islocks(mut self, islocks: Arc<dyn InstantLockApi>) -> Self {
        self.islocks = islocks;
        self
    }

    pub fn with_backup_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.backup_dir = dir.into();
        self
    }

    /// A closed event channel means the presenter is gone; the session is
    /// cancelled.
    pub(crate) fn emit(&self, event: BridgeEvent) -> Result<(), BridgeError> {
        self.events
            .send(event)
            .map_err(|_| BridgeError::UserCancelled)
    }

    /// Best-effort event, used from progress callbacks where cancellation
    /// is detected at the next suspension point anyway.
    pub(crate) fn emit_lossy(&self, event: BridgeEvent) {
        let _ = self.events.send(event);
    }
}
