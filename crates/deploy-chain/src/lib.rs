use std::{sync::Arc, time::Duration};

use ethers::{
    core::utils::Anvil,
    middleware::SignerMiddleware,
    providers::{Http, Middleware, Provider},
    signers::Signer,
    types::{Address, U256},
    utils::AnvilInstance,
};
use eyre::{eyre, Result};
use tracing::info;

/// The polling interval used for remote networks. Anvil mines instantly, so
/// local chains are polled much more aggressively.
const REMOTE_INTERVAL: Duration = Duration::from_secs(2);
const ANVIL_INTERVAL: Duration = Duration::from_millis(10);

/// A client that signs transactions with `S` before sending them. There is no
/// retry, nonce or gas middleware in the stack: every transaction is sent
/// exactly once with the node's gas estimates.
pub type ChainClient<S> = SignerMiddleware<Provider<Http>, S>;

/// An abstraction over Ethereum chains that provides convenience methods for
/// constructing providers and signing clients.
pub struct Chain {
    provider: Provider<Http>,
    chain_id: u64,
    client_version: String,
    _maybe_anvil: Option<AnvilInstance>,
}

impl Chain {
    /// Constructs a new `Chain` from an Ethereum RPC URL. If the RPC URL is
    /// excluded, a local anvil node is spun up.
    pub async fn connect(maybe_rpc_url: Option<String>) -> Result<Self> {
        let (provider, _maybe_anvil) = if let Some(rpc_url) = maybe_rpc_url {
            let provider = Provider::<Http>::try_from(rpc_url.as_str())
                .map_err(|err| eyre!("invalid rpc url `{}`: {}", rpc_url, err))?
                .interval(REMOTE_INTERVAL);
            (provider, None)
        } else {
            let anvil = Anvil::new().spawn();
            let provider =
                Provider::<Http>::try_from(anvil.endpoint())?.interval(ANVIL_INTERVAL);
            (provider, Some(anvil))
        };

        let client_version = provider.client_version().await?;
        let chain_id = provider.get_chainid().await?.as_u64();
        let provider = if client_version.contains("anvil") {
            provider.interval(ANVIL_INTERVAL)
        } else {
            provider
        };
        info!(%client_version, chain_id, "connected to chain");

        Ok(Self {
            provider,
            chain_id,
            client_version,
            _maybe_anvil,
        })
    }
}

impl Chain {
    /// A provider that can access the chain.
    pub fn provider(&self) -> Provider<Http> {
        self.provider.clone()
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// A client that signs with `signer` on this chain.
    pub fn client<S: Signer + 'static>(&self, signer: S) -> Arc<ChainClient<S>> {
        let signer = signer.with_chain_id(self.chain_id);
        Arc::new(SignerMiddleware::new(self.provider(), signer))
    }

    /// Mints ether to an address. This only works for anvil chains.
    pub async fn deal<U: Into<U256>>(&self, address: Address, amount: U) -> Result<()> {
        if !self.is_anvil() {
            return Err(eyre!("can't deal ether on a non-anvil chain"));
        }
        let amount: U256 = amount.into();
        let balance = self.provider.get_balance(address, None).await?;
        self.provider
            .request::<(Address, U256), ()>("anvil_setBalance", (address, balance + amount))
            .await?;
        Ok(())
    }

    /// Checks to see if the underlying chain is an anvil chain.
    pub fn is_anvil(&self) -> bool {
        self.client_version.contains("anvil")
    }
}
