/// This module contains the deployment procedure: a small state machine that
/// resolves a contract artifact, submits its deployment transaction and waits
/// for the deployment to be confirmed.
use std::sync::Arc;

use async_trait::async_trait;
use deploy_artifacts::{ArtifactError, ArtifactStore, ContractArtifact};
use ethers::{
    contract::ContractFactory,
    providers::Middleware,
    types::{Address, H256, U64},
};
use tracing::{debug, error, info};

use crate::DeployError;

/// Anything that can resolve a contract name to its compiled artifact.
pub trait ArtifactSource {
    fn artifact(&self, name: &str) -> Result<ContractArtifact, ArtifactError>;
}

impl ArtifactSource for ArtifactStore {
    fn artifact(&self, name: &str) -> Result<ContractArtifact, ArtifactError> {
        self.get(name)
    }
}

/// Submits deployment transactions and waits for them to be confirmed.
#[async_trait]
pub trait ContractDeployer: Send + Sync {
    /// Sends the deployment transaction for `artifact` and returns its hash.
    async fn submit(&self, artifact: &ContractArtifact) -> Result<H256, DeployError>;

    /// Waits for the deployment transaction to be confirmed and returns the
    /// address of the new contract. This waits for as long as the network
    /// takes.
    async fn confirm(&self, tx_hash: H256) -> Result<Address, DeployError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeploymentState {
    Pending,
    Submitted { tx_hash: H256 },
    Confirmed { address: Address },
    Failed { reason: String },
}

/// A single deployment of a named contract. Deployments are not idempotent:
/// every deployment that gets past `submit` creates a new contract.
#[derive(Debug)]
pub struct Deployment {
    contract: String,
    state: DeploymentState,
}

impl Deployment {
    pub fn new(contract: impl Into<String>) -> Self {
        Self {
            contract: contract.into(),
            state: DeploymentState::Pending,
        }
    }

    pub fn contract(&self) -> &str {
        &self.contract
    }

    pub fn state(&self) -> &DeploymentState {
        &self.state
    }

    /// Resolves the contract's artifact. This happens before anything is sent
    /// to the network, so a missing artifact never costs a transaction.
    pub fn resolve<S: ArtifactSource + ?Sized>(
        &mut self,
        source: &S,
    ) -> Result<ContractArtifact, DeployError> {
        self.expect_state("resolve", |state| matches!(state, DeploymentState::Pending))?;
        let result = source.artifact(&self.contract).map_err(DeployError::from);
        let artifact = self.record(result)?;
        info!(
            contract = %self.contract,
            bytecode_size = artifact.bytecode.len(),
            "resolved contract artifact"
        );
        Ok(artifact)
    }

    /// Sends the deployment transaction. Pending -> Submitted.
    pub async fn submit<D: ContractDeployer + ?Sized>(
        &mut self,
        deployer: &D,
        artifact: &ContractArtifact,
    ) -> Result<H256, DeployError> {
        self.expect_state("submit", |state| matches!(state, DeploymentState::Pending))?;
        let result = deployer.submit(artifact).await;
        let tx_hash = self.record(result)?;
        info!(contract = %self.contract, ?tx_hash, "submitted deployment transaction");
        self.state = DeploymentState::Submitted { tx_hash };
        Ok(tx_hash)
    }

    /// Waits for the deployment transaction. Submitted -> Confirmed.
    pub async fn confirm<D: ContractDeployer + ?Sized>(
        &mut self,
        deployer: &D,
    ) -> Result<Address, DeployError> {
        let tx_hash = match self.state {
            DeploymentState::Submitted { tx_hash } => tx_hash,
            _ => return Err(self.invalid_transition("confirm")),
        };
        let result = deployer.confirm(tx_hash).await;
        let address = self.record(result)?;
        info!(contract = %self.contract, ?address, "deployment confirmed");
        self.state = DeploymentState::Confirmed { address };
        Ok(address)
    }

    /// Runs the whole procedure: resolve, submit and confirm.
    pub async fn execute<S, D>(&mut self, source: &S, deployer: &D) -> Result<Address, DeployError>
    where
        S: ArtifactSource + ?Sized,
        D: ContractDeployer + ?Sized,
    {
        let artifact = self.resolve(source)?;
        self.submit(deployer, &artifact).await?;
        self.confirm(deployer).await
    }

    /// Marks the deployment as failed if `result` is an error.
    pub fn record<T>(&mut self, result: Result<T, DeployError>) -> Result<T, DeployError> {
        if let Err(err) = &result {
            error!(contract = %self.contract, %err, "deployment failed");
            self.state = DeploymentState::Failed {
                reason: err.to_string(),
            };
        }
        result
    }

    fn expect_state(
        &self,
        operation: &str,
        allowed: impl Fn(&DeploymentState) -> bool,
    ) -> Result<(), DeployError> {
        if allowed(&self.state) {
            Ok(())
        } else {
            Err(self.invalid_transition(operation))
        }
    }

    fn invalid_transition(&self, operation: &str) -> DeployError {
        // Calling the steps out of order is a programming error, but it is
        // still reported instead of panicking.
        DeployError::InvalidState {
            operation: operation.to_string(),
            state: format!("{:?}", self.state),
        }
    }
}

/// Deploys contracts through a signing client.
pub struct ChainDeployer<M> {
    client: Arc<M>,
    confirmations: usize,
}

impl<M: Middleware + 'static> ChainDeployer<M> {
    /// Creates a deployer that waits for `confirmations` blocks (at least
    /// one) before considering a deployment confirmed.
    pub fn new(client: Arc<M>, confirmations: usize) -> Self {
        Self {
            client,
            confirmations: confirmations.max(1),
        }
    }
}

#[async_trait]
impl<M: Middleware + 'static> ContractDeployer for ChainDeployer<M> {
    async fn submit(&self, artifact: &ContractArtifact) -> Result<H256, DeployError> {
        let factory = ContractFactory::new(
            artifact.abi.clone(),
            artifact.bytecode.clone(),
            self.client.clone(),
        );
        let tx = factory
            .deploy(())
            .map_err(|err| DeployError::Submission(err.to_string()))?
            .tx
            .clone();
        let pending = self
            .client
            .send_transaction(tx, None)
            .await
            .map_err(|err| DeployError::Submission(err.to_string()))?;
        Ok(pending.tx_hash())
    }

    /// Polls for the receipt at the provider's interval. Transport errors end
    /// the wait instead of being retried.
    async fn confirm(&self, tx_hash: H256) -> Result<Address, DeployError> {
        let interval = self.client.provider().get_interval();
        let depth = U64::from(self.confirmations - 1);
        let receipt = loop {
            let receipt = self
                .client
                .get_transaction_receipt(tx_hash)
                .await
                .map_err(confirmation_error)?;
            let Some(receipt) = receipt else {
                // The node forgot about the transaction, so it won't be mined.
                let transaction = self
                    .client
                    .get_transaction(tx_hash)
                    .await
                    .map_err(confirmation_error)?;
                if transaction.is_none() {
                    return Err(DeployError::Confirmation(format!(
                        "transaction {:?} was dropped",
                        tx_hash
                    )));
                }
                debug!(?tx_hash, "deployment transaction is not mined yet");
                tokio::time::sleep(interval).await;
                continue;
            };

            if !depth.is_zero() {
                let mined = receipt.block_number.unwrap_or_default();
                let latest = self
                    .client
                    .get_block_number()
                    .await
                    .map_err(confirmation_error)?;
                if latest.saturating_sub(mined) < depth {
                    debug!(?tx_hash, %mined, %latest, "waiting for confirmations");
                    tokio::time::sleep(interval).await;
                    continue;
                }
            }
            break receipt;
        };

        if receipt.status.is_some_and(|status| status.is_zero()) {
            return Err(DeployError::Confirmation(format!(
                "transaction {:?} reverted",
                tx_hash
            )));
        }
        receipt.contract_address.ok_or_else(|| {
            DeployError::Confirmation(format!(
                "receipt of {:?} has no contract address",
                tx_hash
            ))
        })
    }
}

fn confirmation_error<E: std::fmt::Display>(err: E) -> DeployError {
    DeployError::Confirmation(err.to_string())
}
