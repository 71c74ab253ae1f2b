/// This crate contains the static build and network configuration for the
/// SpaceDock deployment along with the environment overrides that can be
/// applied to it. The configuration is read once at startup and is immutable
/// afterwards.
use std::{collections::BTreeMap, env, fmt, path::PathBuf};

use ethers::signers::LocalWallet;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_COMPILER_VERSION: &str = "0.8.19";
pub const DEFAULT_NETWORK: &str = "goerli";
pub const DEFAULT_NETWORK_URL: &str = "https://goerli.optimism.io";
pub const DEFAULT_CONTRACT: &str = "SpaceDock";
pub const DEFAULT_ARTIFACTS_DIR: &str = "out";
pub const DEFAULT_SOURCES_DIR: &str = "contracts";

/// The environment variable holding the deployer's private key.
pub const PRIVATE_KEY_VAR: &str = "PRIVATE_KEY";

/// The prefix of the optional environment overrides.
pub const ENV_PREFIX: &str = "SPACEDOCK_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("malformed environment override: {0}")]
    Env(#[from] envy::Error),
    #[error("network `{0}` is not configured")]
    UnknownNetwork(String),
    #[error("no account configured for network `{0}`; set PRIVATE_KEY")]
    MissingCredential(String),
    #[error("invalid private key for network `{network}`: {reason}")]
    InvalidCredential { network: String, reason: String },
}

/// A single named network that contracts can be deployed to.
#[derive(Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct NetworkConfig {
    pub url: String,
    // Private keys never leave the process through the debug log.
    #[serde(default, skip_serializing)]
    pub accounts: Vec<String>,
    #[serde(default)]
    pub ovm: bool,
}

impl fmt::Debug for NetworkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkConfig")
            .field("url", &self.url)
            .field("accounts", &format_args!("<{} redacted>", self.accounts.len()))
            .field("ovm", &self.ovm)
            .finish()
    }
}

impl NetworkConfig {
    /// Parses the first configured account into a signer. `network` is only
    /// used for error reporting.
    pub fn signer(&self, network: &str) -> Result<LocalWallet, ConfigError> {
        let key = self
            .accounts
            .first()
            .map(|key| key.trim())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ConfigError::MissingCredential(network.to_string()))?;
        key.parse::<LocalWallet>()
            .map_err(|err| ConfigError::InvalidCredential {
                network: network.to_string(),
                reason: err.to_string(),
            })
    }
}

/// The build and network configuration consumed by the deployer.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct DeployConfig {
    pub compiler_version: String,
    pub networks: BTreeMap<String, NetworkConfig>,
}

impl Default for DeployConfig {
    fn default() -> Self {
        let mut networks = BTreeMap::new();
        networks.insert(
            DEFAULT_NETWORK.to_string(),
            NetworkConfig {
                url: DEFAULT_NETWORK_URL.to_string(),
                accounts: vec![],
                ovm: true,
            },
        );
        Self {
            compiler_version: DEFAULT_COMPILER_VERSION.to_string(),
            networks,
        }
    }
}

impl DeployConfig {
    /// Gets the network with the given name.
    pub fn network(&self, name: &str) -> Result<&NetworkConfig, ConfigError> {
        self.networks
            .get(name)
            .ok_or_else(|| ConfigError::UnknownNetwork(name.to_string()))
    }
}

/// Settings that only the deployment procedure cares about.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeploySettings {
    pub network: String,
    pub contract: String,
    pub artifacts_dir: PathBuf,
    pub sources_dir: PathBuf,
    pub compile: bool,
    pub confirmations: usize,
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            network: DEFAULT_NETWORK.to_string(),
            contract: DEFAULT_CONTRACT.to_string(),
            artifacts_dir: PathBuf::from(DEFAULT_ARTIFACTS_DIR),
            sources_dir: PathBuf::from(DEFAULT_SOURCES_DIR),
            compile: false,
            confirmations: 1,
        }
    }
}

/// The `SPACEDOCK_*` overrides. Every field is optional and falls back to the
/// static defaults.
#[derive(Clone, Debug, Default, Deserialize)]
struct EnvOverrides {
    network: Option<String>,
    url: Option<String>,
    compiler_version: Option<String>,
    ovm: Option<bool>,
    contract: Option<String>,
    artifacts_dir: Option<PathBuf>,
    sources_dir: Option<PathBuf>,
    compile: Option<bool>,
    confirmations: Option<usize>,
}

/// Loads the configuration from the process environment. A `.env` file in
/// the working directory is loaded first if there is one.
pub fn from_env() -> Result<(DeployConfig, DeploySettings), ConfigError> {
    match dotenvy::dotenv() {
        Ok(path) => debug!(path = %path.display(), "loaded .env file"),
        Err(err) if err.not_found() => {}
        Err(err) => debug!(%err, "ignoring unreadable .env file"),
    }
    from_vars(env::vars())
}

/// Builds the configuration from an explicit set of environment variables.
pub fn from_vars<I>(vars: I) -> Result<(DeployConfig, DeploySettings), ConfigError>
where
    I: IntoIterator<Item = (String, String)>,
{
    let vars = vars.into_iter().collect::<Vec<_>>();
    let overrides: EnvOverrides = envy::prefixed(ENV_PREFIX).from_iter(vars.clone())?;
    let private_key = vars
        .into_iter()
        .find(|(key, _)| key == PRIVATE_KEY_VAR)
        .map(|(_, value)| value);

    let mut config = DeployConfig::default();
    let mut settings = DeploySettings::default();
    if let Some(version) = overrides.compiler_version {
        config.compiler_version = version;
    }
    if let Some(network) = overrides.network {
        settings.network = network;
    }

    // Apply the network overrides to the active network. A URL is enough to
    // declare a network that isn't in the static configuration.
    if let Some(url) = overrides.url {
        config
            .networks
            .entry(settings.network.clone())
            .or_default()
            .url = url;
    }
    if let Some(network) = config.networks.get_mut(&settings.network) {
        if let Some(ovm) = overrides.ovm {
            network.ovm = ovm;
        }
        if let Some(key) = private_key {
            network.accounts = vec![key];
        }
    }

    if let Some(contract) = overrides.contract {
        settings.contract = contract;
    }
    if let Some(dir) = overrides.artifacts_dir {
        settings.artifacts_dir = dir;
    }
    if let Some(dir) = overrides.sources_dir {
        settings.sources_dir = dir;
    }
    if let Some(compile) = overrides.compile {
        settings.compile = compile;
    }
    if let Some(confirmations) = overrides.confirmations {
        settings.confirmations = confirmations;
    }

    debug!(
        config = %serde_json::to_string(&config).unwrap_or_default(),
        ?settings,
        "loaded deploy configuration"
    );
    Ok((config, settings))
}
