use deploy_artifacts::ArtifactError;
use deploy_config::ConfigError;
use thiserror::Error;

/// Everything that can go wrong while deploying. The procedure doesn't
/// recover from any of these; they all end the process with a failing exit
/// code.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("configuration error")]
    Configuration(#[from] ConfigError),
    #[error("contract `{name}` not found among the compiled artifacts")]
    ArtifactNotFound {
        name: String,
        #[source]
        source: ArtifactError,
    },
    #[error("failed to load contract artifact")]
    Artifact(#[source] ArtifactError),
    #[error("failed to submit deployment transaction: {0}")]
    Submission(String),
    #[error("deployment was not confirmed: {0}")]
    Confirmation(String),
    #[error("can't {operation} a deployment in state {state}")]
    InvalidState { operation: String, state: String },
    #[error("failed to write the deployed address")]
    Output(#[from] std::io::Error),
}

impl From<ArtifactError> for DeployError {
    fn from(err: ArtifactError) -> Self {
        if let ArtifactError::NotFound { name, .. } = &err {
            let name = name.clone();
            return Self::ArtifactNotFound { name, source: err };
        }
        Self::Artifact(err)
    }
}
