mod compile;
mod store;

use ethers::{abi::Abi, types::Bytes};
use thiserror::Error;

pub use compile::compile;
pub use store::ArtifactStore;

/// A compiled contract: its ABI and the creation bytecode.
#[derive(Clone, Debug, PartialEq)]
pub struct ContractArtifact {
    pub name: String,
    pub abi: Abi,
    pub bytecode: Bytes,
}

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("contract `{name}` not found among the compiled artifacts in {root}")]
    NotFound { name: String, root: String },
    #[error("contract name `{name}` is ambiguous: {candidates:?}")]
    Ambiguous {
        name: String,
        candidates: Vec<String>,
    },
    #[error("artifact `{0}` has no creation bytecode; is it abstract or an interface?")]
    MissingBytecode(String),
    #[error("artifact `{name}` has malformed bytecode: {reason}")]
    InvalidBytecode { name: String, reason: String },
    #[error("failed to parse artifact `{name}`: {source}")]
    Parse {
        name: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("compilation failed:\n{0}")]
    Compile(String),
    #[error(transparent)]
    Solc(#[from] ethers_solc::error::SolcError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
