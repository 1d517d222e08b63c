use thiserror::Error;

use crate::ec::CurveId;

/// Failures of the pure curve arithmetic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CurveError {
    #[error("x-coordinate is not below the field modulus")]
    CoordinateOutOfRange,
    #[error("point is not on the curve")]
    NotOnCurve,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SigningError {
    #[error("Malformed signature: {0}")]
    MalformedSignature(String),
    #[error("Could not recover the expected public key from the signature")]
    RecoveryFailed,
    #[error("Integer of {0} bytes does not fit into 32 bytes")]
    IntegerTooLarge(usize),
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Registration record already exists for public key {0}")]
    AlreadyExists(String),
    #[error("Registration record not found for public key {0}")]
    NotFound(String),
    #[error("The registration process was already completed for public key {0}")]
    AlreadyRegistered(String),
    #[error("Account already exists [networkId = {network_id}, actor = {actor}]")]
    AccountExists { network_id: u64, actor: u64 },
    #[error("Account not registered on this device [networkId = {network_id}, actor = {actor}]")]
    NotRegistered { network_id: u64, actor: u64 },
    #[error("Storage error: {0}")]
    Store(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<sled::Error> for LedgerError {
    fn from(err: sled::Error) -> Self {
        LedgerError::Store(err.to_string())
    }
}

impl From<bincode::Error> for LedgerError {
    fn from(err: bincode::Error) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyStoreError {
    #[error("Key not found: {0}")]
    KeyNotFound(String),
    #[error("Key already exists: {0}")]
    KeyExists(String),
    #[error("Signing failed: {0}")]
    Signing(String),
    #[error("Key store backend error: {0}")]
    Backend(String),
}

#[derive(Error, Debug)]
pub enum AssemblerError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    KeyStore(#[from] KeyStoreError),
    #[error(transparent)]
    Signing(#[from] SigningError),
    #[error("Account key is on {found}, signing was requested on {expected}")]
    CurveMismatch { expected: CurveId, found: CurveId },
    #[error("Stored public key is invalid: {0}")]
    InvalidPublicKey(String),
    #[error("Sequence number space exhausted")]
    SequenceExhausted,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    KeyStore(#[from] KeyStoreError),
    #[error(transparent)]
    Signing(#[from] SigningError),
    #[error(transparent)]
    Assembler(#[from] AssemblerError),
}
