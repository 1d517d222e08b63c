pub mod ec;
pub mod signature;
pub mod encoding;
pub mod error;
pub mod config;
pub mod logging;
pub mod storage; // sled handle, opened before the ledger trees
pub mod account;
pub mod keystore;
pub mod transaction;
pub mod client;

pub use client::{KeyModel, PbtxClient};
pub use ec::CurveId;
pub use error::{AssemblerError, ClientError, KeyStoreError, LedgerError, SigningError};
pub use signature::{canonicalize, CompactSignature, PublicKey};
