use thiserror::Error;

use crate::fhe::FheError;
use crate::oracle::OracleError;
use crate::types::{Address, RequestId, TargetId};

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Failures surfaced by ledger entry points. A returned error always means
/// nothing was written.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("{0} not found")]
    NotFound(TargetId),
    #[error("{caller} is not authorized for {target}")]
    Unauthorized { caller: Address, target: TargetId },
    #[error("invalid decryption request {request_id}: {reason}")]
    InvalidRequest {
        request_id: RequestId,
        reason: &'static str,
    },
    #[error("oracle attestation rejected: {0}")]
    SignatureInvalid(String),
    #[error("decryption oracle unavailable: {0}")]
    OracleUnavailable(#[from] OracleError),
    #[error(transparent)]
    Fhe(#[from] FheError),
}
