use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use blake3::Hasher;
use parking_lot::Mutex;
use thiserror::Error;

use crate::types::{CiphertextHandle, FheType, OperationKind};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct FheError(pub String);

impl FheError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Homomorphic operators over ciphertext handles. Implementations never see
/// or return plaintext.
pub trait HomomorphicEvaluator: Send + Sync {
    fn add(
        &self,
        lhs: &CiphertextHandle,
        rhs: &CiphertextHandle,
    ) -> Result<CiphertextHandle, FheError>;
    fn sub(
        &self,
        lhs: &CiphertextHandle,
        rhs: &CiphertextHandle,
    ) -> Result<CiphertextHandle, FheError>;
    fn mul(
        &self,
        lhs: &CiphertextHandle,
        rhs: &CiphertextHandle,
    ) -> Result<CiphertextHandle, FheError>;

    fn apply(
        &self,
        kind: OperationKind,
        lhs: &CiphertextHandle,
        rhs: &CiphertextHandle,
    ) -> Result<CiphertextHandle, FheError> {
        match kind {
            OperationKind::Add => self.add(lhs, rhs),
            OperationKind::Multiply => self.mul(lhs, rhs),
            OperationKind::Subtract => self.sub(lhs, rhs),
        }
    }
}

const ENCRYPT_DOMAIN: &[u8] = b"fhe-ledger/mock/encrypt";
const EVAL_DOMAIN: &[u8] = b"fhe-ledger/mock/eval";

/// Development evaluator. Handles are blake3 digests and the plaintext behind
/// each handle is kept in a side table so a local oracle can decrypt it.
/// Arithmetic wraps in the `u32` domain.
#[derive(Default)]
pub struct MockEvaluator {
    nonce: AtomicU64,
    plaintexts: Mutex<HashMap<CiphertextHandle, u32>>,
}

impl MockEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encrypt `value` under a fresh nonce, so equal plaintexts get distinct handles.
    pub fn encrypt(&self, value: u32, ty: FheType) -> CiphertextHandle {
        let nonce = self.nonce.fetch_add(1, Ordering::Relaxed);
        let mut hasher = Hasher::new();
        hasher.update(ENCRYPT_DOMAIN);
        hasher.update(&nonce.to_le_bytes());
        hasher.update(&[ty.code()]);
        hasher.update(&value.to_le_bytes());
        let handle = CiphertextHandle(*hasher.finalize().as_bytes());
        self.plaintexts.lock().insert(handle, value);
        handle
    }

    pub fn encrypt_type_tag(&self, ty: FheType) -> CiphertextHandle {
        self.encrypt(u32::from(ty.code()), FheType::Uint8)
    }

    /// Reveal the plaintext behind `handle`. Only oracles should call this.
    pub fn decrypt(&self, handle: &CiphertextHandle) -> Option<u32> {
        self.plaintexts.lock().get(handle).copied()
    }

    pub fn known_handles(&self) -> usize {
        self.plaintexts.lock().len()
    }

    fn evaluate(
        &self,
        kind: OperationKind,
        lhs: &CiphertextHandle,
        rhs: &CiphertextHandle,
        op: impl FnOnce(u32, u32) -> u32,
    ) -> Result<CiphertextHandle, FheError> {
        let mut plaintexts = self.plaintexts.lock();
        let left = *plaintexts
            .get(lhs)
            .ok_or_else(|| FheError::new(format!("unknown ciphertext handle {lhs}")))?;
        let right = *plaintexts
            .get(rhs)
            .ok_or_else(|| FheError::new(format!("unknown ciphertext handle {rhs}")))?;

        let mut hasher = Hasher::new();
        hasher.update(EVAL_DOMAIN);
        hasher.update(&[kind.code()]);
        hasher.update(&lhs.0);
        hasher.update(&rhs.0);
        let handle = CiphertextHandle(*hasher.finalize().as_bytes());
        plaintexts.insert(handle, op(left, right));
        Ok(handle)
    }
}

impl HomomorphicEvaluator for MockEvaluator {
    fn add(
        &self,
        lhs: &CiphertextHandle,
        rhs: &CiphertextHandle,
    ) -> Result<CiphertextHandle, FheError> {
        self.evaluate(OperationKind::Add, lhs, rhs, u32::wrapping_add)
    }

    fn sub(
        &self,
        lhs: &CiphertextHandle,
        rhs: &CiphertextHandle,
    ) -> Result<CiphertextHandle, FheError> {
        self.evaluate(OperationKind::Subtract, lhs, rhs, u32::wrapping_sub)
    }

    fn mul(
        &self,
        lhs: &CiphertextHandle,
        rhs: &CiphertextHandle,
    ) -> Result<CiphertextHandle, FheError> {
        self.evaluate(OperationKind::Multiply, lhs, rhs, u32::wrapping_mul)
    }
}
