//! Decryption oracle seam plus a local development oracle.

use std::collections::BTreeMap;
use std::sync::Arc;

use ed25519_dalek::{Signer, SigningKey};
use parking_lot::Mutex;
use thiserror::Error;

use crate::attestation::{attestation_digest, encode_cleartext, encode_proof};
use crate::fhe::MockEvaluator;
use crate::types::{CiphertextHandle, RequestId, TargetId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("oracle rejected submission: {0}")]
    Rejected(String),
    #[error("oracle has no outstanding job for {0}")]
    UnknownRequest(RequestId),
    #[error("oracle cannot decrypt handle {0}")]
    UndecryptableHandle(CiphertextHandle),
}

/// External service that decrypts ciphertexts and later calls back with a
/// signed cleartext. `submit` only enqueues work and returns the id the
/// callback will carry.
pub trait DecryptionOracle: Send + Sync {
    fn submit(
        &self,
        target: TargetId,
        handle: &CiphertextHandle,
    ) -> Result<RequestId, OracleError>;
}

/// Arguments for the ledger's decryption callback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OracleResponse {
    pub request_id: RequestId,
    pub target: TargetId,
    pub cleartext: Vec<u8>,
    pub proof: Vec<u8>,
}

#[derive(Clone, Debug)]
struct SubmittedJob {
    target: TargetId,
    handle: CiphertextHandle,
}

#[derive(Default)]
struct OracleQueue {
    last_request: u64,
    jobs: BTreeMap<RequestId, SubmittedJob>,
}

/// Oracle that decrypts through [`MockEvaluator`] and signs with one or more
/// in-process ed25519 keys. Jobs are fulfilled only when asked, in any order.
pub struct LocalOracle {
    evaluator: Arc<MockEvaluator>,
    committee: Vec<SigningKey>,
    queue: Mutex<OracleQueue>,
}

impl LocalOracle {
    pub fn new(evaluator: Arc<MockEvaluator>, seed: [u8; 32]) -> Self {
        Self::with_committee(evaluator, &[seed])
    }

    /// Every committee member co-signs each response.
    pub fn with_committee(evaluator: Arc<MockEvaluator>, seeds: &[[u8; 32]]) -> Self {
        Self {
            evaluator,
            committee: seeds.iter().map(SigningKey::from_bytes).collect(),
            queue: Mutex::new(OracleQueue::default()),
        }
    }

    pub fn public_keys_hex(&self) -> Vec<String> {
        self.committee
            .iter()
            .map(|key| hex::encode(key.verifying_key().to_bytes()))
            .collect()
    }

    /// Hex public key of the first committee member.
    pub fn public_key_hex(&self) -> String {
        self.public_keys_hex().into_iter().next().unwrap_or_default()
    }

    pub fn outstanding(&self) -> Vec<RequestId> {
        self.queue.lock().jobs.keys().copied().collect()
    }

    /// Decrypt and sign the job behind `request_id`, removing it from the queue.
    pub fn fulfil(&self, request_id: RequestId) -> Result<OracleResponse, OracleError> {
        let job = self.job(request_id)?;
        let value = self
            .evaluator
            .decrypt(&job.handle)
            .ok_or(OracleError::UndecryptableHandle(job.handle))?;
        let response = self.sign_response(request_id, &job, value);
        self.queue.lock().jobs.remove(&request_id);
        Ok(response)
    }

    /// Sign an arbitrary `value` for the job without decrypting. Leaves the
    /// job queued. Useful for modelling a compromised committee.
    pub fn attest_value(
        &self,
        request_id: RequestId,
        value: u32,
    ) -> Result<OracleResponse, OracleError> {
        let job = self.job(request_id)?;
        Ok(self.sign_response(request_id, &job, value))
    }

    fn job(&self, request_id: RequestId) -> Result<SubmittedJob, OracleError> {
        self.queue
            .lock()
            .jobs
            .get(&request_id)
            .cloned()
            .ok_or(OracleError::UnknownRequest(request_id))
    }

    fn sign_response(
        &self,
        request_id: RequestId,
        job: &SubmittedJob,
        value: u32,
    ) -> OracleResponse {
        let cleartext = encode_cleartext(value);
        let digest = attestation_digest(request_id, &job.handle, &cleartext);
        let entries: Vec<_> = self
            .committee
            .iter()
            .map(|key| (key.verifying_key(), key.sign(&digest)))
            .collect();
        OracleResponse {
            request_id,
            target: job.target,
            cleartext,
            proof: encode_proof(&entries),
        }
    }
}

impl DecryptionOracle for LocalOracle {
    fn submit(
        &self,
        target: TargetId,
        handle: &CiphertextHandle,
    ) -> Result<RequestId, OracleError> {
        if self.committee.is_empty() {
            return Err(OracleError::Rejected("oracle has no signing keys".into()));
        }
        let mut queue = self.queue.lock();
        queue.last_request += 1;
        let request_id = RequestId(queue.last_request);
        queue.jobs.insert(
            request_id,
            SubmittedJob {
                target,
                handle: *handle,
            },
        );
        Ok(request_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attestation::decode_cleartext;
    use crate::types::{FheType, VariableId};

    #[test]
    fn assigns_fresh_request_ids_and_fulfils_out_of_order() {
        let evaluator = Arc::new(MockEvaluator::new());
        let oracle = LocalOracle::new(evaluator.clone(), [1u8; 32]);
        let target = TargetId::Variable(VariableId(1));
        let a = oracle
            .submit(target, &evaluator.encrypt(11, FheType::Uint32))
            .unwrap();
        let b = oracle
            .submit(target, &evaluator.encrypt(22, FheType::Uint32))
            .unwrap();
        assert_ne!(a, b);

        let second = oracle.fulfil(b).unwrap();
        assert_eq!(decode_cleartext(&second.cleartext).unwrap(), 22);
        assert_eq!(oracle.outstanding(), vec![a]);
        assert!(matches!(
            oracle.fulfil(b),
            Err(OracleError::UnknownRequest(_))
        ));
    }

    #[test]
    fn committee_members_each_sign() {
        let evaluator = Arc::new(MockEvaluator::new());
        let oracle = LocalOracle::with_committee(evaluator.clone(), &[[1u8; 32], [2u8; 32]]);
        let id = oracle
            .submit(
                TargetId::Variable(VariableId(1)),
                &evaluator.encrypt(1, FheType::Uint32),
            )
            .unwrap();
        let response = oracle.fulfil(id).unwrap();
        assert_eq!(response.proof.len(), 2 * crate::attestation::PROOF_ENTRY_LEN);
        assert_eq!(oracle.public_keys_hex().len(), 2);
    }

    #[test]
    fn empty_committee_refuses_work() {
        let evaluator = Arc::new(MockEvaluator::new());
        let oracle = LocalOracle::with_committee(evaluator.clone(), &[]);
        let err = oracle
            .submit(
                TargetId::Variable(VariableId(1)),
                &evaluator.encrypt(1, FheType::Uint32),
            )
            .unwrap_err();
        assert!(matches!(err, OracleError::Rejected(_)));
    }
}
