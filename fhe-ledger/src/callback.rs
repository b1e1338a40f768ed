//! The only entry point the oracle may drive.

use tracing::warn;

use crate::attestation::{decode_cleartext, AttestationVerifier};
use crate::error::LedgerResult;
use crate::requests::{PendingRequest, RequestManager};
use crate::results::ResultStore;
use crate::types::RequestId;

pub struct CallbackHandler {
    verifier: AttestationVerifier,
}

impl CallbackHandler {
    pub fn new(verifier: AttestationVerifier) -> Self {
        Self { verifier }
    }

    pub fn verifier(&self) -> &AttestationVerifier {
        &self.verifier
    }

    /// Verify and commit one oracle callback.
    ///
    /// The request must be pending, the proof must satisfy the signer set,
    /// and the cleartext must decode; only then is the request consumed and
    /// the result written. Returns the consumed request.
    pub fn resolve(
        &self,
        requests: &mut RequestManager,
        results: &mut ResultStore,
        request_id: RequestId,
        cleartext: &[u8],
        proof: &[u8],
    ) -> LedgerResult<PendingRequest> {
        let pending = requests.lookup(request_id).inspect_err(|err| {
            warn!(%request_id, error = %err, "callback for unknown request");
        })?;
        self.verifier
            .verify(request_id, &pending.handle, cleartext, proof)
            .inspect_err(|err| {
                warn!(%request_id, target = %pending.target, error = %err, "rejected oracle proof");
            })?;
        let value = decode_cleartext(cleartext)?;

        let request = requests.consume(request_id)?;
        results.record(request.target, value);
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attestation::{attestation_digest, encode_cleartext, encode_proof};
    use crate::config::OracleSection;
    use crate::error::LedgerError;
    use crate::oracle::{DecryptionOracle, OracleError};
    use crate::types::{CiphertextHandle, DecryptedResult, TargetId, TxContext, VariableId};
    use ed25519_dalek::{Signer, SigningKey};

    struct FixedOracle;

    impl DecryptionOracle for FixedOracle {
        fn submit(
            &self,
            _target: TargetId,
            _handle: &CiphertextHandle,
        ) -> Result<RequestId, OracleError> {
            Ok(RequestId(1))
        }
    }

    const TARGET: TargetId = TargetId::Variable(VariableId(1));
    const HANDLE: CiphertextHandle = CiphertextHandle([5u8; 32]);

    fn setup() -> (CallbackHandler, RequestManager, ResultStore, SigningKey) {
        let key = SigningKey::from_bytes(&[1u8; 32]);
        let verifier = AttestationVerifier::from_config(&OracleSection {
            trusted_signers: vec![hex::encode(key.verifying_key().to_bytes())],
            signature_threshold: 1,
        })
        .unwrap();
        let mut requests = RequestManager::new();
        let ctx = TxContext::new("did:fhe:alice", 0);
        requests.submit(&FixedOracle, &ctx, TARGET, HANDLE).unwrap();
        (
            CallbackHandler::new(verifier),
            requests,
            ResultStore::new(),
            key,
        )
    }

    fn proof(key: &SigningKey, cleartext: &[u8]) -> Vec<u8> {
        let digest = attestation_digest(RequestId(1), &HANDLE, cleartext);
        encode_proof(&[(key.verifying_key(), key.sign(&digest))])
    }

    #[test]
    fn commits_verified_cleartext_and_consumes_request() {
        let (handler, mut requests, mut results, key) = setup();
        let cleartext = encode_cleartext(42);
        let signed = proof(&key, &cleartext);
        let request = handler
            .resolve(&mut requests, &mut results, RequestId(1), &cleartext, &signed)
            .unwrap();
        assert_eq!(request.target, TARGET);
        assert_eq!(
            results.get(TARGET),
            DecryptedResult {
                value: 42,
                revealed: true
            }
        );
        assert_eq!(requests.pending_count(), 0);
    }

    #[test]
    fn bad_proof_leaves_request_pending() {
        let (handler, mut requests, mut results, key) = setup();
        let cleartext = encode_cleartext(42);
        let forged = proof(&key, &encode_cleartext(41));
        assert!(matches!(
            handler.resolve(&mut requests, &mut results, RequestId(1), &cleartext, &forged),
            Err(LedgerError::SignatureInvalid(_))
        ));
        assert_eq!(requests.pending_count(), 1);
        assert!(results.is_empty());
    }

    #[test]
    fn malformed_cleartext_is_rejected_without_mutation() {
        let (handler, mut requests, mut results, key) = setup();
        let cleartext = vec![0xffu8; 32];
        let signed = proof(&key, &cleartext);
        assert!(matches!(
            handler.resolve(&mut requests, &mut results, RequestId(1), &cleartext, &signed),
            Err(LedgerError::InvalidInput(_))
        ));
        assert_eq!(requests.pending_count(), 1);
        assert!(results.is_empty());
    }
}
