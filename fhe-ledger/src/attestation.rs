//! Oracle attestation scheme: what the oracle signs, how proofs are laid out,
//! and how cleartexts are encoded.
//!
//! A proof is one or more 96-byte entries `public_key (32) || signature (64)`.
//! Each signature covers [`attestation_digest`], which binds the request id,
//! the ciphertext handle being revealed, and the cleartext bytes.

use std::collections::BTreeMap;

use blake3::Hasher;
use ed25519_dalek::{Signature, VerifyingKey};

use crate::config::{ConfigError, OracleSection};
use crate::error::{LedgerError, LedgerResult};
use crate::types::{CiphertextHandle, RequestId};

pub const PROOF_ENTRY_LEN: usize = 32 + 64;
pub const CLEARTEXT_LEN: usize = 32;

const ATTESTATION_DOMAIN: &[u8] = b"fhe-ledger/decryption/v1";

pub fn attestation_digest(
    request_id: RequestId,
    handle: &CiphertextHandle,
    cleartext: &[u8],
) -> [u8; 32] {
    let mut hasher = Hasher::new();
    hasher.update(ATTESTATION_DOMAIN);
    hasher.update(&request_id.0.to_be_bytes());
    hasher.update(&handle.0);
    hasher.update(cleartext);
    *hasher.finalize().as_bytes()
}

pub fn encode_proof(entries: &[(VerifyingKey, Signature)]) -> Vec<u8> {
    let mut proof = Vec::with_capacity(entries.len() * PROOF_ENTRY_LEN);
    for (key, signature) in entries {
        proof.extend_from_slice(key.as_bytes());
        proof.extend_from_slice(&signature.to_bytes());
    }
    proof
}

/// Cleartexts travel as one 32-byte big-endian word.
pub fn encode_cleartext(value: u32) -> Vec<u8> {
    let mut word = vec![0u8; CLEARTEXT_LEN];
    word[CLEARTEXT_LEN - 4..].copy_from_slice(&value.to_be_bytes());
    word
}

pub fn decode_cleartext(bytes: &[u8]) -> LedgerResult<u32> {
    if bytes.len() != CLEARTEXT_LEN {
        return Err(LedgerError::InvalidInput(format!(
            "cleartext must be {CLEARTEXT_LEN} bytes, got {}",
            bytes.len()
        )));
    }
    let (high, low) = bytes.split_at(CLEARTEXT_LEN - 4);
    if high.iter().any(|byte| *byte != 0) {
        return Err(LedgerError::InvalidInput(
            "cleartext does not fit in 32 bits".into(),
        ));
    }
    let mut value = [0u8; 4];
    value.copy_from_slice(low);
    Ok(u32::from_be_bytes(value))
}

/// Verifies oracle proofs against the configured signer set.
#[derive(Clone, Debug)]
pub struct AttestationVerifier {
    trusted: BTreeMap<[u8; 32], VerifyingKey>,
    threshold: usize,
}

impl AttestationVerifier {
    pub fn from_config(config: &OracleSection) -> Result<Self, ConfigError> {
        config.validate()?;
        let trusted = config
            .signer_keys()?
            .into_iter()
            .map(|key| (key.to_bytes(), key))
            .collect();
        Ok(Self {
            trusted,
            threshold: config.signature_threshold,
        })
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn is_trusted(&self, public_key: &[u8; 32]) -> bool {
        self.trusted.contains_key(public_key)
    }

    pub fn verify(
        &self,
        request_id: RequestId,
        handle: &CiphertextHandle,
        cleartext: &[u8],
        proof: &[u8],
    ) -> LedgerResult<()> {
        if proof.is_empty() || proof.len() % PROOF_ENTRY_LEN != 0 {
            return Err(LedgerError::SignatureInvalid(format!(
                "proof length {} is not a positive multiple of {PROOF_ENTRY_LEN}",
                proof.len()
            )));
        }

        let digest = attestation_digest(request_id, handle, cleartext);
        let mut attested: Vec<[u8; 32]> = Vec::new();
        for entry in proof.chunks_exact(PROOF_ENTRY_LEN) {
            let (key_bytes, sig_bytes) = entry.split_at(32);
            let mut public_key = [0u8; 32];
            public_key.copy_from_slice(key_bytes);
            let key = self.trusted.get(&public_key).ok_or_else(|| {
                LedgerError::SignatureInvalid(format!(
                    "signer {} is not a trusted oracle",
                    hex::encode(public_key)
                ))
            })?;
            let signature = Signature::from_slice(sig_bytes)
                .map_err(|err| LedgerError::SignatureInvalid(err.to_string()))?;
            key.verify_strict(&digest, &signature).map_err(|_| {
                LedgerError::SignatureInvalid(format!(
                    "signature from {} does not verify",
                    hex::encode(public_key)
                ))
            })?;
            if !attested.contains(&public_key) {
                attested.push(public_key);
            }
        }

        if attested.len() < self.threshold {
            return Err(LedgerError::SignatureInvalid(format!(
                "{} of {} required oracle signatures",
                attested.len(),
                self.threshold
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};

    fn key(seed: u8) -> SigningKey {
        SigningKey::from_bytes(&[seed; 32])
    }

    fn verifier(seeds: &[u8], threshold: usize) -> AttestationVerifier {
        AttestationVerifier::from_config(&OracleSection {
            trusted_signers: seeds
                .iter()
                .map(|seed| hex::encode(key(*seed).verifying_key().to_bytes()))
                .collect(),
            signature_threshold: threshold,
        })
        .unwrap()
    }

    fn sign(seed: u8, digest: &[u8; 32]) -> (VerifyingKey, Signature) {
        let signer = key(seed);
        (signer.verifying_key(), signer.sign(digest))
    }

    #[test]
    fn cleartext_words_round_trip() {
        assert_eq!(decode_cleartext(&encode_cleartext(200)).unwrap(), 200);
        let mut oversized = encode_cleartext(1);
        oversized[0] = 1;
        assert!(matches!(
            decode_cleartext(&oversized),
            Err(LedgerError::InvalidInput(_))
        ));
        assert!(matches!(
            decode_cleartext(&[0u8; 4]),
            Err(LedgerError::InvalidInput(_))
        ));
    }

    #[test]
    fn accepts_a_trusted_signature() {
        let handle = CiphertextHandle([3u8; 32]);
        let cleartext = encode_cleartext(7);
        let digest = attestation_digest(RequestId(1), &handle, &cleartext);
        let proof = encode_proof(&[sign(1, &digest)]);
        assert!(verifier(&[1], 1)
            .verify(RequestId(1), &handle, &cleartext, &proof)
            .is_ok());
    }

    #[test]
    fn signature_is_bound_to_request_and_cleartext() {
        let handle = CiphertextHandle([3u8; 32]);
        let cleartext = encode_cleartext(7);
        let digest = attestation_digest(RequestId(1), &handle, &cleartext);
        let proof = encode_proof(&[sign(1, &digest)]);
        let verifier = verifier(&[1], 1);
        assert!(matches!(
            verifier.verify(RequestId(2), &handle, &cleartext, &proof),
            Err(LedgerError::SignatureInvalid(_))
        ));
        assert!(matches!(
            verifier.verify(RequestId(1), &handle, &encode_cleartext(8), &proof),
            Err(LedgerError::SignatureInvalid(_))
        ));
        assert!(matches!(
            verifier.verify(RequestId(1), &CiphertextHandle([4u8; 32]), &cleartext, &proof),
            Err(LedgerError::SignatureInvalid(_))
        ));
    }

    #[test]
    fn rejects_untrusted_signers_and_bad_layouts() {
        let handle = CiphertextHandle([3u8; 32]);
        let cleartext = encode_cleartext(7);
        let digest = attestation_digest(RequestId(1), &handle, &cleartext);
        let verifier = verifier(&[1], 1);
        let foreign = encode_proof(&[sign(9, &digest)]);
        assert!(matches!(
            verifier.verify(RequestId(1), &handle, &cleartext, &foreign),
            Err(LedgerError::SignatureInvalid(_))
        ));
        assert!(matches!(
            verifier.verify(RequestId(1), &handle, &cleartext, &[]),
            Err(LedgerError::SignatureInvalid(_))
        ));
        let mut truncated = encode_proof(&[sign(1, &digest)]);
        truncated.pop();
        assert!(matches!(
            verifier.verify(RequestId(1), &handle, &cleartext, &truncated),
            Err(LedgerError::SignatureInvalid(_))
        ));
    }

    #[test]
    fn rejects_small_order_keys_even_when_trusted() {
        // Identity public key, identity R and zero s satisfy the verification
        // equation for any message.
        let mut identity = [0u8; 32];
        identity[0] = 1;
        let verifier = AttestationVerifier::from_config(&OracleSection {
            trusted_signers: vec![hex::encode(identity)],
            signature_threshold: 1,
        })
        .unwrap();

        let mut proof = Vec::with_capacity(PROOF_ENTRY_LEN);
        proof.extend_from_slice(&identity);
        proof.extend_from_slice(&identity);
        proof.extend_from_slice(&[0u8; 32]);
        let handle = CiphertextHandle([3u8; 32]);
        assert!(matches!(
            verifier.verify(RequestId(1), &handle, &encode_cleartext(999), &proof),
            Err(LedgerError::SignatureInvalid(_))
        ));
    }

    #[test]
    fn threshold_counts_distinct_signers() {
        let handle = CiphertextHandle([3u8; 32]);
        let cleartext = encode_cleartext(7);
        let digest = attestation_digest(RequestId(1), &handle, &cleartext);
        let verifier = verifier(&[1, 2, 3], 2);

        let repeated = encode_proof(&[sign(1, &digest), sign(1, &digest)]);
        assert!(matches!(
            verifier.verify(RequestId(1), &handle, &cleartext, &repeated),
            Err(LedgerError::SignatureInvalid(_))
        ));

        let quorum = encode_proof(&[sign(1, &digest), sign(3, &digest)]);
        assert!(verifier
            .verify(RequestId(1), &handle, &cleartext, &quorum)
            .is_ok());
    }
}
