use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("configuration invalid: {0}")]
    Validation(String),
    #[error("trusted signer `{key}` is not a valid ed25519 public key: {reason}")]
    InvalidSignerKey { key: String, reason: String },
}

/// Ledger configuration.
///
/// # TOML
/// ```text
/// [ledger]
/// max-inputs-per-operation = 64
///
/// [oracle]
/// trusted-signers = ["ea4a6c63e29c520abef5507b132ec5f9954776aebebe7b92421eea691446d22c"]
/// signature-threshold = 1
/// ```
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct LedgerConfig {
    #[serde(default)]
    pub ledger: LedgerSection,
    pub oracle: OracleSection,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct LedgerSection {
    #[serde(default = "default_max_inputs")]
    pub max_inputs_per_operation: usize,
}

impl Default for LedgerSection {
    fn default() -> Self {
        Self {
            max_inputs_per_operation: default_max_inputs(),
        }
    }
}

/// Oracle trust boundary: callbacks are accepted only when attested by at
/// least `signature_threshold` distinct keys from `trusted_signers`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct OracleSection {
    /// Hex-encoded 32-byte ed25519 public keys.
    #[serde(default)]
    pub trusted_signers: Vec<String>,
    #[serde(default = "default_signature_threshold")]
    pub signature_threshold: usize,
}

impl Default for OracleSection {
    fn default() -> Self {
        Self {
            trusted_signers: Vec::new(),
            signature_threshold: default_signature_threshold(),
        }
    }
}

const fn default_max_inputs() -> usize {
    64
}

const fn default_signature_threshold() -> usize {
    1
}

impl LedgerConfig {
    /// Single-signer configuration trusting `signer_hex`.
    pub fn sample(signer_hex: &str) -> Self {
        Self {
            ledger: LedgerSection::default(),
            oracle: OracleSection {
                trusted_signers: vec![signer_hex.to_owned()],
                signature_threshold: default_signature_threshold(),
            },
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ledger.max_inputs_per_operation == 0 {
            return Err(ConfigError::Validation(
                "max-inputs-per-operation must be greater than zero".into(),
            ));
        }
        self.oracle.validate()
    }
}

impl OracleSection {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let keys = self.signer_keys()?;
        if keys.is_empty() {
            return Err(ConfigError::Validation(
                "at least one trusted oracle signer must be configured".into(),
            ));
        }
        if self.signature_threshold == 0 {
            return Err(ConfigError::Validation(
                "signature threshold must be greater than zero".into(),
            ));
        }
        if self.signature_threshold > keys.len() {
            return Err(ConfigError::Validation(format!(
                "signature threshold {} exceeds {} trusted signers",
                self.signature_threshold,
                keys.len()
            )));
        }
        Ok(())
    }

    /// Decode the configured signer keys, dropping duplicates.
    pub fn signer_keys(&self) -> Result<Vec<VerifyingKey>, ConfigError> {
        let mut keys: Vec<VerifyingKey> = Vec::with_capacity(self.trusted_signers.len());
        for key_hex in &self.trusted_signers {
            let key = decode_signer(key_hex)?;
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        Ok(keys)
    }
}

fn decode_signer(key_hex: &str) -> Result<VerifyingKey, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidSignerKey {
        key: key_hex.to_owned(),
        reason,
    };
    let bytes = hex::decode(key_hex.trim()).map_err(|err| invalid(err.to_string()))?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|raw: Vec<u8>| invalid(format!("expected 32 bytes, got {}", raw.len())))?;
    VerifyingKey::from_bytes(&bytes).map_err(|err| invalid(err.to_string()))
}
