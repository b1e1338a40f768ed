//! Encrypted value ledger with an oracle-backed decryption protocol.
//!
//! The crate keeps encrypted variables and the encrypted results of
//! homomorphic operations over them, and reveals plaintexts only through an
//! asynchronous request/callback exchange with a trusted decryption oracle.
//! Every state-mutating entry point on [`EncryptedLedger`] is all-or-nothing:
//! it validates and computes everything it needs before the first write.
//!
//! # Quickstart
//! ```
//! use std::sync::Arc;
//! use fhe_ledger::{
//!     EncryptedLedger, FheType, LedgerConfig, LocalOracle, MemoryEventLog, MockEvaluator,
//!     OperationKind, TargetId, TxContext,
//! };
//!
//! let evaluator = Arc::new(MockEvaluator::new());
//! let oracle = Arc::new(LocalOracle::new(evaluator.clone(), [7u8; 32]));
//! let config = LedgerConfig::sample(&oracle.public_key_hex());
//! let events = Arc::new(MemoryEventLog::default());
//! let mut ledger =
//!     EncryptedLedger::new(&config, evaluator.clone(), oracle.clone(), events).unwrap();
//!
//! let alice = TxContext::new("did:fhe:alice", 1_700_000_000_000);
//! let tag = evaluator.encrypt_type_tag(FheType::Uint32);
//! let three = evaluator.encrypt(3, FheType::Uint32);
//! let four = evaluator.encrypt(4, FheType::Uint32);
//! let a = ledger.create_variable(&alice, three, tag, "A").unwrap();
//! let b = ledger.create_variable(&alice, four, tag, "B").unwrap();
//! let sum = ledger.perform_operation(&alice, &[a, b], OperationKind::Add).unwrap();
//!
//! let request = ledger.request_decryption(&alice, TargetId::Operation(sum)).unwrap();
//! let response = oracle.fulfil(request).unwrap();
//! ledger.decrypt_value(request, &response.cleartext, &response.proof).unwrap();
//!
//! let result = ledger.get_decrypted_result(TargetId::Operation(sum));
//! assert_eq!((result.value, result.revealed), (7, true));
//! ```

pub mod access;
pub mod attestation;
pub mod callback;
pub mod config;
pub mod error;
pub mod events;
pub mod fhe;
pub mod ledger;
pub mod oracle;
pub mod requests;
pub mod results;
pub mod store;
pub mod types;

pub use access::AccessControl;
pub use attestation::{
    attestation_digest, decode_cleartext, encode_cleartext, encode_proof, AttestationVerifier,
    PROOF_ENTRY_LEN,
};
pub use callback::CallbackHandler;
pub use config::{ConfigError, LedgerConfig, LedgerSection, OracleSection};
pub use error::{LedgerError, LedgerResult};
pub use events::{CompositeEventSink, EventSink, LedgerEvent, MemoryEventLog, NoopEventSink};
pub use fhe::{FheError, HomomorphicEvaluator, MockEvaluator};
pub use ledger::EncryptedLedger;
pub use oracle::{DecryptionOracle, LocalOracle, OracleError, OracleResponse};
pub use requests::{PendingRequest, RequestManager};
pub use results::ResultStore;
pub use store::ValueStore;
pub use types::{
    Address, CiphertextHandle, DecryptedResult, EncryptedOperation, EncryptedVariable, FheType,
    OperationId, OperationKind, RequestId, TargetId, TxContext, VariableId,
};
