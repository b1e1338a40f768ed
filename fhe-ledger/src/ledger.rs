//! Ledger façade that mimics a host-chain module: every public mutating
//! method is one atomic transaction, serialized by `&mut self`.

use std::sync::Arc;

use tracing::info;

use crate::access::AccessControl;
use crate::attestation::AttestationVerifier;
use crate::callback::CallbackHandler;
use crate::config::{ConfigError, LedgerConfig};
use crate::error::LedgerResult;
use crate::events::{EventSink, LedgerEvent};
use crate::fhe::{HomomorphicEvaluator, MockEvaluator};
use crate::oracle::DecryptionOracle;
use crate::requests::{PendingRequest, RequestManager};
use crate::results::ResultStore;
use crate::store::ValueStore;
use crate::types::{
    Address, CiphertextHandle, DecryptedResult, EncryptedOperation, EncryptedVariable,
    OperationId, OperationKind, RequestId, TargetId, TxContext, VariableId,
};

pub struct EncryptedLedger<E: HomomorphicEvaluator = MockEvaluator> {
    evaluator: Arc<E>,
    oracle: Arc<dyn DecryptionOracle>,
    events: Arc<dyn EventSink>,
    store: ValueStore,
    access: AccessControl,
    requests: RequestManager,
    callbacks: CallbackHandler,
    results: ResultStore,
}

impl<E: HomomorphicEvaluator> EncryptedLedger<E> {
    pub fn new(
        config: &LedgerConfig,
        evaluator: Arc<E>,
        oracle: Arc<dyn DecryptionOracle>,
        events: Arc<dyn EventSink>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let verifier = AttestationVerifier::from_config(&config.oracle)?;
        Ok(Self {
            evaluator,
            oracle,
            events,
            store: ValueStore::new(config.ledger.clone()),
            access: AccessControl::new(),
            requests: RequestManager::new(),
            callbacks: CallbackHandler::new(verifier),
            results: ResultStore::new(),
        })
    }

    pub fn create_variable(
        &mut self,
        ctx: &TxContext,
        value: CiphertextHandle,
        type_tag: CiphertextHandle,
        name: impl Into<String>,
    ) -> LedgerResult<VariableId> {
        let name = name.into();
        let id = self
            .store
            .create_variable(ctx, value, type_tag, name.clone())?;
        self.access
            .register_owner(TargetId::Variable(id), ctx.caller.clone());
        info!(%id, owner = %ctx.caller, %name, "variable created");
        self.events.emit(&LedgerEvent::VariableCreated {
            id,
            name,
            timestamp_ms: ctx.now_ms,
        });
        Ok(id)
    }

    pub fn perform_operation(
        &mut self,
        ctx: &TxContext,
        input_ids: &[VariableId],
        kind: OperationKind,
    ) -> LedgerResult<OperationId> {
        let id = self
            .store
            .perform_operation(self.evaluator.as_ref(), ctx, input_ids, kind)?;
        self.access
            .register_owner(TargetId::Operation(id), ctx.caller.clone());
        info!(%id, %kind, inputs = input_ids.len(), owner = %ctx.caller, "operation performed");
        self.events.emit(&LedgerEvent::OperationPerformed {
            id,
            timestamp_ms: ctx.now_ms,
        });
        Ok(id)
    }

    /// Same as [`Self::perform_operation`] but takes the wire-level kind tag.
    pub fn perform_operation_code(
        &mut self,
        ctx: &TxContext,
        input_ids: &[VariableId],
        kind_code: u8,
    ) -> LedgerResult<OperationId> {
        let kind = OperationKind::from_code(kind_code)?;
        self.perform_operation(ctx, input_ids, kind)
    }

    /// Let `grantee` request decryption of `target`. Owner only.
    pub fn grant_access(
        &mut self,
        ctx: &TxContext,
        target: TargetId,
        grantee: Address,
    ) -> LedgerResult<()> {
        self.access.ensure_owner(target, &ctx.caller)?;
        if self.access.grant(target, grantee.clone()) {
            info!(%target, %grantee, "access granted");
            self.events
                .emit(&LedgerEvent::AccessGranted { target, grantee });
        }
        Ok(())
    }

    /// Ask the oracle to decrypt `target`. The result arrives later through
    /// [`Self::decrypt_value`]; until then the target reads as unrevealed.
    ///
    /// An operation is only revealable while its owner has access to every
    /// variable it folded, since a single-input operation carries its input
    /// unchanged. Grantees of the operation inherit that check.
    pub fn request_decryption(
        &mut self,
        ctx: &TxContext,
        target: TargetId,
    ) -> LedgerResult<RequestId> {
        let handle = self.store.resolve(target)?;
        self.access.ensure_can_decrypt(target, &ctx.caller)?;
        if let TargetId::Operation(id) = target {
            let operation = self.store.operation(id)?;
            for input in &operation.input_ids {
                self.access
                    .ensure_can_decrypt(TargetId::Variable(*input), &operation.owner)?;
            }
        }
        let request_id = self
            .requests
            .submit(self.oracle.as_ref(), ctx, target, handle)?;
        info!(%request_id, %target, requester = %ctx.caller, "decryption requested");
        self.events
            .emit(&LedgerEvent::ResultRequested { request_id, target });
        Ok(request_id)
    }

    /// Oracle callback. Authority comes from the proof's signer set, not from
    /// who submits the transaction.
    pub fn decrypt_value(
        &mut self,
        request_id: RequestId,
        cleartext: &[u8],
        proof: &[u8],
    ) -> LedgerResult<()> {
        let request = self.callbacks.resolve(
            &mut self.requests,
            &mut self.results,
            request_id,
            cleartext,
            proof,
        )?;
        let target = request.target;
        info!(%request_id, %target, "result decrypted");
        self.events.emit(&LedgerEvent::ResultDecrypted { target });
        Ok(())
    }

    pub fn get_decrypted_result(&self, target: TargetId) -> DecryptedResult {
        self.results.get(target)
    }

    pub fn get_encrypted_variable(&self, id: VariableId) -> LedgerResult<&EncryptedVariable> {
        self.store.variable(id)
    }

    pub fn get_encrypted_operation(&self, id: OperationId) -> LedgerResult<&EncryptedOperation> {
        self.store.operation(id)
    }

    pub fn variables(&self) -> impl Iterator<Item = &EncryptedVariable> {
        self.store.variables()
    }

    pub fn operations(&self) -> impl Iterator<Item = &EncryptedOperation> {
        self.store.operations()
    }

    pub fn variable_count(&self) -> u64 {
        self.store.variable_count()
    }

    pub fn operation_count(&self) -> u64 {
        self.store.operation_count()
    }

    pub fn pending_requests(&self) -> usize {
        self.requests.pending_count()
    }

    pub fn pending_request(&self, request_id: RequestId) -> Option<&PendingRequest> {
        self.requests.lookup(request_id).ok()
    }

    pub fn pending_target(&self, request_id: RequestId) -> Option<TargetId> {
        self.pending_request(request_id).map(|request| request.target)
    }

    pub fn is_authorized(&self, target: TargetId, address: &Address) -> bool {
        self.access.is_authorized(target, address)
    }

    pub fn contains(&self, target: TargetId) -> bool {
        self.store.contains(target)
    }

    pub fn evaluator(&self) -> &Arc<E> {
        &self.evaluator
    }
}
