//! Value & operation store: encrypted variables, encrypted operation results,
//! and the two independent id counters.

use std::collections::BTreeMap;

use tracing::debug;

use crate::config::LedgerSection;
use crate::error::{LedgerError, LedgerResult};
use crate::fhe::HomomorphicEvaluator;
use crate::types::{
    CiphertextHandle, EncryptedOperation, EncryptedVariable, OperationId, OperationKind, TargetId,
    TxContext, VariableId,
};

pub struct ValueStore {
    limits: LedgerSection,
    variables: BTreeMap<VariableId, EncryptedVariable>,
    operations: BTreeMap<OperationId, EncryptedOperation>,
    variable_counter: u64,
    operation_counter: u64,
}

impl ValueStore {
    pub fn new(limits: LedgerSection) -> Self {
        Self {
            limits,
            variables: BTreeMap::new(),
            operations: BTreeMap::new(),
            variable_counter: 0,
            operation_counter: 0,
        }
    }

    pub fn create_variable(
        &mut self,
        ctx: &TxContext,
        value: CiphertextHandle,
        type_tag: CiphertextHandle,
        name: impl Into<String>,
    ) -> LedgerResult<VariableId> {
        let name = name.into();
        let next = self.variable_counter + 1;
        let id = VariableId(next);
        self.variables.insert(
            id,
            EncryptedVariable {
                id,
                value,
                type_tag,
                name,
                owner: ctx.caller.clone(),
                created_at_ms: ctx.now_ms,
            },
        );
        self.variable_counter = next;
        Ok(id)
    }

    /// Fold the inputs' ciphertexts left to right with `kind`, seeded by the
    /// first input, and store the result under a fresh operation id.
    pub fn perform_operation<E>(
        &mut self,
        evaluator: &E,
        ctx: &TxContext,
        input_ids: &[VariableId],
        kind: OperationKind,
    ) -> LedgerResult<OperationId>
    where
        E: HomomorphicEvaluator + ?Sized,
    {
        let (seed_id, rest) = input_ids
            .split_first()
            .ok_or_else(|| LedgerError::InvalidInput("operation needs at least one input".into()))?;
        if input_ids.len() > self.limits.max_inputs_per_operation {
            return Err(LedgerError::InvalidInput(format!(
                "operation has {} inputs (max {})",
                input_ids.len(),
                self.limits.max_inputs_per_operation
            )));
        }

        let mut accumulator = self.input_handle(*seed_id)?;
        for id in rest {
            let operand = self.input_handle(*id)?;
            accumulator = evaluator.apply(kind, &accumulator, &operand)?;
            debug!(%kind, operand = %id, "folded operand");
        }

        let next = self.operation_counter + 1;
        let id = OperationId(next);
        self.operations.insert(
            id,
            EncryptedOperation {
                id,
                result: accumulator,
                input_ids: input_ids.to_vec(),
                kind,
                owner: ctx.caller.clone(),
                created_at_ms: ctx.now_ms,
            },
        );
        self.operation_counter = next;
        Ok(id)
    }

    pub fn variable(&self, id: VariableId) -> LedgerResult<&EncryptedVariable> {
        self.variables
            .get(&id)
            .ok_or(LedgerError::NotFound(TargetId::Variable(id)))
    }

    pub fn operation(&self, id: OperationId) -> LedgerResult<&EncryptedOperation> {
        self.operations
            .get(&id)
            .ok_or(LedgerError::NotFound(TargetId::Operation(id)))
    }

    /// Ciphertext handle stored for `target`.
    pub fn resolve(&self, target: TargetId) -> LedgerResult<CiphertextHandle> {
        match target {
            TargetId::Variable(id) => self.variable(id).map(|var| var.value),
            TargetId::Operation(id) => self.operation(id).map(|op| op.result),
        }
    }

    pub fn contains(&self, target: TargetId) -> bool {
        match target {
            TargetId::Variable(id) => self.variables.contains_key(&id),
            TargetId::Operation(id) => self.operations.contains_key(&id),
        }
    }

    pub fn variables(&self) -> impl Iterator<Item = &EncryptedVariable> {
        self.variables.values()
    }

    pub fn operations(&self) -> impl Iterator<Item = &EncryptedOperation> {
        self.operations.values()
    }

    pub fn variable_count(&self) -> u64 {
        self.variable_counter
    }

    pub fn operation_count(&self) -> u64 {
        self.operation_counter
    }

    fn input_handle(&self, id: VariableId) -> LedgerResult<CiphertextHandle> {
        self.variables
            .get(&id)
            .map(|var| var.value)
            .ok_or_else(|| LedgerError::InvalidInput(format!("input {id} does not exist")))
    }
}
