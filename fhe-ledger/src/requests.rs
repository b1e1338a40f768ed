//! Outstanding decryption requests. Each entry is one-shot: it lives from
//! submission until the single callback that consumes it.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{LedgerError, LedgerResult};
use crate::oracle::DecryptionOracle;
use crate::types::{Address, CiphertextHandle, RequestId, TargetId, TxContext};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingRequest {
    pub request_id: RequestId,
    pub target: TargetId,
    pub handle: CiphertextHandle,
    pub requester: Address,
    pub requested_at_ms: u64,
}

#[derive(Debug, Default)]
pub struct RequestManager {
    pending: BTreeMap<RequestId, PendingRequest>,
    /// Every id ever resolved. Never pruned: a pruned id could be reissued by
    /// the oracle and replayed, so this grows with the number of callbacks.
    consumed: BTreeSet<RequestId>,
}

impl RequestManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand `handle` to the oracle and record the id it assigns. An id the
    /// oracle has already used, pending or consumed, is refused.
    pub fn submit(
        &mut self,
        oracle: &dyn DecryptionOracle,
        ctx: &TxContext,
        target: TargetId,
        handle: CiphertextHandle,
    ) -> LedgerResult<RequestId> {
        let request_id = oracle.submit(target, &handle)?;
        if self.pending.contains_key(&request_id) {
            return Err(LedgerError::InvalidRequest {
                request_id,
                reason: "oracle reissued a pending request id",
            });
        }
        if self.consumed.contains(&request_id) {
            return Err(LedgerError::InvalidRequest {
                request_id,
                reason: "oracle reissued a consumed request id",
            });
        }
        self.pending.insert(
            request_id,
            PendingRequest {
                request_id,
                target,
                handle,
                requester: ctx.caller.clone(),
                requested_at_ms: ctx.now_ms,
            },
        );
        Ok(request_id)
    }

    pub fn lookup(&self, request_id: RequestId) -> LedgerResult<&PendingRequest> {
        self.pending.get(&request_id).ok_or_else(|| {
            let reason = if self.consumed.contains(&request_id) {
                "request already resolved"
            } else {
                "request was never issued"
            };
            LedgerError::InvalidRequest { request_id, reason }
        })
    }

    /// Invalidate a pending request so it can never be resolved again.
    pub fn consume(&mut self, request_id: RequestId) -> LedgerResult<PendingRequest> {
        let request = self
            .pending
            .remove(&request_id)
            .ok_or(LedgerError::InvalidRequest {
                request_id,
                reason: "request was never issued",
            })?;
        self.consumed.insert(request_id);
        Ok(request)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn pending(&self) -> impl Iterator<Item = &PendingRequest> {
        self.pending.values()
    }

    pub fn is_consumed(&self, request_id: RequestId) -> bool {
        self.consumed.contains(&request_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::OracleError;
    use crate::types::VariableId;
    use parking_lot::Mutex;

    /// Oracle that replays a fixed script of ids.
    struct ScriptedOracle {
        ids: Mutex<Vec<Result<RequestId, OracleError>>>,
    }

    impl ScriptedOracle {
        fn new(mut ids: Vec<Result<RequestId, OracleError>>) -> Self {
            ids.reverse();
            Self {
                ids: Mutex::new(ids),
            }
        }
    }

    impl DecryptionOracle for ScriptedOracle {
        fn submit(
            &self,
            _target: TargetId,
            _handle: &CiphertextHandle,
        ) -> Result<RequestId, OracleError> {
            self.ids
                .lock()
                .pop()
                .unwrap_or_else(|| Err(OracleError::Rejected("script exhausted".into())))
        }
    }

    fn ctx() -> TxContext {
        TxContext::new("did:fhe:alice", 10)
    }

    const TARGET: TargetId = TargetId::Variable(VariableId(1));
    const HANDLE: CiphertextHandle = CiphertextHandle([1u8; 32]);

    #[test]
    fn consumed_requests_cannot_be_looked_up_again() {
        let oracle = ScriptedOracle::new(vec![Ok(RequestId(7))]);
        let mut manager = RequestManager::new();
        let id = manager.submit(&oracle, &ctx(), TARGET, HANDLE).unwrap();
        assert_eq!(manager.lookup(id).unwrap().target, TARGET);

        manager.consume(id).unwrap();
        assert!(manager.is_consumed(id));
        assert_eq!(
            manager.lookup(id),
            Err(LedgerError::InvalidRequest {
                request_id: id,
                reason: "request already resolved"
            })
        );
        assert!(manager.consume(id).is_err());
    }

    #[test]
    fn refuses_reissued_ids() {
        let oracle = ScriptedOracle::new(vec![
            Ok(RequestId(1)),
            Ok(RequestId(1)),
            Ok(RequestId(2)),
            Ok(RequestId(2)),
        ]);
        let mut manager = RequestManager::new();
        manager.submit(&oracle, &ctx(), TARGET, HANDLE).unwrap();
        assert!(matches!(
            manager.submit(&oracle, &ctx(), TARGET, HANDLE),
            Err(LedgerError::InvalidRequest { .. })
        ));
        manager.submit(&oracle, &ctx(), TARGET, HANDLE).unwrap();
        manager.consume(RequestId(2)).unwrap();
        assert!(matches!(
            manager.submit(&oracle, &ctx(), TARGET, HANDLE),
            Err(LedgerError::InvalidRequest { .. })
        ));
        assert_eq!(manager.pending_count(), 1);
    }

    #[test]
    fn oracle_failures_record_nothing() {
        let oracle = ScriptedOracle::new(vec![Err(OracleError::Rejected("offline".into()))]);
        let mut manager = RequestManager::new();
        assert!(matches!(
            manager.submit(&oracle, &ctx(), TARGET, HANDLE),
            Err(LedgerError::OracleUnavailable(_))
        ));
        assert_eq!(manager.pending_count(), 0);
    }
}
