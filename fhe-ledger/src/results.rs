use std::collections::BTreeMap;

use crate::types::{DecryptedResult, TargetId};

/// Revealed cleartexts keyed by target. Later writes replace earlier ones.
#[derive(Debug, Default)]
pub struct ResultStore {
    results: BTreeMap<TargetId, DecryptedResult>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, target: TargetId) -> DecryptedResult {
        self.results.get(&target).copied().unwrap_or_default()
    }

    /// Returns the result this write replaced, if any.
    pub fn record(&mut self, target: TargetId, value: u32) -> Option<DecryptedResult> {
        self.results.insert(
            target,
            DecryptedResult {
                value,
                revealed: true,
            },
        )
    }

    pub fn revealed(&self) -> impl Iterator<Item = (&TargetId, &DecryptedResult)> {
        self.results.iter()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OperationId, VariableId};

    #[test]
    fn unknown_targets_read_as_unrevealed() {
        let store = ResultStore::new();
        assert_eq!(
            store.get(TargetId::Variable(VariableId(1))),
            DecryptedResult::default()
        );
    }

    #[test]
    fn last_write_wins() {
        let mut store = ResultStore::new();
        let target = TargetId::Operation(OperationId(1));
        assert_eq!(store.record(target, 5), None);
        let previous = store.record(target, 0).unwrap();
        assert_eq!(previous.value, 5);
        assert_eq!(
            store.get(target),
            DecryptedResult {
                value: 0,
                revealed: true
            }
        );
        assert_eq!(store.len(), 1);
    }
}
