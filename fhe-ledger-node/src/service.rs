//! Scenario driver: builds a ledger wired to a local oracle committee,
//! replays the configured creations and operations, requests decryption of
//! the selected targets, and plays the oracle's callbacks.
//!
//! # Example
//! ```
//! use fhe_ledger_node::config::Config;
//! use fhe_ledger_node::service::NodeService;
//!
//! let cfg = Config::sample();
//! let mut service = NodeService::from_config(&cfg).unwrap();
//! let report = service.run_scenario(1_700_000_000_000).unwrap();
//! assert_eq!(report.revealed[0].value, 200);
//! ```

use std::collections::BTreeMap;
use std::num::TryFromIntError;
use std::sync::Arc;
use std::time::{SystemTime, SystemTimeError, UNIX_EPOCH};

use fhe_ledger::{
    Address, ConfigError as LedgerConfigError, EncryptedLedger, EventSink, LedgerConfig,
    LedgerError, LedgerEvent, LocalOracle, MemoryEventLog, MockEvaluator, OperationKind,
    OracleError, OracleSection, RequestId, TargetId, TxContext,
};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::config::{Config, ConfigError, ScenarioSection};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    LedgerConfig(#[from] LedgerConfigError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Oracle(#[from] OracleError),
    #[error("system clock is before the unix epoch: {0}")]
    Clock(#[from] SystemTimeError),
    #[error("timestamp does not fit in u64 milliseconds: {0}")]
    TimestampOverflow(#[from] TryFromIntError),
}

/// Milliseconds since the unix epoch, as handed to the ledger in `TxContext`.
pub fn epoch_millis(at: SystemTime) -> Result<u64, ServiceError> {
    Ok(u64::try_from(at.duration_since(UNIX_EPOCH)?.as_millis())?)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RevealedValue {
    pub name: String,
    pub target: TargetId,
    pub value: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ScenarioReport {
    pub variables: u64,
    pub operations: u64,
    pub revealed: Vec<RevealedValue>,
    pub events: Vec<LedgerEvent>,
}

pub struct NodeService {
    operator: Address,
    scenario: ScenarioSection,
    evaluator: Arc<MockEvaluator>,
    oracle: Arc<LocalOracle>,
    events: Arc<MemoryEventLog>,
    ledger: EncryptedLedger,
}

impl NodeService {
    pub fn from_config(config: &Config) -> Result<Self, ServiceError> {
        config.validate()?;
        let evaluator = Arc::new(MockEvaluator::new());
        let oracle = Arc::new(LocalOracle::with_committee(
            evaluator.clone(),
            &config.oracle_seeds()?,
        ));

        let oracle_section = if config.oracle.trusted_signers.is_empty() {
            OracleSection {
                trusted_signers: oracle.public_keys_hex(),
                signature_threshold: config.oracle.signature_threshold,
            }
        } else {
            config.oracle.clone()
        };
        let ledger_config = LedgerConfig {
            ledger: config.ledger.clone(),
            oracle: oracle_section,
        };

        let events = Arc::new(MemoryEventLog::default());
        let sink: Arc<dyn EventSink> = events.clone();
        let ledger = EncryptedLedger::new(&ledger_config, evaluator.clone(), oracle.clone(), sink)?;
        Ok(Self {
            operator: Address::new(config.node.operator.clone()),
            scenario: config.scenario.clone(),
            evaluator,
            oracle,
            events,
            ledger,
        })
    }

    pub fn ledger(&self) -> &EncryptedLedger {
        &self.ledger
    }

    pub fn run_scenario(&mut self, now_ms: u64) -> Result<ScenarioReport, ServiceError> {
        let ctx = TxContext {
            caller: self.operator.clone(),
            now_ms,
        };
        let mut targets: BTreeMap<String, TargetId> = BTreeMap::new();

        for spec in &self.scenario.variables {
            let value = self.evaluator.encrypt(spec.value, spec.fhe_type);
            let tag = self.evaluator.encrypt_type_tag(spec.fhe_type);
            let id = self
                .ledger
                .create_variable(&ctx, value, tag, spec.name.clone())?;
            targets.insert(spec.name.clone(), TargetId::Variable(id));
        }

        for spec in &self.scenario.operations {
            let kind: OperationKind = spec.kind.parse()?;
            let inputs = spec
                .inputs
                .iter()
                .map(|name| match targets.get(name) {
                    Some(TargetId::Variable(id)) => Ok(*id),
                    _ => Err(LedgerError::InvalidInput(format!(
                        "`{name}` is not a scenario variable"
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()?;
            let id = self.ledger.perform_operation(&ctx, &inputs, kind)?;
            targets.insert(spec.name.clone(), TargetId::Operation(id));
        }

        let reveal: Vec<String> = if self.scenario.reveal.is_empty() {
            self.scenario
                .operations
                .iter()
                .map(|spec| spec.name.clone())
                .collect()
        } else {
            self.scenario.reveal.clone()
        };

        let mut requests: Vec<(RequestId, String, TargetId)> = Vec::with_capacity(reveal.len());
        for name in reveal {
            let target = *targets.get(&name).ok_or_else(|| {
                LedgerError::InvalidInput(format!("`{name}` is not a scenario name"))
            })?;
            let request_id = self.ledger.request_decryption(&ctx, target)?;
            requests.push((request_id, name, target));
        }
        if self.scenario.reverse_fulfilment {
            requests.reverse();
        }

        for (request_id, name, target) in &requests {
            let response = self.oracle.fulfil(*request_id)?;
            self.ledger
                .decrypt_value(*request_id, &response.cleartext, &response.proof)?;
            info!(%request_id, %name, %target, "oracle callback applied");
        }

        let revealed = requests
            .into_iter()
            .map(|(_, name, target)| RevealedValue {
                name,
                target,
                value: self.ledger.get_decrypted_result(target).value,
            })
            .collect();

        Ok(ScenarioReport {
            variables: self.ledger.variable_count(),
            operations: self.ledger.operation_count(),
            revealed,
            events: self.events.drain(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OperationSpec, VariableSpec};
    use fhe_ledger::{FheType, OperationId};
    use std::time::Duration;

    #[test]
    fn epoch_millis_converts_without_truncation() {
        let at = UNIX_EPOCH + Duration::from_millis(1_700_000_000_123);
        assert_eq!(epoch_millis(at).unwrap(), 1_700_000_000_123);
        assert!(matches!(
            epoch_millis(UNIX_EPOCH - Duration::from_secs(1)),
            Err(ServiceError::Clock(_))
        ));
    }

    #[test]
    fn sample_scenario_reveals_product() {
        let mut service = NodeService::from_config(&Config::sample()).unwrap();
        let report = service.run_scenario(1_000).unwrap();
        assert_eq!(report.variables, 2);
        assert_eq!(report.operations, 1);
        assert_eq!(
            report.revealed,
            vec![RevealedValue {
                name: "product".into(),
                target: TargetId::Operation(OperationId(1)),
                value: 200,
            }]
        );
        assert_eq!(report.events.len(), 5);
        assert_eq!(service.ledger().pending_requests(), 0);
    }

    #[test]
    fn reverse_fulfilment_still_resolves_everything() {
        let mut config = Config::sample();
        config.scenario.variables.push(VariableSpec {
            name: "C".into(),
            value: 1,
            fhe_type: FheType::Uint32,
        });
        config.scenario.operations.push(OperationSpec {
            name: "difference".into(),
            inputs: vec!["B".into(), "A".into(), "C".into()],
            kind: "sub".into(),
        });
        config.scenario.reveal = vec!["product".into(), "difference".into(), "A".into()];
        config.scenario.reverse_fulfilment = true;

        let mut service = NodeService::from_config(&config).unwrap();
        let report = service.run_scenario(1_000).unwrap();
        let values: Vec<_> = report
            .revealed
            .iter()
            .map(|r| (r.name.as_str(), r.value))
            .collect();
        assert_eq!(values, vec![("A", 10), ("difference", 9), ("product", 200)]);
    }

    #[test]
    fn committee_threshold_is_enforced_end_to_end() {
        let mut config = Config::sample();
        config.node.oracle_seeds = vec!["01".repeat(32), "02".repeat(32)];
        config.oracle.signature_threshold = 2;
        let mut service = NodeService::from_config(&config).unwrap();
        let report = service.run_scenario(5).unwrap();
        assert_eq!(report.revealed[0].value, 200);
    }

    #[test]
    fn foreign_trusted_signers_reject_local_callbacks() {
        let mut config = Config::sample();
        let outsider = LocalOracle::new(Arc::new(MockEvaluator::new()), [9u8; 32]);
        config.oracle.trusted_signers = vec![outsider.public_key_hex()];
        let mut service = NodeService::from_config(&config).unwrap();
        assert!(matches!(
            service.run_scenario(5),
            Err(ServiceError::Ledger(LedgerError::SignatureInvalid(_)))
        ));
    }
}
