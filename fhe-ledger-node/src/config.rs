use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
};

use clap::ValueEnum;
use fhe_ledger::{FheType, LedgerSection, OperationKind, OracleSection};
use rand::{rngs::OsRng, RngCore};
use serde::Deserialize;
use thiserror::Error;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum ConfigFormat {
    Auto,
    Toml,
    Yaml,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {format:?} config: {details}")]
    Parse {
        format: ConfigFormat,
        details: String,
    },
    #[error("configuration invalid: {0}")]
    Validation(String),
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub node: NodeSection,
    #[serde(default)]
    pub ledger: LedgerSection,
    /// When `trusted-signers` is empty the node trusts its own oracle keys.
    #[serde(default)]
    pub oracle: OracleSection,
    #[serde(default)]
    pub scenario: ScenarioSection,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct NodeSection {
    #[serde(default = "default_operator")]
    pub operator: String,
    /// Hex-encoded 32-byte ed25519 seeds for the local oracle committee.
    /// One seed is generated when omitted.
    #[serde(default = "default_oracle_seeds")]
    pub oracle_seeds: Vec<String>,
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            operator: default_operator(),
            oracle_seeds: default_oracle_seeds(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct ScenarioSection {
    #[serde(default)]
    pub variables: Vec<VariableSpec>,
    #[serde(default)]
    pub operations: Vec<OperationSpec>,
    /// Names of variables or operations to reveal. Empty means every operation.
    #[serde(default)]
    pub reveal: Vec<String>,
    /// Fulfil oracle jobs newest first.
    #[serde(default)]
    pub reverse_fulfilment: bool,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct VariableSpec {
    pub name: String,
    pub value: u32,
    #[serde(default = "default_fhe_type", rename = "type")]
    pub fhe_type: FheType,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct OperationSpec {
    pub name: String,
    /// Variable names, folded in this order.
    pub inputs: Vec<String>,
    pub kind: String,
}

fn default_operator() -> String {
    "did:fhe:operator".into()
}

fn default_oracle_seeds() -> Vec<String> {
    let mut seed = [0u8; 32];
    OsRng.fill_bytes(&mut seed);
    vec![hex::encode(seed)]
}

const fn default_fhe_type() -> FheType {
    FheType::Uint32
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.node.oracle_seeds.is_empty() {
            return Err(ConfigError::Validation(
                "at least one oracle seed must be configured".into(),
            ));
        }
        self.oracle_seeds()?;

        let mut names = BTreeSet::new();
        let mut variables = BTreeSet::new();
        for variable in &self.scenario.variables {
            if !names.insert(variable.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate scenario name `{}`",
                    variable.name
                )));
            }
            variables.insert(variable.name.as_str());
        }
        for operation in &self.scenario.operations {
            if !names.insert(operation.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate scenario name `{}`",
                    operation.name
                )));
            }
            operation
                .kind
                .parse::<OperationKind>()
                .map_err(|err| ConfigError::Validation(format!("{}: {err}", operation.name)))?;
            if let Some(missing) = operation
                .inputs
                .iter()
                .find(|input| !variables.contains(input.as_str()))
            {
                return Err(ConfigError::Validation(format!(
                    "operation `{}` references unknown variable `{missing}`",
                    operation.name
                )));
            }
        }
        if let Some(missing) = self
            .scenario
            .reveal
            .iter()
            .find(|name| !names.contains(name.as_str()))
        {
            return Err(ConfigError::Validation(format!(
                "reveal references unknown name `{missing}`"
            )));
        }
        Ok(())
    }

    pub fn oracle_seeds(&self) -> Result<Vec<[u8; 32]>, ConfigError> {
        self.node
            .oracle_seeds
            .iter()
            .map(|seed_hex| -> Result<[u8; 32], ConfigError> {
                let bytes = hex::decode(seed_hex).map_err(|_| {
                    ConfigError::Validation(format!("oracle seed `{seed_hex}` is not valid hex"))
                })?;
                bytes.try_into().map_err(|raw: Vec<u8>| {
                    ConfigError::Validation(format!(
                        "oracle seed must be 32 bytes, got {}",
                        raw.len()
                    ))
                })
            })
            .collect()
    }

    pub fn sample() -> Self {
        Self {
            node: NodeSection {
                operator: default_operator(),
                oracle_seeds: vec!["11".repeat(32)],
            },
            ledger: LedgerSection::default(),
            oracle: OracleSection::default(),
            scenario: ScenarioSection {
                variables: vec![
                    VariableSpec {
                        name: "A".into(),
                        value: 10,
                        fhe_type: FheType::Uint32,
                    },
                    VariableSpec {
                        name: "B".into(),
                        value: 20,
                        fhe_type: FheType::Uint32,
                    },
                ],
                operations: vec![OperationSpec {
                    name: "product".into(),
                    inputs: vec!["A".into(), "B".into()],
                    kind: "multiply".into(),
                }],
                reveal: Vec::new(),
                reverse_fulfilment: false,
            },
        }
    }
}

pub fn load_config(path: &Path, format: ConfigFormat) -> Result<Config, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let format = resolve_format(path, format);
    let config = parse_config(&contents, format)?;
    config.validate()?;
    Ok(config)
}

pub fn parse_config(contents: &str, format: ConfigFormat) -> Result<Config, ConfigError> {
    match format {
        ConfigFormat::Yaml => serde_yaml::from_str(contents).map_err(|err| ConfigError::Parse {
            format,
            details: err.to_string(),
        }),
        ConfigFormat::Toml | ConfigFormat::Auto => {
            toml::from_str(contents).map_err(|err| ConfigError::Parse {
                format: ConfigFormat::Toml,
                details: err.to_string(),
            })
        }
    }
}

fn resolve_format(path: &Path, format: ConfigFormat) -> ConfigFormat {
    match format {
        ConfigFormat::Auto => match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => ConfigFormat::Yaml,
            _ => ConfigFormat::Toml,
        },
        _ => format,
    }
}
