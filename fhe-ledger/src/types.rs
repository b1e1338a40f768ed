//! Identifiers, records, and transaction context shared across the ledger.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{LedgerError, LedgerResult};

/// Identifier of an encrypted variable. Assigned from 1 upwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VariableId(pub u64);

impl fmt::Display for VariableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "var:{}", self.0)
    }
}

/// Identifier of an encrypted operation result, drawn from its own counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OperationId(pub u64);

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op:{}", self.0)
    }
}

/// Oracle-assigned identifier of a decryption request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req:{}", self.0)
    }
}

/// Logical identifier that names either a variable or an operation.
///
/// The textual form is `var:<n>` or `op:<n>`; it is what crosses config files
/// and logs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TargetId {
    Variable(VariableId),
    Operation(OperationId),
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetId::Variable(id) => id.fmt(f),
            TargetId::Operation(id) => id.fmt(f),
        }
    }
}

impl FromStr for TargetId {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, raw) = s
            .split_once(':')
            .ok_or_else(|| LedgerError::InvalidInput(format!("malformed target id `{s}`")))?;
        let id: u64 = raw
            .parse()
            .map_err(|_| LedgerError::InvalidInput(format!("malformed target id `{s}`")))?;
        match prefix {
            "var" => Ok(TargetId::Variable(VariableId(id))),
            "op" => Ok(TargetId::Operation(OperationId(id))),
            _ => Err(LedgerError::InvalidInput(format!(
                "unknown target prefix `{prefix}`"
            ))),
        }
    }
}

impl TryFrom<String> for TargetId {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TargetId> for String {
    fn from(value: TargetId) -> Self {
        value.to_string()
    }
}

impl From<VariableId> for TargetId {
    fn from(value: VariableId) -> Self {
        TargetId::Variable(value)
    }
}

impl From<OperationId> for TargetId {
    fn from(value: OperationId) -> Self {
        TargetId::Operation(value)
    }
}

/// Caller identity as presented by the hosting ledger.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(pub String);

impl Address {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Per-transaction context supplied by the host with every mutating call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxContext {
    pub caller: Address,
    pub now_ms: u64,
}

impl TxContext {
    pub fn new(caller: impl Into<String>, now_ms: u64) -> Self {
        Self {
            caller: Address::new(caller),
            now_ms,
        }
    }
}

/// Opaque reference to an encrypted value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CiphertextHandle(pub [u8; 32]);

impl CiphertextHandle {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for CiphertextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Encrypted integer type discriminator carried (encrypted) in `type_tag`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FheType {
    Bool,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
}

impl FheType {
    pub const fn code(self) -> u8 {
        match self {
            FheType::Bool => 0,
            FheType::Uint8 => 2,
            FheType::Uint16 => 3,
            FheType::Uint32 => 4,
            FheType::Uint64 => 5,
        }
    }
}

/// Homomorphic operator applied when folding an operation's inputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Add,
    Multiply,
    Subtract,
}

impl OperationKind {
    pub const fn code(self) -> u8 {
        match self {
            OperationKind::Add => 0,
            OperationKind::Multiply => 1,
            OperationKind::Subtract => 2,
        }
    }

    /// Decode a wire-level operation tag. Unknown tags are rejected.
    pub fn from_code(code: u8) -> LedgerResult<Self> {
        match code {
            0 => Ok(OperationKind::Add),
            1 => Ok(OperationKind::Multiply),
            2 => Ok(OperationKind::Subtract),
            other => Err(LedgerError::InvalidInput(format!(
                "unrecognized operation kind {other}"
            ))),
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            OperationKind::Add => "add",
            OperationKind::Multiply => "multiply",
            OperationKind::Subtract => "subtract",
        }
    }
}

impl FromStr for OperationKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "add" => Ok(OperationKind::Add),
            "multiply" | "mul" => Ok(OperationKind::Multiply),
            "subtract" | "sub" => Ok(OperationKind::Subtract),
            _ => Err(LedgerError::InvalidInput(format!(
                "unrecognized operation kind `{s}`"
            ))),
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored encrypted variable. Never mutated after creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedVariable {
    pub id: VariableId,
    pub value: CiphertextHandle,
    pub type_tag: CiphertextHandle,
    pub name: String,
    pub owner: Address,
    pub created_at_ms: u64,
}

/// Stored result of folding `input_ids` with `kind`, in the given order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedOperation {
    pub id: OperationId,
    pub result: CiphertextHandle,
    pub input_ids: Vec<VariableId>,
    pub kind: OperationKind,
    pub owner: Address,
    pub created_at_ms: u64,
}

/// Revealed cleartext for a target. The default value means "never decrypted".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptedResult {
    pub value: u32,
    pub revealed: bool,
}
