use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use planledger_accounting::LedgerEntry;
use planledger_core::{RunId, StoreError};
use planledger_inventory::{InventoryItem, ItemId};

/// Business status a plan reports for its request.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Success,
    NoMatch,
    InsufficientStock,
    InvalidRequest,
    UnsupportedIntent,
}

impl PlanStatus {
    pub const ALL: [PlanStatus; 5] = [
        PlanStatus::Success,
        PlanStatus::NoMatch,
        PlanStatus::InsufficientStock,
        PlanStatus::InvalidRequest,
        PlanStatus::UnsupportedIntent,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PlanStatus::Success => "success",
            PlanStatus::NoMatch => "no_match",
            PlanStatus::InsufficientStock => "insufficient_stock",
            PlanStatus::InvalidRequest => "invalid_request",
            PlanStatus::UnsupportedIntent => "unsupported_intent",
        }
    }
}

impl core::fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for PlanStatus {
    type Err = ContractBreach;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        PlanStatus::ALL
            .into_iter()
            .find(|st| st.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ContractBreach::UnknownStatus(s.to_string()))
    }
}

/// Overall status of a run, as shown to callers.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    NoMatch,
    InsufficientStock,
    InvalidRequest,
    UnsupportedIntent,
    ContractViolation,
    Faulted,
}

impl From<PlanStatus> for RunStatus {
    fn from(value: PlanStatus) -> Self {
        match value {
            PlanStatus::Success => RunStatus::Success,
            PlanStatus::NoMatch => RunStatus::NoMatch,
            PlanStatus::InsufficientStock => RunStatus::InsufficientStock,
            PlanStatus::InvalidRequest => RunStatus::InvalidRequest,
            PlanStatus::UnsupportedIntent => RunStatus::UnsupportedIntent,
        }
    }
}

/// A plan ran to completion without filling its mandatory answer slots.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ContractBreach {
    #[error("plan finished without setting answer_text")]
    MissingAnswer,

    #[error("plan finished without setting status")]
    MissingStatus,

    #[error("plan set unknown status {0:?}")]
    UnknownStatus(String),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// Plan body is not a valid plan document.
    Malformed,
    /// Plan failed static validation.
    Rejected,
    /// A store operation refused the mutation.
    Store,
    /// Evaluation error (bad reference, missing quantity, overflow...).
    Runtime,
    /// The plan executed `fail`.
    Raised,
    /// Operation or wall-clock budget exhausted.
    Timeout,
}

/// Why a run stopped abnormally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fault {
    pub kind: FaultKind,
    pub message: String,
    /// Path of the step that faulted, e.g. `steps[3]`.
    #[serde(default)]
    pub step: Option<String>,
    /// Steps executed before the fault, oldest first.
    #[serde(default)]
    pub trace: Vec<String>,
    /// The store violation behind a `Store` fault.
    #[serde(default)]
    pub violation: Option<StoreError>,
}

impl Fault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            step: None,
            trace: Vec::new(),
            violation: None,
        }
    }

    pub fn at(mut self, step: impl Into<String>) -> Self {
        self.step = Some(step.into());
        self
    }

    pub fn with_trace(mut self, trace: Vec<String>) -> Self {
        self.trace = trace;
        self
    }

    pub fn store(err: StoreError) -> Self {
        Self {
            kind: FaultKind::Store,
            message: err.to_string(),
            step: None,
            trace: Vec::new(),
            violation: Some(err),
        }
    }
}

impl core::fmt::Display for Fault {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match &self.step {
            Some(step) => write!(f, "{step}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Terminal state of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Outcome {
    Succeeded { status: PlanStatus },
    ContractViolation { breach: ContractBreach },
    Faulted,
}

/// Values a plan bound for the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnswerSlots {
    pub text: Option<String>,
    pub status: Option<String>,
    pub rows: Option<Vec<InventoryItem>>,
    pub json: Option<JsonValue>,
}

/// Audit record of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub run_id: RunId,
    /// Extracted plan body.
    pub code: String,
    /// Captured `print` output.
    pub stdout: String,
    pub fault: Option<Fault>,
    pub outcome: Outcome,
    pub answer_text: Option<String>,
    /// Status exactly as the plan set it.
    pub status: Option<String>,
    pub answer_rows: Option<Vec<InventoryItem>>,
    pub answer_json: Option<JsonValue>,
    /// Whether the run's mutations are in the store.
    pub committed: bool,
    pub inventory_before: Vec<InventoryItem>,
    pub inventory_after: Vec<InventoryItem>,
    pub ledger_before: Vec<LedgerEntry>,
    pub ledger_after: Vec<LedgerEntry>,
}

/// Quantity change of one item across a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockChange {
    pub item_id: ItemId,
    pub name: String,
    pub before: i64,
    pub after: i64,
}

impl StockChange {
    pub fn delta(&self) -> i64 {
        self.after - self.before
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreChanges {
    pub stock: Vec<StockChange>,
    pub appended: Vec<LedgerEntry>,
}

impl StoreChanges {
    pub fn is_empty(&self) -> bool {
        self.stock.is_empty() && self.appended.is_empty()
    }
}

impl ExecutionResult {
    pub fn status(&self) -> RunStatus {
        match &self.outcome {
            Outcome::Succeeded { status } => (*status).into(),
            Outcome::ContractViolation { .. } => RunStatus::ContractViolation,
            Outcome::Faulted => RunStatus::Faulted,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status() == RunStatus::Success
    }

    /// Text safe to show the customer.
    pub fn user_message(&self) -> String {
        if let Some(text) = self.answer_text.as_deref().filter(|t| !t.trim().is_empty()) {
            return text.to_string();
        }
        match self.outcome {
            Outcome::Faulted if self.changes().is_empty() => {
                "Sorry, something went wrong while handling your request. Nothing was charged."
                    .to_string()
            }
            Outcome::Faulted => "Sorry, something went wrong while handling your request. \
                 Part of it may already be recorded; please check with our staff."
                .to_string(),
            _ => "Sorry, I couldn't complete your request.".to_string(),
        }
    }

    /// Stock moves and appended ledger entries between the two snapshots.
    pub fn changes(&self) -> StoreChanges {
        let stock = self
            .inventory_after
            .iter()
            .filter_map(|after| {
                let before = self
                    .inventory_before
                    .iter()
                    .find(|b| b.item_id == after.item_id)?;
                (before.quantity_in_stock != after.quantity_in_stock).then(|| StockChange {
                    item_id: after.item_id.clone(),
                    name: after.name.clone(),
                    before: before.quantity_in_stock,
                    after: after.quantity_in_stock,
                })
            })
            .collect();

        let known: HashSet<&str> = self
            .ledger_before
            .iter()
            .map(|e| e.transaction_id.as_str())
            .collect();
        let appended = self
            .ledger_after
            .iter()
            .filter(|e| !known.contains(e.transaction_id.as_str()))
            .cloned()
            .collect();

        StoreChanges { stock, appended }
    }
}
