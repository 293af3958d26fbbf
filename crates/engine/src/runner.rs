use thiserror::Error;
use tracing::{debug, info, info_span, warn};

use planledger_core::{RunId, StoreError};
use planledger_store::{Store, StoreHandle};

use crate::config::EngineConfig;
use crate::extract::{ExtractError, extract_with};
use crate::result::{ExecutionResult, Outcome};
use crate::sandbox;

/// Lifecycle of a single run.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Extracting,
    Executing,
    Succeeded,
    ContractViolation,
    Faulted,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Phase::Succeeded | Phase::ContractViolation | Phase::Faulted
        )
    }
}

impl From<&Outcome> for Phase {
    fn from(value: &Outcome) -> Self {
        match value {
            Outcome::Succeeded { .. } => Phase::Succeeded,
            Outcome::ContractViolation { .. } => Phase::ContractViolation,
            Outcome::Faulted => Phase::Faulted,
        }
    }
}

/// Failure to run at all against a shared store.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Extracts, executes and records plan runs with one configuration.
#[derive(Debug, Clone, Default)]
pub struct PlanRunner {
    config: EngineConfig,
}

impl PlanRunner {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run the plan in `plan_text` for `request` against `store`.
    ///
    /// Only extraction failures are errors; everything that happens once the
    /// plan starts is reported in the returned [`ExecutionResult`].
    pub fn run(
        &self,
        plan_text: &str,
        store: &mut Store,
        request: &str,
    ) -> Result<ExecutionResult, ExtractError> {
        let run_id = RunId::new();
        let span = info_span!("plan_run", %run_id, request_len = request.len());
        let _guard = span.enter();

        let mut phase = Phase::Idle;
        advance(&mut phase, Phase::Extracting);
        let code = extract_with(plan_text, self.config.multi_block).inspect_err(|e| {
            warn!(error = %e, "plan extraction failed");
        })?;

        advance(&mut phase, Phase::Executing);
        let inventory_before = store.items().to_vec();
        let ledger_before = store.entries().to_vec();

        let exec = sandbox::execute(&code, store, request, &self.config.sandbox);

        advance(&mut phase, Phase::from(&exec.outcome));
        info!(
            phase = ?phase,
            status = exec.answer.status.as_deref().unwrap_or("-"),
            operations = exec.operations,
            committed = exec.committed,
            "plan run finished"
        );
        if let Some(fault) = &exec.fault {
            info!(kind = ?fault.kind, fault = %fault, "plan faulted");
        }

        Ok(ExecutionResult {
            run_id,
            code,
            stdout: exec.stdout,
            fault: exec.fault,
            outcome: exec.outcome,
            answer_text: exec.answer.text,
            status: exec.answer.status,
            answer_rows: exec.answer.rows,
            answer_json: exec.answer.json,
            committed: exec.committed,
            inventory_before,
            inventory_after: store.items().to_vec(),
            ledger_before,
            ledger_after: store.entries().to_vec(),
        })
    }

    /// [`run`](Self::run) while holding the handle's store exclusively.
    pub fn run_shared(
        &self,
        plan_text: &str,
        handle: &StoreHandle,
        request: &str,
    ) -> Result<ExecutionResult, RunError> {
        Ok(handle.with_exclusive(|store| self.run(plan_text, store, request))??)
    }
}

fn advance(phase: &mut Phase, next: Phase) {
    debug!(from = ?*phase, to = ?next, "phase");
    *phase = next;
}

/// Run with the default configuration.
pub fn run(plan_text: &str, store: &mut Store, request: &str) -> Result<ExecutionResult, ExtractError> {
    PlanRunner::default().run(plan_text, store, request)
}
