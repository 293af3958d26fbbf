//! Plan interpreter.
//!
//! Runs a validated [`Plan`] against a [`Store`] under an operation budget and
//! a wall-clock budget. The only capabilities a plan has are the instructions
//! in [`crate::plan`]: inventory lookups, stock adjustments, ledger appends,
//! the read-only request text, and the answer slots.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use planledger_accounting::NewLedgerEntry;
use planledger_core::{Money, StoreError};
use planledger_inventory::{InventoryItem, ItemId};
use planledger_store::Store;

use crate::plan::{
    Amount, AmountExpr, AnswerSpec, Check, ItemRef, Plan, Quantity, QuantityExpr, Segment, Step,
    Template,
};
use crate::request;
use crate::result::{AnswerSlots, ContractBreach, Fault, FaultKind, Outcome, PlanStatus};
use crate::validate::{self, Limits};

pub const TRUNCATION_MARKER: &str = "[output truncated]";

/// Where a run's mutations go.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitMode {
    /// Run against a private copy; keep it when the run ends with any
    /// business status. Faults and contract breaches discard it.
    #[default]
    Staged,
    /// Mutate the live store step by step. Partial mutations survive faults.
    Direct,
}

impl core::str::FromStr for CommitMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "staged" => Ok(Self::Staged),
            "direct" => Ok(Self::Direct),
            other => Err(format!("unknown commit mode: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxConfig {
    /// Executed steps, counting every loop iteration.
    pub max_operations: u64,
    pub timeout: Duration,
    pub max_output_bytes: usize,
    pub max_plan_steps: usize,
    pub commit_mode: CommitMode,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            max_operations: 10_000,
            timeout: Duration::from_secs(2),
            max_output_bytes: 64 * 1024,
            max_plan_steps: 256,
            commit_mode: CommitMode::Staged,
        }
    }
}

impl SandboxConfig {
    pub fn limits(&self) -> Limits {
        Limits {
            max_plan_steps: self.max_plan_steps,
            ..Limits::default()
        }
    }
}

/// Everything the interpreter observed during one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    pub outcome: Outcome,
    pub fault: Option<Fault>,
    pub answer: AnswerSlots,
    pub stdout: String,
    pub committed: bool,
    pub operations: u64,
}

impl Execution {
    fn faulted(fault: Fault) -> Self {
        Self {
            outcome: Outcome::Faulted,
            fault: Some(fault),
            answer: AnswerSlots::default(),
            stdout: String::new(),
            committed: false,
            operations: 0,
        }
    }
}

/// Parse, validate and run `code` for `request`.
///
/// Never panics on plan content: every failure becomes a [`Fault`] or a
/// contract breach in the returned [`Execution`].
pub fn execute(code: &str, store: &mut Store, request: &str, config: &SandboxConfig) -> Execution {
    let plan = match Plan::parse(code) {
        Ok(plan) => plan,
        Err(e) => return Execution::faulted(Fault::new(FaultKind::Malformed, e.to_string())),
    };

    if let Err(errors) = validate::validate(&plan, &config.limits()) {
        let message = errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        debug!(errors = errors.len(), "plan rejected");
        return Execution::faulted(Fault::new(FaultKind::Rejected, message));
    }

    match config.commit_mode {
        CommitMode::Direct => {
            let run = Interpreter::new(store, request, config).run(&plan);
            finish(run, true)
        }
        CommitMode::Staged => {
            let mut staged = store.clone();
            let run = Interpreter::new(&mut staged, request, config).run(&plan);
            let commit = matches!(settle(&run), Outcome::Succeeded { .. });
            if commit {
                *store = staged;
            } else if run.mutations > 0 {
                warn!(
                    mutations = run.mutations,
                    "discarding staged mutations of failed run"
                );
            }
            finish(run, commit)
        }
    }
}

struct Run {
    fault: Option<Fault>,
    answer: AnswerSlots,
    stdout: String,
    operations: u64,
    mutations: usize,
}

fn settle(run: &Run) -> Outcome {
    if run.fault.is_some() {
        return Outcome::Faulted;
    }
    let breach = if run.answer.text.is_none() {
        ContractBreach::MissingAnswer
    } else {
        match run.answer.status.as_deref() {
            None => ContractBreach::MissingStatus,
            Some(raw) => match raw.parse::<PlanStatus>() {
                Ok(status) => return Outcome::Succeeded { status },
                Err(breach) => breach,
            },
        }
    };
    Outcome::ContractViolation { breach }
}

fn finish(run: Run, committed: bool) -> Execution {
    Execution {
        outcome: settle(&run),
        fault: run.fault,
        answer: run.answer,
        stdout: run.stdout,
        committed,
        operations: run.operations,
    }
}

enum Flow {
    Continue,
    Stop,
}

type Eval<T> = Result<T, Fault>;

fn runtime(message: impl Into<String>) -> Fault {
    Fault::new(FaultKind::Runtime, message)
}

fn overflow(err: StoreError) -> Fault {
    runtime(err.to_string())
}

/// Captured `print` output, capped in bytes.
struct Output {
    buf: String,
    limit: usize,
    truncated: bool,
}

impl Output {
    fn new(limit: usize) -> Self {
        Self {
            buf: String::new(),
            limit,
            truncated: false,
        }
    }

    fn push_line(&mut self, line: &str) {
        if self.truncated {
            return;
        }
        if self.buf.len() + line.len() + 1 <= self.limit {
            self.buf.push_str(line);
            self.buf.push('\n');
            return;
        }

        let room = self.limit.saturating_sub(self.buf.len());
        let mut cut = room.min(line.len());
        while !line.is_char_boundary(cut) {
            cut -= 1;
        }
        self.buf.push_str(&line[..cut]);
        self.buf.push('\n');
        self.buf.push_str(TRUNCATION_MARKER);
        self.buf.push('\n');
        self.truncated = true;
        warn!(limit = self.limit, "plan output truncated");
    }
}

struct Interpreter<'a> {
    store: &'a mut Store,
    request: &'a str,
    config: &'a SandboxConfig,
    started: Instant,
    operations: u64,
    mutations: usize,
    rows: HashMap<String, Vec<ItemId>>,
    vars: HashMap<String, Money>,
    answer: AnswerSlots,
    output: Output,
    trace: Vec<String>,
}

impl<'a> Interpreter<'a> {
    fn new(store: &'a mut Store, request: &'a str, config: &'a SandboxConfig) -> Self {
        Self {
            store,
            request,
            config,
            started: Instant::now(),
            operations: 0,
            mutations: 0,
            rows: HashMap::new(),
            vars: HashMap::new(),
            answer: AnswerSlots::default(),
            output: Output::new(config.max_output_bytes),
            trace: Vec::new(),
        }
    }

    fn run(mut self, plan: &Plan) -> Run {
        let fault = match self.steps(&plan.steps, "steps") {
            Ok(_) => None,
            Err(fault) => Some(fault.with_trace(std::mem::take(&mut self.trace))),
        };
        Run {
            fault,
            answer: self.answer,
            stdout: self.output.buf,
            operations: self.operations,
            mutations: self.mutations,
        }
    }

    fn steps(&mut self, steps: &[Step], base: &str) -> Eval<Flow> {
        for (i, step) in steps.iter().enumerate() {
            let path = format!("{base}[{i}]");
            let flow = self.step(step, &path).map_err(|fault| match fault.step {
                Some(_) => fault,
                None => fault.at(path.clone()),
            })?;
            if let Flow::Stop = flow {
                return Ok(Flow::Stop);
            }
        }
        Ok(Flow::Continue)
    }

    fn tick(&mut self) -> Eval<()> {
        self.operations += 1;
        if self.operations > self.config.max_operations {
            warn!(max_operations = self.config.max_operations, "operation budget exhausted");
            return Err(Fault::new(
                FaultKind::Timeout,
                format!("operation budget of {} exhausted", self.config.max_operations),
            ));
        }
        if self.started.elapsed() > self.config.timeout {
            warn!(timeout_ms = self.config.timeout.as_millis() as u64, "wall-clock budget exhausted");
            return Err(Fault::new(
                FaultKind::Timeout,
                format!("time budget of {:?} exhausted", self.config.timeout),
            ));
        }
        Ok(())
    }

    fn step(&mut self, step: &Step, path: &str) -> Eval<Flow> {
        self.tick()?;
        debug!(step = path, op = step.op(), "executing step");
        self.trace.push(format!("{path} {}", step.op()));

        match step {
            Step::Find { bind, filter } => {
                let request = self.request;
                let ids = self
                    .store
                    .find(|item| filter.matches(item, request))
                    .into_iter()
                    .map(|item| item.item_id)
                    .collect();
                self.rows.insert(bind.clone(), ids);
            }
            Step::LineTotal {
                bind,
                item,
                quantity,
            } => {
                let total = self.line_total(item, quantity)?;
                self.vars.insert(bind.clone(), total);
            }
            Step::AdjustStock { item, delta } => {
                let id = self.resolve(item)?;
                let delta = self.quantity(delta)?;
                self.store
                    .adjust_stock(id.as_str(), delta)
                    .map_err(Fault::store)?;
                self.mutations += 1;
            }
            Step::AppendEntry {
                customer,
                summary,
                amount,
                prefix,
            } => {
                let customer = self.render(customer)?;
                if customer.trim().is_empty() {
                    return Err(runtime("customer rendered empty"));
                }
                let summary = self.render(summary)?;
                let amount = self.amount(amount)?;
                let id = self.store.next_id(prefix);
                self.store
                    .append_entry(NewLedgerEntry::new(id, customer, summary, amount))
                    .map_err(Fault::store)?;
                self.mutations += 1;
            }
            Step::Require { check, otherwise } => {
                if !self.check(check)? {
                    debug!(step = path, "requirement not met");
                    self.set_answer(otherwise)?;
                    return Ok(Flow::Stop);
                }
            }
            Step::ForEach { bind, alias, steps } => {
                let ids = self.rows_of(bind)?.to_vec();
                let body = format!("{path}.for_each");
                // Bindings made in the body are local to it.
                let outer_rows = self.rows.clone();
                let outer_vars = self.vars.clone();
                let mut flow = Flow::Continue;
                for id in ids {
                    self.rows.insert(alias.clone(), vec![id]);
                    if let Flow::Stop = self.steps(steps, &body)? {
                        flow = Flow::Stop;
                        break;
                    }
                }
                self.rows = outer_rows;
                self.vars = outer_vars;
                return Ok(flow);
            }
            Step::Print { text } => {
                let line = self.render(text)?;
                self.output.push_line(&line);
            }
            Step::Answer(spec) => self.set_answer(spec)?,
            Step::Fail { message } => {
                let message = self.render(message)?;
                return Err(Fault::new(FaultKind::Raised, message));
            }
            Step::Stop => return Ok(Flow::Stop),
        }
        Ok(Flow::Continue)
    }

    fn rows_of(&self, bind: &str) -> Eval<&[ItemId]> {
        self.rows
            .get(bind)
            .map(Vec::as_slice)
            .ok_or_else(|| runtime(format!("undefined row binding {bind:?}")))
    }

    fn item(&self, id: &ItemId) -> Eval<&InventoryItem> {
        self.store
            .item(id.as_str())
            .ok_or_else(|| Fault::store(StoreError::not_found(id.as_str())))
    }

    fn resolve(&self, item: &ItemRef) -> Eval<ItemId> {
        match item {
            ItemRef::Id(id) => {
                let id = ItemId::new(id.as_str());
                self.item(&id)?;
                Ok(id)
            }
            ItemRef::First(bind) => self
                .rows_of(bind)?
                .first()
                .cloned()
                .ok_or_else(|| runtime(format!("{bind:?} matched no items"))),
            ItemRef::At { bind, index } => {
                let rows = self.rows_of(bind)?;
                rows.get(*index).cloned().ok_or_else(|| {
                    runtime(format!("{bind:?} has {} rows, no index {index}", rows.len()))
                })
            }
        }
    }

    fn quantity(&self, quantity: &Quantity) -> Eval<i64> {
        match quantity {
            Quantity::Literal(n) => Ok(*n),
            Quantity::Expr(QuantityExpr::FromRequest(keyword)) => {
                request::quantity_for(self.request, keyword).ok_or_else(|| {
                    runtime(format!("no quantity for {keyword:?} in the request"))
                })
            }
            Quantity::Expr(QuantityExpr::Neg(inner)) => self
                .quantity(inner)?
                .checked_neg()
                .ok_or_else(|| runtime("quantity overflow")),
        }
    }

    fn line_total(&self, item: &ItemRef, quantity: &Quantity) -> Eval<Money> {
        let id = self.resolve(item)?;
        let quantity = self.quantity(quantity)?;
        self.item(&id)?.price.checked_mul(quantity).map_err(overflow)
    }

    fn amount(&self, amount: &Amount) -> Eval<Money> {
        match amount {
            Amount::Literal(m) => Ok(*m),
            Amount::Expr(AmountExpr::Var(name)) => self
                .vars
                .get(name)
                .copied()
                .ok_or_else(|| runtime(format!("undefined money variable {name:?}"))),
            Amount::Expr(AmountExpr::LineTotal { item, quantity }) => {
                self.line_total(item, quantity)
            }
            Amount::Expr(AmountExpr::Neg(inner)) => {
                self.amount(inner)?.checked_neg().map_err(overflow)
            }
        }
    }

    fn check(&self, check: &Check) -> Eval<bool> {
        Ok(match check {
            Check::Matched(bind) => !self.rows_of(bind)?.is_empty(),
            Check::Not(inner) => !self.check(inner)?,
            Check::All(checks) => {
                for c in checks {
                    if !self.check(c)? {
                        return Ok(false);
                    }
                }
                true
            }
            Check::Any(checks) => {
                for c in checks {
                    if self.check(c)? {
                        return Ok(true);
                    }
                }
                false
            }
            Check::StockAtLeast { item, quantity } => {
                let id = self.resolve(item)?;
                let wanted = self.quantity(quantity)?;
                self.item(&id)?.quantity_in_stock >= wanted
            }
            Check::RequestMentions(word) => request::mentions(self.request, word),
            Check::QuantityInRequest(keyword) => {
                request::quantity_for(self.request, keyword).is_some()
            }
            Check::BalanceAtLeast(amount) => self.store.current_balance() >= self.amount(amount)?,
        })
    }

    fn set_answer(&mut self, spec: &AnswerSpec) -> Eval<()> {
        if let Some(text) = &spec.text {
            self.answer.text = Some(self.render(text)?);
        }
        if let Some(status) = &spec.status {
            self.answer.status = Some(status.clone());
        }
        if let Some(bind) = &spec.rows {
            let items = self
                .rows_of(bind)?
                .iter()
                .map(|id| self.item(id).cloned())
                .collect::<Eval<Vec<_>>>()?;
            self.answer.rows = Some(items);
        }
        if let Some(json) = &spec.json {
            self.answer.json = Some(json.clone());
        }
        Ok(())
    }

    fn render(&self, template: &Template) -> Eval<String> {
        let segments = template.segments().map_err(|e| runtime(e.to_string()))?;
        let mut out = String::with_capacity(template.as_str().len());
        for segment in segments {
            match segment {
                Segment::Text(t) => out.push_str(t),
                Segment::Brace(c) => out.push(c),
                Segment::Placeholder { name, field } => {
                    out.push_str(&self.placeholder(name, field)?);
                }
            }
        }
        Ok(out)
    }

    fn placeholder(&self, name: &str, field: Option<&str>) -> Eval<String> {
        match (name, field) {
            ("request", None) => return Ok(self.request.to_string()),
            ("balance", None) => return Ok(self.store.current_balance().to_string()),
            (_, None) => {
                if let Some(m) = self.vars.get(name) {
                    return Ok(m.to_string());
                }
            }
            _ => {}
        }

        let Some(field) = field else {
            return Err(runtime(format!("unknown placeholder {{{name}}}")));
        };
        let rows = self.rows_of(name)?;
        match field {
            "count" => return Ok(rows.len().to_string()),
            "names" => {
                let names = rows
                    .iter()
                    .map(|id| self.item(id).map(|i| i.name.clone()))
                    .collect::<Eval<Vec<_>>>()?;
                return Ok(names.join(", "));
            }
            _ => {}
        }

        let first = rows
            .first()
            .ok_or_else(|| runtime(format!("{{{name}.{field}}} used but {name:?} matched no items")))?;
        let item = self.item(first)?;
        Ok(match field {
            "name" => item.name.clone(),
            "item_id" => item.item_id.to_string(),
            "description" => item.description.clone(),
            "price" => item.price.to_string(),
            "quantity_in_stock" => item.quantity_in_stock.to_string(),
            other => return Err(runtime(format!("unknown field {other:?} in {{{name}.{other}}}"))),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Store {
        let mut store = Store::new();
        for (id, name, desc, stock, cents) in [
            ("SG001", "Aviator", "Original aviator with a metal frame", 23, 8000),
            ("SG005", "Classic", "Classic round profile with metal frames", 10, 6000),
            ("SG007", "Moon", "Oversized round lenses", 0, 12000),
        ] {
            store
                .insert_item(InventoryItem::new(id, name, desc, stock, Money::from_cents(cents)).unwrap())
                .unwrap();
        }
        store.open_ledger(Money::from_cents(50_000)).unwrap();
        store
    }

    fn run(code: &str, store: &mut Store, request: &str) -> Execution {
        execute(code, store, request, &SandboxConfig::default())
    }

    #[test]
    fn malformed_and_rejected_plans_never_touch_the_store() {
        let mut s = store();
        let before = s.snapshot();

        let exec = run("print('hi')", &mut s, "");
        assert_eq!(exec.fault.as_ref().map(|f| f.kind), Some(FaultKind::Malformed));
        assert_eq!(exec.outcome, Outcome::Faulted);

        let exec = run(r#"{"steps": [{"op": "print", "text": "{secret}"}]}"#, &mut s, "");
        let fault = exec.fault.unwrap();
        assert_eq!(fault.kind, FaultKind::Rejected);
        assert!(fault.message.contains("unknown placeholder {secret}"));

        assert_eq!(s.snapshot(), before);
    }

    #[test]
    fn templates_render_rows_vars_and_balance() {
        let mut s = store();
        let exec = run(
            r#"{"steps": [
                {"op": "find", "bind": "round", "where": {"all": [{"mentions": "round"}, "in_stock"]}},
                {"op": "line_total", "bind": "pair", "item": {"first": "round"}, "quantity": 2},
                {"op": "print", "text": "{round.count} match: {round.names}"},
                {"op": "answer", "status": "success", "rows": "round",
                 "text": "{round.name} ({round.item_id}) is ${round.price}; two cost ${pair}. Balance ${balance}. {{ok}}"}
            ]}"#,
            &mut s,
            "round frames?",
        );
        assert_eq!(exec.fault, None);
        assert_eq!(exec.stdout, "1 match: Classic\n");
        assert_eq!(
            exec.answer.text.as_deref(),
            Some("Classic (SG005) is $60.00; two cost $120.00. Balance $500.00. {ok}")
        );
        assert_eq!(exec.answer.rows.as_ref().map(Vec::len), Some(1));
        assert_eq!(
            exec.outcome,
            Outcome::Succeeded {
                status: PlanStatus::Success
            }
        );
    }

    #[test]
    fn require_sets_otherwise_answer_and_stops() {
        let mut s = store();
        let exec = run(
            r#"{"steps": [
                {"op": "find", "bind": "moon", "where": {"name_is": "moon"}},
                {"op": "require", "check": {"stock_at_least": {"item": {"first": "moon"}, "quantity": 1}},
                 "otherwise": {"status": "insufficient_stock", "text": "Only {moon.quantity_in_stock} left."}},
                {"op": "adjust_stock", "item": {"first": "moon"}, "delta": -1}
            ]}"#,
            &mut s,
            "",
        );
        assert_eq!(exec.answer.text.as_deref(), Some("Only 0 left."));
        assert_eq!(
            exec.outcome,
            Outcome::Succeeded {
                status: PlanStatus::InsufficientStock
            }
        );
        assert!(exec.committed);
        assert_eq!(s.item("SG007").unwrap().quantity_in_stock, 0);
    }

    #[test]
    fn contract_breaches() {
        let mut s = store();
        let missing_answer = run(r#"{"steps": [{"op": "answer", "status": "success"}]}"#, &mut s, "");
        assert_eq!(
            missing_answer.outcome,
            Outcome::ContractViolation {
                breach: ContractBreach::MissingAnswer
            }
        );

        let missing_status = run(r#"{"steps": [{"op": "answer", "text": ""}]}"#, &mut s, "");
        assert_eq!(
            missing_status.outcome,
            Outcome::ContractViolation {
                breach: ContractBreach::MissingStatus
            }
        );

        let unknown = run(r#"{"steps": [{"op": "answer", "text": "x", "status": "done"}]}"#, &mut s, "");
        assert_eq!(
            unknown.outcome,
            Outcome::ContractViolation {
                breach: ContractBreach::UnknownStatus("done".into())
            }
        );
    }

    #[test]
    fn store_violation_becomes_store_fault_with_trace() {
        let mut s = store();
        let exec = run(
            r#"{"steps": [
                {"op": "print", "text": "start"},
                {"op": "adjust_stock", "item": {"id": "SG005"}, "delta": -11},
                {"op": "answer", "status": "success", "text": "never"}
            ]}"#,
            &mut s,
            "",
        );
        let fault = exec.fault.unwrap();
        assert_eq!(fault.kind, FaultKind::Store);
        assert_eq!(fault.step.as_deref(), Some("steps[1]"));
        assert_eq!(fault.trace, vec!["steps[0] print", "steps[1] adjust_stock"]);
        assert!(matches!(
            fault.violation,
            Some(StoreError::InvalidAdjustment { available: 10, delta: -11, .. })
        ));
        assert_eq!(exec.answer.text, None);
        assert_eq!(exec.stdout, "start\n");
    }

    #[test]
    fn fail_raises_with_rendered_message() {
        let mut s = store();
        let exec = run(
            r#"{"steps": [{"op": "fail", "message": "cannot handle: {request}"}]}"#,
            &mut s,
            "fly me to the moon",
        );
        let fault = exec.fault.unwrap();
        assert_eq!(fault.kind, FaultKind::Raised);
        assert_eq!(fault.message, "cannot handle: fly me to the moon");
    }

    #[test]
    fn staged_mode_commits_business_outcomes() {
        let plan = |status: &str| {
            format!(
                r#"{{"steps": [
                    {{"op": "adjust_stock", "item": {{"id": "SG001"}}, "delta": 2}},
                    {{"op": "answer", "status": "{status}", "text": "done"}}
                ]}}"#
            )
        };

        let mut s = store();
        let exec = run(&plan("no_match"), &mut s, "");
        assert!(exec.committed);
        assert_eq!(s.item("SG001").unwrap().quantity_in_stock, 25);

        let exec = run(&plan("success"), &mut s, "");
        assert!(exec.committed);
        assert_eq!(s.item("SG001").unwrap().quantity_in_stock, 27);
    }

    #[test]
    fn staged_mode_discards_contract_breaches() {
        let mut s = store();
        let exec = run(
            r#"{"steps": [
                {"op": "adjust_stock", "item": {"id": "SG001"}, "delta": 2},
                {"op": "answer", "status": "refunded", "text": "done"}
            ]}"#,
            &mut s,
            "",
        );
        assert!(matches!(exec.outcome, Outcome::ContractViolation { .. }));
        assert!(!exec.committed);
        assert_eq!(s.item("SG001").unwrap().quantity_in_stock, 23);
    }

    #[test]
    fn loop_body_bindings_do_not_leak() {
        let mut s = store();
        let exec = run(
            r#"{"steps": [
                {"op": "find", "bind": "pick", "where": {"name_is": "Aviator"}},
                {"op": "find", "bind": "all"},
                {"op": "for_each", "bind": "all", "as": "row", "steps": [
                    {"op": "find", "bind": "pick", "where": {"item_id": "SG005"}}
                ]},
                {"op": "answer", "status": "success", "text": "{pick.name}"}
            ]}"#,
            &mut s,
            "",
        );
        assert_eq!(exec.fault, None);
        assert_eq!(exec.answer.text.as_deref(), Some("Aviator"));
    }

    #[test]
    fn direct_mode_keeps_partial_mutations() {
        let mut s = store();
        let config = SandboxConfig {
            commit_mode: CommitMode::Direct,
            ..SandboxConfig::default()
        };
        let exec = execute(
            r#"{"steps": [
                {"op": "adjust_stock", "item": {"id": "SG001"}, "delta": -1},
                {"op": "adjust_stock", "item": {"id": "SG404"}, "delta": -1}
            ]}"#,
            &mut s,
            "",
            &config,
        );
        assert_eq!(exec.outcome, Outcome::Faulted);
        assert!(exec.committed);
        assert_eq!(s.item("SG001").unwrap().quantity_in_stock, 22);
    }

    #[test]
    fn operation_budget_times_out() {
        let mut s = store();
        let config = SandboxConfig {
            max_operations: 5,
            ..SandboxConfig::default()
        };
        let exec = execute(
            r#"{"steps": [
                {"op": "find", "bind": "all"},
                {"op": "for_each", "bind": "all", "as": "row", "steps": [
                    {"op": "print", "text": "{row.name}"},
                    {"op": "print", "text": "{row.price}"}
                ]},
                {"op": "answer", "status": "success", "text": "ok"}
            ]}"#,
            &mut s,
            "",
            &config,
        );
        let fault = exec.fault.unwrap();
        assert_eq!(fault.kind, FaultKind::Timeout);
        assert_eq!(fault.step.as_deref(), Some("steps[1].for_each[1]"));
        assert_eq!(exec.operations, 6);
    }

    #[test]
    fn wall_clock_budget_times_out() {
        let mut s = store();
        let config = SandboxConfig {
            timeout: Duration::ZERO,
            ..SandboxConfig::default()
        };
        let exec = execute(
            r#"{"steps": [
                {"op": "find", "bind": "all"},
                {"op": "for_each", "bind": "all", "as": "row", "steps": [
                    {"op": "print", "text": "{row.name}"}
                ]},
                {"op": "answer", "status": "success", "text": "ok"}
            ]}"#,
            &mut s,
            "",
            &config,
        );
        assert_eq!(exec.outcome, Outcome::Faulted);
        assert_eq!(exec.fault.map(|f| f.kind), Some(FaultKind::Timeout));
        assert!(!exec.committed);
    }

    #[test]
    fn output_is_truncated_with_marker() {
        let mut s = store();
        let config = SandboxConfig {
            max_output_bytes: 16,
            ..SandboxConfig::default()
        };
        let exec = execute(
            r#"{"steps": [
                {"op": "print", "text": "0123456789"},
                {"op": "print", "text": "abcdefghij"},
                {"op": "print", "text": "dropped"},
                {"op": "answer", "status": "success", "text": "ok"}
            ]}"#,
            &mut s,
            "",
            &config,
        );
        assert_eq!(exec.stdout, format!("0123456789\nabcde\n{TRUNCATION_MARKER}\n"));
    }

    #[test]
    fn quantity_from_request_drives_mutation() {
        let mut s = store();
        let exec = run(
            r#"{"steps": [
                {"op": "require", "check": {"quantity_in_request": "classic"},
                 "otherwise": {"status": "invalid_request", "text": "How many?"}},
                {"op": "adjust_stock", "item": {"id": "SG005"}, "delta": {"neg": {"from_request": "classic"}}},
                {"op": "answer", "status": "success", "text": "ok"}
            ]}"#,
            &mut s,
            "three classic please",
        );
        assert!(exec.committed);
        assert_eq!(s.item("SG005").unwrap().quantity_in_stock, 7);

        let exec = run(
            r#"{"steps": [
                {"op": "require", "check": {"quantity_in_request": "classic"},
                 "otherwise": {"status": "invalid_request", "text": "How many?"}},
                {"op": "answer", "status": "success", "text": "ok"}
            ]}"#,
            &mut s,
            "some classic please",
        );
        assert_eq!(exec.answer.text.as_deref(), Some("How many?"));
    }
}
