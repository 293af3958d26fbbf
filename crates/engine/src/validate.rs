//! Static checks run on a parsed plan before any step executes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::plan::{
    Amount, AmountExpr, AnswerSpec, Check, Filter, Intent, ItemRef, Plan, Quantity, QuantityExpr,
    Segment, Step, Template,
};

/// Names plans may not bind: they are placeholders or answer slots.
pub const RESERVED_NAMES: &[&str] = &[
    "request",
    "balance",
    "current_balance",
    "next_id",
    "inventory",
    "ledger",
    "answer_text",
    "answer_rows",
    "answer_json",
    "status",
];

/// Fields a row binding exposes to templates.
pub const ROW_FIELDS: &[&str] = &[
    "count",
    "names",
    "name",
    "item_id",
    "description",
    "price",
    "quantity_in_stock",
];

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Total steps, counting nested ones.
    pub max_plan_steps: usize,
    pub max_nesting: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_plan_steps: 256,
            max_nesting: 4,
        }
    }
}

/// One rejected construct, located by a path such as `steps[2].for_each[0].text`.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{path}: {message}")]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Kind {
    Rows,
    Money,
}

impl Kind {
    fn label(self) -> &'static str {
        match self {
            Kind::Rows => "row binding",
            Kind::Money => "money variable",
        }
    }
}

type Scope = HashMap<String, Kind>;

/// Check `plan` against the language rules; every problem found is reported.
pub fn validate(plan: &Plan, limits: &Limits) -> Result<(), Vec<ValidationError>> {
    let mut v = Validator {
        limits: *limits,
        errors: Vec::new(),
    };

    if plan.steps.is_empty() {
        v.error("steps", "plan has no steps");
    }

    let total = count_steps(&plan.steps);
    if total > limits.max_plan_steps {
        v.error(
            "steps",
            format!("plan has {total} steps, limit is {}", limits.max_plan_steps),
        );
    }

    if plan.intent == Some(Intent::Read) && plan.mutates() {
        v.error("intent", "read plan contains mutating steps");
    }

    let mut scope = Scope::new();
    v.steps(&plan.steps, "steps", 0, &mut scope);

    if v.errors.is_empty() {
        Ok(())
    } else {
        Err(v.errors)
    }
}

fn count_steps(steps: &[Step]) -> usize {
    steps
        .iter()
        .map(|s| match s {
            Step::ForEach { steps, .. } => 1 + count_steps(steps),
            _ => 1,
        })
        .sum()
}

struct Validator {
    limits: Limits,
    errors: Vec<ValidationError>,
}

impl Validator {
    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn steps(&mut self, steps: &[Step], base: &str, depth: usize, scope: &mut Scope) {
        for (i, step) in steps.iter().enumerate() {
            let path = format!("{base}[{i}]");
            self.step(step, &path, depth, scope);
        }
    }

    fn step(&mut self, step: &Step, path: &str, depth: usize, scope: &mut Scope) {
        match step {
            Step::Find { bind, filter } => {
                self.filter(filter, &format!("{path}.where"));
                self.define(bind, Kind::Rows, &format!("{path}.bind"), scope);
            }
            Step::LineTotal {
                bind,
                item,
                quantity,
            } => {
                self.item_ref(item, &format!("{path}.item"), scope);
                self.quantity(quantity, &format!("{path}.quantity"));
                self.define(bind, Kind::Money, &format!("{path}.bind"), scope);
            }
            Step::AdjustStock { item, delta } => {
                self.item_ref(item, &format!("{path}.item"), scope);
                self.quantity(delta, &format!("{path}.delta"));
            }
            Step::AppendEntry {
                customer,
                summary,
                amount,
                prefix,
            } => {
                if customer.as_str().trim().is_empty() {
                    self.error(format!("{path}.customer"), "customer cannot be empty");
                }
                self.template(customer, &format!("{path}.customer"), scope);
                self.template(summary, &format!("{path}.summary"), scope);
                self.amount(amount, &format!("{path}.amount"), scope);
                if prefix.trim().is_empty() {
                    self.error(format!("{path}.prefix"), "prefix cannot be empty");
                } else if !prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
                    self.error(
                        format!("{path}.prefix"),
                        format!("prefix {prefix:?} may only contain letters, digits, '-' and '_'"),
                    );
                }
            }
            Step::Require { check, otherwise } => {
                self.check(check, &format!("{path}.check"), scope);
                self.answer(otherwise, &format!("{path}.otherwise"), scope);
            }
            Step::ForEach { bind, alias, steps } => {
                self.expect(bind, Kind::Rows, &format!("{path}.bind"), scope);
                if depth + 1 > self.limits.max_nesting {
                    self.error(
                        path,
                        format!("for_each nested deeper than {}", self.limits.max_nesting),
                    );
                }
                if steps.is_empty() {
                    self.error(format!("{path}.steps"), "for_each has no steps");
                }
                let alias_path = format!("{path}.as");
                if self.name(alias, &alias_path) && scope.contains_key(alias) {
                    self.error(alias_path, format!("{alias:?} shadows an existing binding"));
                }

                // Names bound in the body stay local to it.
                let mut inner = scope.clone();
                inner.insert(alias.clone(), Kind::Rows);
                self.steps(steps, &format!("{path}.for_each"), depth + 1, &mut inner);
            }
            Step::Print { text } => self.template(text, &format!("{path}.text"), scope),
            Step::Answer(spec) => self.answer(spec, path, scope),
            Step::Fail { message } => self.template(message, &format!("{path}.message"), scope),
            Step::Stop => {}
        }
    }

    /// Validate a binding name; returns whether it is well formed.
    fn name(&mut self, name: &str, path: &str) -> bool {
        let mut chars = name.chars();
        let well_formed = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !well_formed {
            self.error(path, format!("{name:?} is not a valid binding name"));
            return false;
        }
        if RESERVED_NAMES.contains(&name) {
            self.error(path, format!("{name:?} is reserved"));
            return false;
        }
        true
    }

    fn define(&mut self, name: &str, kind: Kind, path: &str, scope: &mut Scope) {
        if !self.name(name, path) {
            return;
        }
        match scope.get(name) {
            Some(existing) if *existing != kind => self.error(
                path,
                format!(
                    "{name:?} is already a {}, cannot rebind as a {}",
                    existing.label(),
                    kind.label()
                ),
            ),
            _ => {
                scope.insert(name.to_string(), kind);
            }
        }
    }

    fn expect(&mut self, name: &str, kind: Kind, path: &str, scope: &Scope) {
        match scope.get(name) {
            None => self.error(path, format!("undefined {} {name:?}", kind.label())),
            Some(found) if *found != kind => self.error(
                path,
                format!("{name:?} is a {}, expected a {}", found.label(), kind.label()),
            ),
            Some(_) => {}
        }
    }

    fn item_ref(&mut self, item: &ItemRef, path: &str, scope: &Scope) {
        match item {
            ItemRef::Id(id) if id.trim().is_empty() => self.error(path, "item id cannot be empty"),
            ItemRef::Id(_) => {}
            ItemRef::First(bind) | ItemRef::At { bind, .. } => {
                self.expect(bind, Kind::Rows, path, scope)
            }
        }
    }

    fn quantity(&mut self, quantity: &Quantity, path: &str) {
        match quantity {
            Quantity::Literal(_) => {}
            Quantity::Expr(QuantityExpr::FromRequest(keyword)) => {
                if keyword.trim().is_empty() {
                    self.error(path, "from_request keyword cannot be empty");
                }
            }
            Quantity::Expr(QuantityExpr::Neg(inner)) => self.quantity(inner, path),
        }
    }

    fn amount(&mut self, amount: &Amount, path: &str, scope: &Scope) {
        match amount {
            Amount::Literal(_) => {}
            Amount::Expr(AmountExpr::Var(name)) => self.expect(name, Kind::Money, path, scope),
            Amount::Expr(AmountExpr::LineTotal { item, quantity }) => {
                self.item_ref(item, &format!("{path}.item"), scope);
                self.quantity(quantity, &format!("{path}.quantity"));
            }
            Amount::Expr(AmountExpr::Neg(inner)) => self.amount(inner, path, scope),
        }
    }

    fn check(&mut self, check: &Check, path: &str, scope: &Scope) {
        match check {
            Check::Matched(bind) => self.expect(bind, Kind::Rows, path, scope),
            Check::Not(inner) => self.check(inner, path, scope),
            Check::All(checks) | Check::Any(checks) => {
                for (i, c) in checks.iter().enumerate() {
                    self.check(c, &format!("{path}[{i}]"), scope);
                }
            }
            Check::StockAtLeast { item, quantity } => {
                self.item_ref(item, &format!("{path}.item"), scope);
                self.quantity(quantity, &format!("{path}.quantity"));
            }
            Check::RequestMentions(word) | Check::QuantityInRequest(word) => {
                if word.trim().is_empty() {
                    self.error(path, "keyword cannot be empty");
                }
            }
            Check::BalanceAtLeast(amount) => self.amount(amount, path, scope),
        }
    }

    fn filter(&mut self, filter: &Filter, path: &str) {
        match filter {
            Filter::All(filters) | Filter::Any(filters) => {
                for (i, f) in filters.iter().enumerate() {
                    self.filter(f, &format!("{path}[{i}]"));
                }
            }
            Filter::Not(inner) => self.filter(inner, path),
            Filter::ItemId(s) | Filter::NameIs(s) | Filter::NameContains(s) | Filter::Mentions(s) => {
                if s.trim().is_empty() {
                    self.error(path, "filter text cannot be empty");
                }
            }
            _ => {}
        }
    }

    fn answer(&mut self, spec: &AnswerSpec, path: &str, scope: &Scope) {
        if let Some(text) = &spec.text {
            self.template(text, &format!("{path}.text"), scope);
        }
        if let Some(rows) = &spec.rows {
            self.expect(rows, Kind::Rows, &format!("{path}.rows"), scope);
        }
    }

    fn template(&mut self, template: &Template, path: &str, scope: &Scope) {
        let segments = match template.segments() {
            Ok(s) => s,
            Err(e) => {
                self.error(path, e.to_string());
                return;
            }
        };
        for segment in segments {
            let Segment::Placeholder { name, field } = segment else {
                continue;
            };
            match (name, field, scope.get(name)) {
                ("request" | "balance", None, _) => {}
                (_, None, Some(Kind::Money)) => {}
                (_, Some(f), Some(Kind::Rows)) if ROW_FIELDS.contains(&f) => {}
                (_, Some(f), Some(Kind::Rows)) => {
                    self.error(path, format!("unknown field {f:?} in {{{name}.{f}}}"))
                }
                (_, None, Some(Kind::Rows)) => self.error(
                    path,
                    format!("row binding {{{name}}} needs a field, e.g. {{{name}.names}}"),
                ),
                _ => self.error(path, format!("unknown placeholder {{{}}}", placeholder(name, field))),
            }
        }
    }
}

fn placeholder(name: &str, field: Option<&str>) -> String {
    match field {
        Some(f) => format!("{name}.{f}"),
        None => name.to_string(),
    }
}
