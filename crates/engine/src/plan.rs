//! The plan language.
//!
//! A plan is a JSON document with a closed set of instructions. It is parsed
//! into these types, checked by [`crate::validate`], and interpreted by
//! [`crate::sandbox`]. Nothing in the language can reach the filesystem,
//! network, process, or environment.
//!
//! ```json
//! {
//!   "intent": "mutate",
//!   "steps": [
//!     {"op": "find", "bind": "aviators", "where": {"name_is": "Aviator"}},
//!     {"op": "require", "check": {"matched": "aviators"},
//!      "otherwise": {"status": "no_match", "text": "We don't carry Aviators."}},
//!     {"op": "line_total", "bind": "refund", "item": {"first": "aviators"}, "quantity": 2},
//!     {"op": "adjust_stock", "item": {"first": "aviators"}, "delta": 2},
//!     {"op": "append_entry", "customer": "Walk-in", "summary": "Return 2 Aviator",
//!      "amount": {"var": "refund"}},
//!     {"op": "answer", "status": "success", "text": "Refunded ${refund} for 2 Aviators."}
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use planledger_accounting::DEFAULT_PREFIX;
use planledger_core::Money;
use planledger_inventory::{InventoryItem, contains_word};

/// Parsed plan document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Plan {
    /// Declared intent. A `read` plan may not contain mutating steps.
    #[serde(default)]
    pub intent: Option<Intent>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Read,
    Mutate,
}

/// One instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Bind the inventory rows matching `filter` under `bind`.
    Find {
        bind: String,
        #[serde(rename = "where", default)]
        filter: Filter,
    },
    /// Bind `unit price × quantity` of one item as a money variable.
    LineTotal {
        bind: String,
        item: ItemRef,
        quantity: Quantity,
    },
    /// Change one item's stock by a signed delta.
    AdjustStock { item: ItemRef, delta: Quantity },
    /// Append one ledger entry with the next id for `prefix`.
    AppendEntry {
        customer: Template,
        summary: Template,
        amount: Amount,
        #[serde(default = "default_prefix")]
        prefix: String,
    },
    /// Stop with the `otherwise` answer when `check` does not hold.
    Require { check: Check, otherwise: AnswerSpec },
    /// Run `steps` once per row of `bind`, with the row bound as `alias`.
    ForEach {
        bind: String,
        #[serde(rename = "as")]
        alias: String,
        steps: Vec<Step>,
    },
    /// Append a line to the captured log.
    Print { text: Template },
    /// Set any of the answer bindings.
    Answer(AnswerSpec),
    /// Raise a runtime fault.
    Fail { message: Template },
    /// End the plan.
    Stop,
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

impl Step {
    /// Instruction name as written in the `op` tag.
    pub fn op(&self) -> &'static str {
        match self {
            Step::Find { .. } => "find",
            Step::LineTotal { .. } => "line_total",
            Step::AdjustStock { .. } => "adjust_stock",
            Step::AppendEntry { .. } => "append_entry",
            Step::Require { .. } => "require",
            Step::ForEach { .. } => "for_each",
            Step::Print { .. } => "print",
            Step::Answer(_) => "answer",
            Step::Fail { .. } => "fail",
            Step::Stop => "stop",
        }
    }

    pub fn is_mutation(&self) -> bool {
        matches!(self, Step::AdjustStock { .. } | Step::AppendEntry { .. })
    }
}

/// Answer bindings a step may set. Omitted fields leave the binding untouched.
///
/// `status` stays a raw string here: the closed enumeration is enforced when
/// the run finishes, so an unknown value is a contract violation rather than
/// a parse error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnswerSpec {
    #[serde(default)]
    pub text: Option<Template>,
    #[serde(default)]
    pub status: Option<String>,
    /// Name of a row binding to return as `answer_rows`.
    #[serde(default)]
    pub rows: Option<String>,
    #[serde(default)]
    pub json: Option<JsonValue>,
}

/// Predicate over inventory rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    #[default]
    Everything,
    All(Vec<Filter>),
    Any(Vec<Filter>),
    Not(Box<Filter>),
    ItemId(String),
    /// Case-insensitive name equality.
    NameIs(String),
    /// Case-insensitive substring of the name.
    NameContains(String),
    /// Whole-word match in name or description.
    Mentions(String),
    /// The item's name appears as a word in the request.
    NamedInRequest,
    PriceBelow(Money),
    PriceAtMost(Money),
    PriceAbove(Money),
    PriceAtLeast(Money),
    InStock,
    StockAtLeast(i64),
}

impl Filter {
    pub fn matches(&self, item: &InventoryItem, request: &str) -> bool {
        match self {
            Filter::Everything => true,
            Filter::All(fs) => fs.iter().all(|f| f.matches(item, request)),
            Filter::Any(fs) => fs.iter().any(|f| f.matches(item, request)),
            Filter::Not(f) => !f.matches(item, request),
            Filter::ItemId(id) => item.item_id.as_str().eq_ignore_ascii_case(id),
            Filter::NameIs(name) => item.name.trim().to_lowercase() == name.trim().to_lowercase(),
            Filter::NameContains(s) => item.name.to_lowercase().contains(&s.to_lowercase()),
            Filter::Mentions(word) => item.mentions(word),
            Filter::NamedInRequest => contains_word(request, &item.name),
            Filter::PriceBelow(m) => item.price < *m,
            Filter::PriceAtMost(m) => item.price <= *m,
            Filter::PriceAbove(m) => item.price > *m,
            Filter::PriceAtLeast(m) => item.price >= *m,
            Filter::InStock => item.quantity_in_stock > 0,
            Filter::StockAtLeast(n) => item.quantity_in_stock >= *n,
        }
    }
}

/// Reference to a single inventory item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemRef {
    Id(String),
    /// First row of a binding.
    First(String),
    At { bind: String, index: usize },
}

impl ItemRef {
    /// Row binding this reference reads, if any.
    pub fn binding(&self) -> Option<&str> {
        match self {
            ItemRef::Id(_) => None,
            ItemRef::First(b) | ItemRef::At { bind: b, .. } => Some(b),
        }
    }
}

/// Integer quantity: a literal, or derived from the request text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Quantity {
    Literal(i64),
    Expr(QuantityExpr),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantityExpr {
    /// The number written just before `keyword` in the request
    /// ("buy 3 pairs of classic" → 3 for `classic`).
    FromRequest(String),
    Neg(Box<Quantity>),
}

/// Money amount: a literal, a variable, or a computed line total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Amount {
    Literal(Money),
    Expr(AmountExpr),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountExpr {
    Var(String),
    LineTotal { item: ItemRef, quantity: Quantity },
    Neg(Box<Amount>),
}

/// Condition evaluated by `require`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Check {
    /// The row binding is non-empty.
    Matched(String),
    Not(Box<Check>),
    All(Vec<Check>),
    Any(Vec<Check>),
    StockAtLeast { item: ItemRef, quantity: Quantity },
    RequestMentions(String),
    /// A quantity can be read from the request for this keyword.
    QuantityInRequest(String),
    BalanceAtLeast(Amount),
}

/// Text with `{placeholder}` interpolation; `{{` and `}}` escape braces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Template(pub String);

/// Parsed template piece.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Text(&'a str),
    /// `{name}` or `{name.field}`.
    Placeholder { name: &'a str, field: Option<&'a str> },
    /// Literal brace from an escape.
    Brace(char),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unterminated placeholder starting at byte {0}")]
    Unterminated(usize),
    #[error("unmatched '}}' at byte {0}")]
    UnmatchedClose(usize),
    #[error("empty placeholder at byte {0}")]
    Empty(usize),
}

impl Template {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> Result<Vec<Segment<'_>>, TemplateError> {
        let s = self.0.as_str();
        let bytes = s.as_bytes();
        let mut out = Vec::new();
        let mut text_start = 0;
        let mut i = 0;

        while i < bytes.len() {
            match bytes[i] {
                b'{' if bytes.get(i + 1) == Some(&b'{') => {
                    push_text(&mut out, &s[text_start..i]);
                    out.push(Segment::Brace('{'));
                    i += 2;
                    text_start = i;
                }
                b'}' if bytes.get(i + 1) == Some(&b'}') => {
                    push_text(&mut out, &s[text_start..i]);
                    out.push(Segment::Brace('}'));
                    i += 2;
                    text_start = i;
                }
                b'{' => {
                    push_text(&mut out, &s[text_start..i]);
                    let close = s[i + 1..]
                        .find('}')
                        .map(|off| i + 1 + off)
                        .ok_or(TemplateError::Unterminated(i))?;
                    let inner = s[i + 1..close].trim();
                    if inner.is_empty() {
                        return Err(TemplateError::Empty(i));
                    }
                    let (name, field) = match inner.split_once('.') {
                        Some((n, f)) => (n.trim(), Some(f.trim())),
                        None => (inner, None),
                    };
                    out.push(Segment::Placeholder { name, field });
                    i = close + 1;
                    text_start = i;
                }
                b'}' => return Err(TemplateError::UnmatchedClose(i)),
                _ => i += 1,
            }
        }
        push_text(&mut out, &s[text_start..]);
        Ok(out)
    }
}

fn push_text<'a>(out: &mut Vec<Segment<'a>>, text: &'a str) {
    if !text.is_empty() {
        out.push(Segment::Text(text));
    }
}

impl From<&str> for Template {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Plan text could not be parsed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("malformed plan at line {line}, column {column}: {message}")]
pub struct PlanParseError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl Plan {
    /// Parse a plan body. A surrounding Markdown code fence is tolerated.
    pub fn parse(code: &str) -> Result<Plan, PlanParseError> {
        let body = strip_code_fence(code);
        serde_json::from_str(body).map_err(|e| PlanParseError {
            line: e.line(),
            column: e.column(),
            message: e.to_string(),
        })
    }

    /// True when any step (at any depth) mutates the store.
    pub fn mutates(&self) -> bool {
        fn any_mutation(steps: &[Step]) -> bool {
            steps.iter().any(|s| match s {
                Step::ForEach { steps, .. } => any_mutation(steps),
                other => other.is_mutation(),
            })
        }
        any_mutation(&self.steps)
    }
}

fn strip_code_fence(code: &str) -> &str {
    let trimmed = code.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (```json) up to the first newline.
    let rest = match rest.find('\n') {
        Some(nl) => &rest[nl + 1..],
        None => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}
