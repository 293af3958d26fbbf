//! `planledger-engine`
//!
//! Turns generator output into an executed, audited plan run:
//! extract the plan block, parse and validate the plan, interpret it against
//! the store, and assemble an [`ExecutionResult`] with before/after snapshots.
//!
//! The engine never calls a model itself. Plan text comes from a
//! [`PlanGenerator`] supplied by the caller.

pub mod config;
pub mod extract;
pub mod generator;
pub mod plan;
pub mod request;
pub mod result;
pub mod runner;
pub mod sandbox;
pub mod schema;
pub mod validate;

pub use config::EngineConfig;
pub use extract::{ExtractError, MultiBlockPolicy, extract, extract_with};
pub use generator::{Agent, AgentReply, GeneratorError, PlanGenerator};
pub use plan::{Plan, PlanParseError, Step};
pub use result::{
    AnswerSlots, ContractBreach, ExecutionResult, Fault, FaultKind, Outcome, PlanStatus, RunStatus,
    StockChange, StoreChanges,
};
pub use runner::{Phase, PlanRunner, RunError, run};
pub use sandbox::{CommitMode, Execution, SandboxConfig, execute};
pub use schema::describe;
pub use validate::{Limits, ValidationError, validate};
