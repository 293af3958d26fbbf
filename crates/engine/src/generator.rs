//! Boundary to the external plan generator.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use planledger_store::Store;

use crate::config::EngineConfig;
use crate::extract::ExtractError;
use crate::result::ExecutionResult;
use crate::runner::PlanRunner;
use crate::schema;

#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeneratorError {
    #[error("generator unavailable: {0}")]
    Unavailable(String),

    #[error("generator failed: {0}")]
    Failed(String),
}

/// Turns a request into plan text, given a description of the store.
pub trait PlanGenerator {
    fn generate(&self, schema: &str, request: &str) -> Result<String, GeneratorError>;
}

impl<F> PlanGenerator for F
where
    F: Fn(&str, &str) -> Result<String, GeneratorError>,
{
    fn generate(&self, schema: &str, request: &str) -> Result<String, GeneratorError> {
        self(schema, request)
    }
}

/// What the agent did with one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentReply {
    /// Text handed to extraction (generator output or error text).
    pub raw_plan: String,
    pub generator_error: Option<GeneratorError>,
    pub result: ExecutionResult,
}

/// Schema description → generator → runner.
#[derive(Debug, Clone)]
pub struct Agent<G> {
    generator: G,
    runner: PlanRunner,
    sample_size: usize,
}

impl<G: PlanGenerator> Agent<G> {
    pub fn new(generator: G) -> Self {
        Self::with_config(generator, EngineConfig::default())
    }

    pub fn with_config(generator: G, config: EngineConfig) -> Self {
        let sample_size = config.schema_sample_size;
        Self {
            generator,
            runner: PlanRunner::new(config),
            sample_size,
        }
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    pub fn runner(&self) -> &PlanRunner {
        &self.runner
    }

    /// Handle one customer request end to end.
    ///
    /// A generator failure does not short-circuit: its text goes through
    /// extraction like any other output, which normally ends as a malformed
    /// plan fault.
    pub fn handle(&self, store: &mut Store, request: &str) -> Result<AgentReply, ExtractError> {
        let schema = schema::describe(store, self.sample_size);
        let (raw_plan, generator_error) = match self.generator.generate(&schema, request) {
            Ok(text) => (text, None),
            Err(e) => {
                warn!(error = %e, "plan generator failed");
                (e.to_string(), Some(e))
            }
        };

        let result = self.runner.run(&raw_plan, store, request)?;
        Ok(AgentReply {
            raw_plan,
            generator_error,
            result,
        })
    }
}
