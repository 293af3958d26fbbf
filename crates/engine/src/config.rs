use std::str::FromStr;
use std::time::Duration;

use crate::extract::MultiBlockPolicy;
use crate::sandbox::{CommitMode, SandboxConfig};

pub const ENV_MAX_OPERATIONS: &str = "PLANLEDGER_MAX_OPERATIONS";
pub const ENV_TIMEOUT_MS: &str = "PLANLEDGER_TIMEOUT_MS";
pub const ENV_MAX_OUTPUT_BYTES: &str = "PLANLEDGER_MAX_OUTPUT_BYTES";
pub const ENV_COMMIT_MODE: &str = "PLANLEDGER_COMMIT_MODE";
pub const ENV_MULTI_BLOCK: &str = "PLANLEDGER_MULTI_BLOCK";
pub const ENV_SCHEMA_SAMPLES: &str = "PLANLEDGER_SCHEMA_SAMPLES";

/// Engine settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub sandbox: SandboxConfig,
    pub multi_block: MultiBlockPolicy,
    /// Sample rows per collection in the schema description.
    pub schema_sample_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sandbox: SandboxConfig::default(),
            multi_block: MultiBlockPolicy::First,
            schema_sample_size: 3,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `PLANLEDGER_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let sandbox = &mut config.sandbox;

        override_with(&lookup, ENV_MAX_OPERATIONS, &mut sandbox.max_operations);
        override_with(&lookup, ENV_MAX_OUTPUT_BYTES, &mut sandbox.max_output_bytes);
        override_with(&lookup, ENV_COMMIT_MODE, &mut sandbox.commit_mode);

        let mut timeout_ms = sandbox.timeout.as_millis() as u64;
        override_with(&lookup, ENV_TIMEOUT_MS, &mut timeout_ms);
        sandbox.timeout = Duration::from_millis(timeout_ms);

        override_with(&lookup, ENV_MULTI_BLOCK, &mut config.multi_block);
        override_with(&lookup, ENV_SCHEMA_SAMPLES, &mut config.schema_sample_size);
        config
    }

    pub fn with_sandbox(mut self, sandbox: SandboxConfig) -> Self {
        self.sandbox = sandbox;
        self
    }

    pub fn with_commit_mode(mut self, mode: CommitMode) -> Self {
        self.sandbox.commit_mode = mode;
        self
    }

    pub fn with_max_operations(mut self, max_operations: u64) -> Self {
        self.sandbox.max_operations = max_operations;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.sandbox.timeout = timeout;
        self
    }

    pub fn with_multi_block(mut self, policy: MultiBlockPolicy) -> Self {
        self.multi_block = policy;
        self
    }

    pub fn with_schema_sample_size(mut self, samples: usize) -> Self {
        self.schema_sample_size = samples;
        self
    }
}

fn override_with<T, L>(lookup: &L, key: &str, slot: &mut T)
where
    T: FromStr,
    L: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse() {
        Ok(value) => *slot = value,
        Err(_) => tracing::warn!(key, value = %raw, "invalid setting; using default"),
    }
}
