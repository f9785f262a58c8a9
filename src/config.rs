//! Compiler configuration.

use crate::error::{CompileError, CompileResult};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

/// Default nesting limit for expression trees
pub const DEFAULT_MAX_EXPRESSION_DEPTH: usize = 512;

/// Default number of positions per output page
pub const DEFAULT_MAX_BATCH_SIZE: usize = 8192;

pub const ENV_MAX_EXPRESSION_DEPTH: &str = "ROWEXPR_MAX_EXPRESSION_DEPTH";
pub const ENV_FOLD_CONSTANTS: &str = "ROWEXPR_FOLD_CONSTANTS";
pub const ENV_MAX_BATCH_SIZE: &str = "ROWEXPR_MAX_BATCH_SIZE";

/// Expression compiler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Trees nested deeper than this are rejected.
    pub max_expression_depth: usize,
    /// Evaluate deterministic, non-failing calls over constants at compile time.
    pub fold_constants: bool,
    /// Maximum positions in a page produced by a page processor.
    pub max_batch_size: usize,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            max_expression_depth: DEFAULT_MAX_EXPRESSION_DEPTH,
            fold_constants: true,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
        }
    }
}

impl CompilerConfig {
    /// Defaults overridden by `ROWEXPR_*` environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = CompilerConfig::default();
        if let Some(depth) = env_var(ENV_MAX_EXPRESSION_DEPTH)? {
            config.max_expression_depth = depth;
        }
        if let Some(fold) = env_var(ENV_FOLD_CONSTANTS)? {
            config.fold_constants = fold;
        }
        if let Some(batch) = env_var(ENV_MAX_BATCH_SIZE)? {
            config.max_batch_size = batch;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn with_max_expression_depth(mut self, depth: usize) -> Self {
        self.max_expression_depth = depth;
        self
    }

    pub fn with_fold_constants(mut self, fold: bool) -> Self {
        self.fold_constants = fold;
        self
    }

    pub fn with_max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = size;
        self
    }

    pub fn validate(&self) -> CompileResult<()> {
        if self.max_expression_depth == 0 {
            return Err(CompileError::InvalidConfig {
                reason: "max_expression_depth must be at least 1".to_string(),
            });
        }
        if self.max_batch_size == 0 {
            return Err(CompileError::InvalidConfig {
                reason: "max_batch_size must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

fn env_var<T>(name: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("invalid value for {}: {:?}", name, raw)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(e).with_context(|| format!("cannot read {}", name)),
    }
}
