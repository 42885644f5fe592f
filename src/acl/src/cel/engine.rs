//! CEL expression engine with compiled program caching

use cel_interpreter::objects::Value as CelValue;
use cel_interpreter::{Context, Program};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

use crate::cel::{
    context::EvalContext,
    error::{CelError, Result},
};

/// CEL engine for compiling and evaluating conditions
#[derive(Default)]
pub struct Engine {
    /// Compiled program cache keyed by source text
    program_cache: DashMap<String, Arc<Program>>,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile an expression, reusing a cached program when available
    pub fn compile(&self, expr: &str) -> Result<Arc<Program>> {
        if let Some(program) = self.program_cache.get(expr) {
            return Ok(program.clone());
        }

        let program = Program::compile(expr)
            .map_err(|e| CelError::CompilationError(format!("{:?}", e)))?;

        let program = Arc::new(program);
        self.program_cache.insert(expr.to_string(), program.clone());
        debug!(expr, "Compiled CEL condition");

        Ok(program)
    }

    /// Evaluate a compiled program; anything other than a boolean is an error
    pub fn evaluate(&self, program: &Program, ctx: &EvalContext) -> Result<bool> {
        let mut cel_context = Context::default();

        for (name, value) in ctx.variables() {
            cel_context
                .add_variable(name, value)
                .map_err(|_| CelError::VariableBinding(name.to_string()))?;
        }

        let result = program
            .execute(&cel_context)
            .map_err(|e| CelError::EvaluationError(format!("{:?}", e)))?;

        match result {
            CelValue::Bool(b) => Ok(b),
            _ => Err(CelError::NonBooleanResult),
        }
    }

    /// Compile and evaluate in one call
    pub fn evaluate_expression(&self, expr: &str, ctx: &EvalContext) -> Result<bool> {
        let program = self.compile(expr)?;
        self.evaluate(&program, ctx)
    }

    pub fn clear_cache(&self) {
        self.program_cache.clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            size: self.program_cache.len(),
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("cached_programs", &self.program_cache.len())
            .finish()
    }
}

/// Cache statistics
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Number of cached programs
    pub size: usize,
}
