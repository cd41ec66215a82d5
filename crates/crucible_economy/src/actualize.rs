//! # Parameter Actualizer
//!
//! Turns declarative parameter lists into concrete key/value lists.
//!
//! For each parameter, in declaration order:
//! - a non-empty program is evaluated through the environment
//! - otherwise numeric parameters sample their weight table
//! - otherwise string parameters use their literal value
//!
//! The first failure aborts the list; no partial output is returned.

use crucible_expr::ExprError;

use crate::env::Environment;
use crate::error::{RecipeError, RecipeResult};
use crate::item::{DoubleKeyValue, LongKeyValue, StringKeyValue};
use crate::recipe::{DoubleParamList, LongParamList, StringParamList};

fn expression_invalid(program: &str, key: &str, source: ExprError) -> RecipeError {
    RecipeError::ExpressionInvalid {
        program: program.to_string(),
        subject: format!("param={key}"),
        source,
    }
}

impl DoubleParamList {
    /// Produces one floating attribute per parameter.
    ///
    /// # Errors
    ///
    /// [`RecipeError::ExpressionInvalid`] or [`RecipeError::CannotSample`].
    pub fn actualize<E: Environment>(&self, env: &mut E) -> RecipeResult<Vec<DoubleKeyValue>> {
        self.params
            .iter()
            .map(|param| -> RecipeResult<DoubleKeyValue> {
                let value = if param.program.is_empty() {
                    param.weight_table.generate(env.rng())?
                } else {
                    env.eval_float(&param.program)
                        .map_err(|e| expression_invalid(&param.program, &param.key, e))?
                };
                Ok(DoubleKeyValue::new(param.key.as_str(), value))
            })
            .collect()
    }
}

impl LongParamList {
    /// Produces one integer attribute per parameter.
    ///
    /// # Errors
    ///
    /// [`RecipeError::ExpressionInvalid`] or [`RecipeError::CannotSample`].
    pub fn actualize<E: Environment>(&self, env: &mut E) -> RecipeResult<Vec<LongKeyValue>> {
        self.params
            .iter()
            .map(|param| -> RecipeResult<LongKeyValue> {
                let value = if param.program.is_empty() {
                    param.weight_table.generate(env.rng())?
                } else {
                    env.eval_int(&param.program)
                        .map_err(|e| expression_invalid(&param.program, &param.key, e))?
                };
                Ok(LongKeyValue::new(param.key.as_str(), value))
            })
            .collect()
    }
}

impl StringParamList {
    /// Produces one string attribute per parameter.
    ///
    /// # Errors
    ///
    /// [`RecipeError::ExpressionInvalid`].
    pub fn actualize<E: Environment>(&self, env: &mut E) -> RecipeResult<Vec<StringKeyValue>> {
        self.params
            .iter()
            .map(|param| -> RecipeResult<StringKeyValue> {
                let value = if param.program.is_empty() {
                    param.value.clone()
                } else {
                    env.eval_string(&param.program)
                        .map_err(|e| expression_invalid(&param.program, &param.key, e))?
                };
                Ok(StringKeyValue::new(param.key.as_str(), value))
            })
            .collect()
    }
}
