//! # Recipe Error Types
//!
//! All errors that can occur while matching inputs or producing outputs.
//!
//! Per-candidate failures ([`RecipeError::is_local`]) are recovered inside
//! the matcher; everything else aborts the whole request.

use crucible_expr::ExprError;
use thiserror::Error;

/// Why one candidate item was skipped for a slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rejection {
    /// The candidate that was tried.
    pub item_id: String,
    /// The local failure, rendered for operators.
    pub reason: String,
}

fn describe(rejections: &[Rejection]) -> String {
    if rejections.is_empty() {
        return "no candidates left".to_string();
    }
    rejections
        .iter()
        .map(|r| format!("{}: {}", r.item_id, r.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors that can occur in the recipe engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecipeError {
    /// Number of submitted items differs from the recipe's slot count.
    #[error("size mismatch between provided input items ({provided}) and items required by recipe ({required})")]
    SizeMismatch {
        /// Items submitted.
        provided: usize,
        /// Slots declared.
        required: usize,
    },

    /// A constrained field is absent on the candidate.
    #[error("{key} key is not available on the item: item_id={item_id}")]
    FieldNotAvailable {
        /// Field key.
        key: String,
        /// Candidate item.
        item_id: String,
    },

    /// A constrained field is present but outside its range or unequal.
    #[error("{key} key value does not match: item_id={item_id}")]
    FieldMismatch {
        /// Field key.
        key: String,
        /// Candidate item.
        item_id: String,
    },

    /// A program failed to lex, parse or evaluate.
    #[error("{program} expression is invalid: {subject}, {source}")]
    ExpressionInvalid {
        /// Program text.
        program: String,
        /// What the program was evaluated for (`item_id=..` or `param=..`).
        subject: String,
        /// Underlying evaluator error.
        #[source]
        source: ExprError,
    },

    /// A condition program evaluated but its result fails the declared check.
    #[error("{program} expression result does not match: item_id={item_id}")]
    ExpressionResultMismatch {
        /// Program text.
        program: String,
        /// Candidate item.
        item_id: String,
    },

    /// No remaining candidate satisfies a slot.
    #[error("no match found for item input slot {slot} ({slot_id}): {}", describe(.rejections))]
    NoMatchForSlot {
        /// Zero-based slot position.
        slot: usize,
        /// The slot's declared id.
        slot_id: String,
        /// Every candidate tried for this slot, in order.
        rejections: Vec<Rejection>,
    },

    /// A weight table cannot produce a value.
    #[error("cannot sample: {0}")]
    CannotSample(String),

    /// The item store has no item with this id.
    #[error("item with id {0} not found")]
    ItemNotFound(String),

    /// The same item id was submitted more than once.
    #[error("item with id {0} submitted more than once")]
    DuplicateItem(String),

    /// Recipe not registered.
    #[error("recipe not found: {cookbook_id}/{recipe_id}")]
    RecipeNotFound {
        /// Cookbook id.
        cookbook_id: String,
        /// Recipe id.
        recipe_id: String,
    },

    /// Recipe definition violates an authoring rule.
    #[error("invalid recipe: {0}")]
    InvalidRecipe(String),

    /// Invalid configuration file.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Lifecycle transition not allowed from the current state.
    #[error("invalid execution transition from {from} to {to}")]
    InvalidTransition {
        /// Current state.
        from: &'static str,
        /// Requested state.
        to: &'static str,
    },

    /// The execution's block interval has not elapsed yet.
    #[error("execution not ready: submitted at {submitted}, ready at {ready_at}, current {current}")]
    NotReady {
        /// Submission height.
        submitted: u64,
        /// First height at which completion is allowed.
        ready_at: u64,
        /// Height supplied by the scheduler.
        current: u64,
    },
}

impl RecipeError {
    /// True for failures scoped to one (item, slot) pairing.
    ///
    /// The matcher records these and moves on to the next candidate.
    #[must_use]
    pub const fn is_local(&self) -> bool {
        matches!(
            self,
            Self::FieldNotAvailable { .. }
                | Self::FieldMismatch { .. }
                | Self::ExpressionInvalid { .. }
                | Self::ExpressionResultMismatch { .. }
        )
    }
}

/// Result type for recipe operations.
pub type RecipeResult<T> = Result<T, RecipeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_classification() {
        assert!(RecipeError::FieldNotAvailable {
            key: "HP".into(),
            item_id: "a".into()
        }
        .is_local());
        assert!(!RecipeError::SizeMismatch {
            provided: 1,
            required: 2
        }
        .is_local());
        assert!(!RecipeError::CannotSample("empty".into()).is_local());
    }

    #[test]
    fn test_no_match_message_lists_candidates() {
        let err = RecipeError::NoMatchForSlot {
            slot: 1,
            slot_id: "blade".into(),
            rejections: vec![Rejection {
                item_id: "item7".into(),
                reason: "HP key is not available on the item: item_id=item7".into(),
            }],
        };
        let msg = err.to_string();
        assert!(msg.contains("slot 1 (blade)"));
        assert!(msg.contains("item7: HP key is not available"));
    }
}
