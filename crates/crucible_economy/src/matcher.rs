//! # Item Matcher
//!
//! Binds submitted item ids to a recipe's item-input slots.
//!
//! ## Algorithm
//!
//! Greedy first-fit without backtracking:
//!
//! ```text
//! for slot in recipe.item_inputs (declaration order):
//!     for candidate in submitted ids (submission order), not yet consumed:
//!         if check_item(candidate, slot) passes:
//!             bind, consume, next slot
//!     no candidate passed -> NoMatchForSlot
//! ```
//!
//! This is not a maximum bipartite matching. A submission that some other
//! assignment could satisfy may still fail, and that is observable
//! behavior that must not change.
//!
//! Candidates are fetched from the [`ItemStore`] lazily, at most once each.
//! Every (candidate, slot) check gets a fresh environment bound to the
//! candidate alone.

use crate::constraint::check_item;
use crate::env::{EnvContext, EnvFactory};
use crate::error::{RecipeError, RecipeResult, Rejection};
use crate::item::{Item, ItemRecord, ItemStore};
use crate::recipe::Recipe;

/// Matches `item_ids` against `recipe.item_inputs`.
///
/// Returns one item per slot, in slot order. Any failure discards the whole
/// attempt.
///
/// # Errors
///
/// - [`RecipeError::SizeMismatch`] when `item_ids.len()` differs from the
///   slot count
/// - [`RecipeError::DuplicateItem`] when an id is submitted twice
/// - [`RecipeError::ItemNotFound`] when the store lacks a scanned id
/// - [`RecipeError::NoMatchForSlot`] when a slot has no passing candidate
/// - any non-local error raised by the environment factory
pub fn match_item_inputs<S, F>(
    store: &S,
    factory: &F,
    recipe: &Recipe,
    item_ids: &[String],
    block_height: Option<u64>,
) -> RecipeResult<Vec<Item>>
where
    S: ItemStore + ?Sized,
    F: EnvFactory,
{
    if item_ids.len() != recipe.item_inputs.len() {
        return Err(RecipeError::SizeMismatch {
            provided: item_ids.len(),
            required: recipe.item_inputs.len(),
        });
    }
    for (j, id) in item_ids.iter().enumerate() {
        if item_ids[..j].contains(id) {
            return Err(RecipeError::DuplicateItem(id.clone()));
        }
    }

    let ctx = EnvContext {
        cookbook_id: &recipe.cookbook_id,
        recipe_id: &recipe.id,
        output_id: "",
        block_height,
    };

    let mut resolved: Vec<Option<(Item, ItemRecord)>> = vec![None; item_ids.len()];
    let mut consumed = vec![false; item_ids.len()];
    let mut bound: Vec<usize> = Vec::with_capacity(recipe.item_inputs.len());

    for (slot_idx, slot) in recipe.item_inputs.iter().enumerate() {
        let mut rejections = Vec::new();
        let mut winner = None;

        for (j, id) in item_ids.iter().enumerate() {
            if consumed[j] {
                continue;
            }
            if resolved[j].is_none() {
                let item = store
                    .get(&recipe.cookbook_id, &recipe.id, id)
                    .ok_or_else(|| RecipeError::ItemNotFound(id.clone()))?;
                let snapshot = item.snapshot();
                resolved[j] = Some((item, snapshot));
            }
            let Some((_, record)) = &resolved[j] else {
                continue;
            };

            let mut env = factory.build(&ctx, std::slice::from_ref(record))?;
            match check_item(record, slot, &mut env) {
                Ok(()) => {
                    winner = Some(j);
                    break;
                }
                Err(e) if e.is_local() => {
                    tracing::trace!("slot {} ({}): rejected {}: {}", slot_idx, slot.id, id, e);
                    rejections.push(Rejection {
                        item_id: id.clone(),
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        let Some(j) = winner else {
            tracing::warn!(
                "{}/{}: no match for slot {} ({}) after {} candidates",
                recipe.cookbook_id,
                recipe.id,
                slot_idx,
                slot.id,
                rejections.len()
            );
            return Err(RecipeError::NoMatchForSlot {
                slot: slot_idx,
                slot_id: slot.id.clone(),
                rejections,
            });
        };

        tracing::debug!("slot {} ({}) bound to {}", slot_idx, slot.id, item_ids[j]);
        consumed[j] = true;
        bound.push(j);
    }

    let mut matched = Vec::with_capacity(bound.len());
    for j in bound {
        if let Some((item, _)) = resolved[j].take() {
            matched.push(item);
        }
    }
    Ok(matched)
}
