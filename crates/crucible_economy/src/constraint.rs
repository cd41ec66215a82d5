//! # Constraint Evaluator
//!
//! Checks one candidate item against one item-input slot.
//!
//! Declared field constraints run first (doubles, longs, strings), then
//! the condition programs in the same order. The first failure wins.

use crucible_expr::ExprError;

use crate::env::Environment;
use crate::error::{RecipeError, RecipeResult};
use crate::item::ItemRecord;
use crate::recipe::ItemInput;

fn not_available(key: &str, item: &ItemRecord) -> RecipeError {
    RecipeError::FieldNotAvailable {
        key: key.to_string(),
        item_id: item.id.clone(),
    }
}

fn mismatch(key: &str, item: &ItemRecord) -> RecipeError {
    RecipeError::FieldMismatch {
        key: key.to_string(),
        item_id: item.id.clone(),
    }
}

fn expression_invalid(program: &str, item: &ItemRecord, source: ExprError) -> RecipeError {
    RecipeError::ExpressionInvalid {
        program: program.to_string(),
        subject: format!("item_id={}", item.id),
        source,
    }
}

fn result_mismatch(program: &str, item: &ItemRecord) -> RecipeError {
    RecipeError::ExpressionResultMismatch {
        program: program.to_string(),
        item_id: item.id.clone(),
    }
}

/// Checks `item` against every constraint of `slot`.
///
/// `env` must be bound to `item` alone.
///
/// # Errors
///
/// The first failing check, as one of the local kinds
/// ([`RecipeError::is_local`]).
pub fn check_item<E: Environment>(item: &ItemRecord, slot: &ItemInput, env: &mut E) -> RecipeResult<()> {
    for param in &slot.doubles {
        let value = item.find_double(&param.key).ok_or_else(|| not_available(&param.key, item))?;
        if !param.has(value) {
            return Err(mismatch(&param.key, item));
        }
    }

    for param in &slot.longs {
        let value = item.find_long(&param.key).ok_or_else(|| not_available(&param.key, item))?;
        if !param.has(value) {
            return Err(mismatch(&param.key, item));
        }
    }

    for param in &slot.strings {
        let value = item.find_string(&param.key).ok_or_else(|| not_available(&param.key, item))?;
        if value != param.value {
            return Err(mismatch(&param.key, item));
        }
    }

    let conditions = &slot.conditions;
    if conditions.is_empty() {
        return Ok(());
    }

    for param in &conditions.doubles {
        let value = env
            .eval_float(&param.key)
            .map_err(|e| expression_invalid(&param.key, item, e))?;
        if !param.has(value) {
            return Err(result_mismatch(&param.key, item));
        }
    }

    for param in &conditions.longs {
        let value = env
            .eval_int(&param.key)
            .map_err(|e| expression_invalid(&param.key, item, e))?;
        if !param.has(value) {
            return Err(result_mismatch(&param.key, item));
        }
    }

    for param in &conditions.strings {
        let value = env
            .eval_string(&param.key)
            .map_err(|e| expression_invalid(&param.key, item, e))?;
        if value != param.value {
            return Err(result_mismatch(&param.key, item));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::env::{EnvContext, EnvFactory, ExprEnvFactory};
    use crate::item::Item;
    use crate::recipe::{ConditionList, DoubleInputParam, LongInputParam, StringInputParam};

    fn check(item: &ItemRecord, slot: &ItemInput) -> RecipeResult<()> {
        let ctx = EnvContext {
            cookbook_id: "cb",
            recipe_id: "r",
            output_id: "",
            block_height: None,
        };
        let mut env = ExprEnvFactory::new(&EngineConfig::default())
            .build(&ctx, std::slice::from_ref(item))
            .unwrap();
        check_item(item, slot, &mut env)
    }

    fn item() -> ItemRecord {
        Item::new("cb", "item1")
            .with_string("Name", "sword")
            .with_long("HP", 150)
            .with_double("attack", 2.5)
            .snapshot()
    }

    fn hp_slot(lo: i64, hi: i64) -> ItemInput {
        ItemInput {
            id: "slot".into(),
            longs: vec![LongInputParam {
                key: "HP".into(),
                min_value: lo,
                max_value: hi,
            }],
            ..ItemInput::default()
        }
    }

    #[test]
    fn test_field_checks() {
        assert!(check(&item(), &hp_slot(100, 200)).is_ok());
        assert!(check(&item(), &hp_slot(150, 150)).is_ok());
        assert!(matches!(
            check(&item(), &hp_slot(151, 200)),
            Err(RecipeError::FieldMismatch { .. })
        ));

        let slot = ItemInput {
            strings: vec![StringInputParam {
                key: "Class".into(),
                value: "mage".into(),
            }],
            ..ItemInput::default()
        };
        assert!(matches!(
            check(&item(), &slot),
            Err(RecipeError::FieldNotAvailable { key, .. }) if key == "Class"
        ));

        let slot = ItemInput {
            doubles: vec![DoubleInputParam {
                key: "attack".into(),
                min_value: 2.5,
                max_value: 3.0,
            }],
            ..ItemInput::default()
        };
        assert!(check(&item(), &slot).is_ok());
    }

    #[test]
    fn test_first_failure_wins() {
        let mut slot = hp_slot(0, 10);
        slot.strings.push(StringInputParam {
            key: "Missing".into(),
            value: String::new(),
        });
        assert!(matches!(check(&item(), &slot), Err(RecipeError::FieldMismatch { key, .. }) if key == "HP"));
    }

    #[test]
    fn test_condition_programs() {
        let slot = ItemInput {
            conditions: ConditionList {
                doubles: vec![DoubleInputParam {
                    key: "attack * 2.0".into(),
                    min_value: 5.0,
                    max_value: 5.0,
                }],
                longs: vec![LongInputParam {
                    key: "HP - 50".into(),
                    min_value: 100,
                    max_value: 100,
                }],
                strings: vec![StringInputParam {
                    key: "Name + \"!\"".into(),
                    value: "sword!".into(),
                }],
            },
            ..ItemInput::default()
        };
        assert!(check(&item(), &slot).is_ok());

        let slot = ItemInput {
            conditions: ConditionList {
                longs: vec![LongInputParam {
                    key: "HP".into(),
                    min_value: 0,
                    max_value: 1,
                }],
                ..ConditionList::default()
            },
            ..ItemInput::default()
        };
        assert!(matches!(
            check(&item(), &slot),
            Err(RecipeError::ExpressionResultMismatch { .. })
        ));
    }

    #[test]
    fn test_invalid_expression_is_distinct() {
        let slot = ItemInput {
            conditions: ConditionList {
                longs: vec![LongInputParam {
                    key: "Level + 1".into(),
                    min_value: 0,
                    max_value: 10,
                }],
                ..ConditionList::default()
            },
            ..ItemInput::default()
        };
        let err = check(&item(), &slot).unwrap_err();
        assert!(matches!(err, RecipeError::ExpressionInvalid { .. }));
        assert!(err.is_local());
        assert!(err.to_string().contains("item_id=item1"));
    }
}
