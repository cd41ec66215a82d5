//! Integration tests for item matching.

use crucible_economy::testing;
use crucible_economy::{
    match_item_inputs, DoubleInputParam, Engine, EngineConfig, ExecuteRecipeRequest, ExecutionLog,
    ExprEnvFactory, Item, ItemInput, LongInputParam, MemoryItemStore, Recipe, RecipeBook,
    RecipeError, RecipeResult, StringInputParam,
};

fn recipe(slots: Vec<ItemInput>) -> Recipe {
    Recipe {
        cookbook_id: "cb".into(),
        id: "r".into(),
        item_inputs: slots,
        ..Recipe::default()
    }
}

fn sword_slot() -> ItemInput {
    ItemInput {
        id: "A".into(),
        strings: vec![StringInputParam {
            key: "Name".into(),
            value: "sword".into(),
        }],
        ..ItemInput::default()
    }
}

fn hp_slot() -> ItemInput {
    ItemInput {
        id: "B".into(),
        longs: vec![LongInputParam {
            key: "HP".into(),
            min_value: 100,
            max_value: 200,
        }],
        ..ItemInput::default()
    }
}

fn matched(store: &MemoryItemStore, recipe: &Recipe, ids: &[&str]) -> RecipeResult<Vec<String>> {
    let factory = ExprEnvFactory::new(&EngineConfig::default());
    let ids: Vec<String> = ids.iter().map(|s| (*s).to_string()).collect();
    match_item_inputs(store, &factory, recipe, &ids, Some(5))
        .map(|items| items.iter().map(|i| i.id().to_string()).collect())
}

#[test]
fn test_sword_and_hp_scenario_both_orders() {
    let store = MemoryItemStore::new();
    store.put(Item::new("cb", "item1").with_string("Name", "sword"));
    store.put(Item::new("cb", "item2").with_long("HP", 150));
    let r = recipe(vec![sword_slot(), hp_slot()]);

    assert_eq!(matched(&store, &r, &["item1", "item2"]).unwrap(), ["item1", "item2"]);
    assert_eq!(matched(&store, &r, &["item2", "item1"]).unwrap(), ["item1", "item2"]);
}

#[test]
fn test_matching_is_deterministic() {
    let store = MemoryItemStore::new();
    for i in 0..4 {
        store.put(Item::new("cb", format!("s{i}")).with_string("Name", "sword").with_long("HP", 100 + i));
    }
    let r = recipe(vec![sword_slot(), hp_slot(), sword_slot()]);
    let ids = ["s3", "s0", "s2"];
    let first = matched(&store, &r, &ids).unwrap();
    for _ in 0..10 {
        assert_eq!(matched(&store, &r, &ids).unwrap(), first);
    }
}

#[test]
fn test_exclusivity_and_first_fit() {
    let store = MemoryItemStore::new();
    for name in ["a", "b", "c"] {
        store.put(Item::new("cb", name).with_string("Name", "sword"));
    }
    let r = recipe(vec![sword_slot(), sword_slot(), sword_slot()]);

    let out = matched(&store, &r, &["c", "a", "b"]).unwrap();
    assert_eq!(out, ["c", "a", "b"]);

    let mut unique = out.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), out.len());
}

#[test]
fn test_range_bounds_are_inclusive() {
    let slot = |lo: f64, hi: f64| ItemInput {
        id: "S".into(),
        doubles: vec![DoubleInputParam {
            key: "weight".into(),
            min_value: lo,
            max_value: hi,
        }],
        ..ItemInput::default()
    };

    let store = MemoryItemStore::new();
    store.put(Item::new("cb", "low").with_double("weight", 1.5));
    store.put(Item::new("cb", "high").with_double("weight", 3.0));

    assert!(matched(&store, &recipe(vec![slot(1.5, 3.0)]), &["low"]).is_ok());
    assert!(matched(&store, &recipe(vec![slot(1.5, 3.0)]), &["high"]).is_ok());

    let above_low = 1.5 + f64::EPSILON * 2.0;
    let below_high = 3.0 - f64::EPSILON * 4.0;
    assert!(matched(&store, &recipe(vec![slot(above_low, 3.0)]), &["low"]).is_err());
    assert!(matched(&store, &recipe(vec![slot(1.5, below_high)]), &["high"]).is_err());
}

#[test]
fn test_failure_is_all_or_nothing() {
    let store = MemoryItemStore::new();
    store.put(Item::new("cb", "x").with_string("Name", "sword"));
    store.put(Item::new("cb", "y").with_long("HP", 150));
    store.put(Item::new("cb", "z").with_long("HP", 999));
    let r = recipe(vec![sword_slot(), hp_slot(), hp_slot()]);

    let err = matched(&store, &r, &["x", "y", "z"]).unwrap_err();
    match err {
        RecipeError::NoMatchForSlot { slot, rejections, .. } => {
            assert_eq!(slot, 2);
            assert_eq!(rejections.len(), 1);
            assert_eq!(rejections[0].item_id, "z");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_failed_submission_records_nothing() {
    let mut book = RecipeBook::new(EngineConfig::default());
    book.insert(Recipe {
        cookbook_id: "cb".into(),
        id: "pair".into(),
        item_inputs: testing::item_inputs(&["left", "right"]),
        ..Recipe::default()
    })
    .unwrap();
    let engine = Engine::new(book);

    let store = MemoryItemStore::new();
    store.put(Item::new("cb", "l").with_string("Name", "left"));
    store.put(Item::new("cb", "r").with_string("Name", "wrong"));

    let mut log = ExecutionLog::new();
    let request = ExecuteRecipeRequest {
        creator: "bob".into(),
        cookbook_id: "cb".into(),
        recipe_id: "pair".into(),
        item_ids: vec!["l".into(), "r".into()],
        block_height: 3,
    };
    match engine.execute_recipe(&store, &request) {
        Ok(execution) => {
            log.append_pending(execution);
        }
        Err(e) => assert!(matches!(e, RecipeError::NoMatchForSlot { slot: 1, .. })),
    }
    assert_eq!(log.pending_len(), 0);
}

#[test]
fn test_condition_expression_over_item_fields() {
    let store = MemoryItemStore::new();
    store.put(Item::new("cb", "weak").with_long("HP", 50).with_long("level", 1));
    store.put(Item::new("cb", "strong").with_long("HP", 50).with_long("level", 9));

    let mut slot = ItemInput {
        id: "S".into(),
        ..ItemInput::default()
    };
    slot.conditions.longs.push(LongInputParam {
        key: "HP * level".into(),
        min_value: 400,
        max_value: 1000,
    });
    let r = recipe(vec![slot]);

    assert_eq!(matched(&store, &r, &["strong"]).unwrap(), ["strong"]);
    assert!(matches!(
        matched(&store, &r, &["weak"]),
        Err(RecipeError::NoMatchForSlot { .. })
    ));
}
