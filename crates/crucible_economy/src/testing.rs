//! Recipe fixtures for tests and benchmarks.

use crate::recipe::{
    CoinInput, CoinOutput, DoubleParam, DoubleParamList, EntriesList, FeeInputParam, ItemInput,
    ItemModifyOutput, ItemOutput, LongParam, LongParamList, StringInputParam, StringParam,
    StringParamList, WeightedOutputs,
};
use crate::sampler::{DoubleWeightTable, IntWeightTable};

/// One coin input.
#[must_use]
pub fn coin_inputs(coin: &str, count: u64) -> Vec<CoinInput> {
    vec![CoinInput {
        coin: coin.to_string(),
        count,
    }]
}

/// One slot per name, each requiring `Name == name`.
#[must_use]
pub fn item_inputs(names: &[&str]) -> Vec<ItemInput> {
    names
        .iter()
        .map(|&name| ItemInput {
            id: name.to_string(),
            strings: vec![StringInputParam {
                key: "Name".into(),
                value: name.to_string(),
            }],
            transfer_fee: FeeInputParam {
                min_value: 0,
                max_value: 10_000,
            },
            ..ItemInput::default()
        })
        .collect()
}

/// A coin entry minting exactly one coin.
#[must_use]
pub fn coin_only_entry(coin: &str) -> CoinOutput {
    CoinOutput {
        id: coin.to_string(),
        coin: coin.to_string(),
        count: "1".into(),
    }
}

/// A coin entry minting `rand(10) + 1` coins.
#[must_use]
pub fn coin_only_entry_rand(id: &str, coin: &str) -> CoinOutput {
    CoinOutput {
        id: id.to_string(),
        coin: coin.to_string(),
        count: "rand(10) + 1".into(),
    }
}

/// A named item whose `endurance` and `HP` come from weight tables.
#[must_use]
pub fn item_only_entry(name: &str) -> ItemOutput {
    ItemOutput {
        id: name.to_string(),
        doubles: DoubleParamList {
            params: vec![DoubleParam {
                key: "endurance".into(),
                weight_table: DoubleWeightTable::new(&[(100.0, 500.0, 6), (501.0, 800.0, 2)]),
                ..DoubleParam::default()
            }],
        },
        longs: LongParamList {
            params: vec![LongParam {
                key: "HP".into(),
                weight_table: IntWeightTable::new(&[(100, 500, 6), (501, 800, 2)]),
                ..LongParam::default()
            }],
        },
        strings: name_param(name),
        transfer_fee: 1232,
    }
}

/// A named item whose `endurance` and `HP` come from programs.
#[must_use]
pub fn item_only_entry_rand(id: &str, name: &str) -> ItemOutput {
    ItemOutput {
        id: id.to_string(),
        doubles: DoubleParamList {
            params: vec![DoubleParam {
                key: "endurance".into(),
                program: "500.00".into(),
                ..DoubleParam::default()
            }],
        },
        longs: LongParamList {
            params: vec![LongParam {
                key: "HP".into(),
                program: "500 + rand(300)".into(),
                ..LongParam::default()
            }],
        },
        strings: name_param(name),
        transfer_fee: 0,
    }
}

fn name_param(value: &str) -> StringParamList {
    StringParamList {
        params: vec![StringParam {
            key: "Name".into(),
            value: value.to_string(),
            program: String::new(),
        }],
    }
}

/// One output set per entry, equally weighted.
#[must_use]
pub fn one_output(entry_ids: &[&str]) -> Vec<WeightedOutputs> {
    entry_ids
        .iter()
        .map(|&id| WeightedOutputs {
            entry_ids: vec![id.to_string()],
            weight: 1,
        })
        .collect()
}

/// A single output set producing every entry.
#[must_use]
pub fn all_output(entry_ids: &[&str]) -> Vec<WeightedOutputs> {
    vec![WeightedOutputs {
        entry_ids: entry_ids.iter().map(|&id| id.to_string()).collect(),
        weight: 1,
    }]
}

/// A coin entry and an item entry with table-driven attributes.
#[must_use]
pub fn entries(coin: &str, item: &str) -> EntriesList {
    EntriesList {
        coin_outputs: vec![coin_only_entry(coin)],
        item_outputs: vec![item_only_entry(item)],
        item_modify_outputs: Vec::new(),
    }
}

/// A coin entry and an item entry with program-driven attributes.
#[must_use]
pub fn entries_rand(coin: &str, item: &str) -> EntriesList {
    EntriesList {
        coin_outputs: vec![coin_only_entry_rand(coin, coin)],
        item_outputs: vec![item_only_entry_rand(item, item)],
        item_modify_outputs: Vec::new(),
    }
}

/// Renames the item bound to `input_ref`. The entry id is `target`.
#[must_use]
pub fn item_name_upgrade(input_ref: &str, target: &str) -> ItemModifyOutput {
    ItemModifyOutput {
        id: target.to_string(),
        item_input_ref: input_ref.to_string(),
        strings: name_param(target),
        ..ItemModifyOutput::default()
    }
}

/// Sets a long attribute on the item bound to `input_ref` to `amount`.
#[must_use]
pub fn modify_long(id: &str, input_ref: &str, key: &str, amount: i64) -> ItemModifyOutput {
    ItemModifyOutput {
        id: id.to_string(),
        item_input_ref: input_ref.to_string(),
        longs: LongParamList {
            params: vec![LongParam {
                key: key.to_string(),
                weight_table: IntWeightTable::new(&[(amount, amount, 1)]),
                ..LongParam::default()
            }],
        },
        ..ItemModifyOutput::default()
    }
}

/// Sets a double attribute on the item bound to `input_ref` to `amount`.
#[must_use]
pub fn modify_double(id: &str, input_ref: &str, key: &str, amount: f64) -> ItemModifyOutput {
    ItemModifyOutput {
        id: id.to_string(),
        item_input_ref: input_ref.to_string(),
        doubles: DoubleParamList {
            params: vec![DoubleParam {
                key: key.to_string(),
                weight_table: DoubleWeightTable::new(&[(amount, amount, 1)]),
                ..DoubleParam::default()
            }],
        },
        ..ItemModifyOutput::default()
    }
}
