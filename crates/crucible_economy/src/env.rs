//! # Expression Environment
//!
//! Per-call evaluation context binding item attributes and deterministic
//! built-ins to recipe programs.
//!
//! ## Seeding
//!
//! Every environment owns one ChaCha20 stream. Its seed is a SipHash-2-4
//! digest over data every validator already agrees on:
//!
//! ```text
//! seed = SipHash128(domain, cookbook_id, recipe_id, output_id, block_height,
//!                   for each bound item in slot order:
//!                       id, doubles, longs, strings (each key-sorted))
//! ```
//!
//! Strings are length-prefixed and integers little-endian, so the
//! encoding is unambiguous and platform independent. Two 128-bit digests
//! with distinct lane tags fill the 32-byte seed.
//!
//! ## Bindings
//!
//! - `input0.<field>`, `input1.<field>`, ... for each bound item
//! - `<field>` directly when exactly one item is bound
//! - `recipe_id`, `cookbook_id`, `output_id`, and `block_height` when known

use std::collections::HashMap;
use std::hash::Hasher;

use crucible_expr::numeric::integral_f64_to_i64;
use crucible_expr::{DeterministicRng, ExprError, ExprResult, Limits, Numeric, Program, Scope, Value};
use siphasher::sip128::{Hasher128, SipHasher24};

use crate::config::EngineConfig;
use crate::error::RecipeResult;
use crate::item::ItemRecord;

/// Fixed SipHash keys. The seed's secrecy is not a goal, only agreement.
const SEED_KEY_0: u64 = 0x6372_7563_6962_6c65;
const SEED_KEY_1: u64 = 0x7265_6369_7065_7321;

/// Context shared by every program evaluated in one environment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EnvContext<'a> {
    /// Cookbook of the recipe being executed.
    pub cookbook_id: &'a str,
    /// Recipe being executed.
    pub recipe_id: &'a str,
    /// Output entry the environment serves; empty while matching.
    pub output_id: &'a str,
    /// Block height the execution was submitted at.
    pub block_height: Option<u64>,
}

/// Typed evaluation over program strings.
pub trait Environment {
    /// Evaluates to a float, widening numeric results.
    ///
    /// # Errors
    ///
    /// Any lex, parse, evaluation or conversion error.
    fn eval_float(&mut self, program: &str) -> ExprResult<f64>;

    /// Evaluates to an integer. Integral floats are narrowed.
    ///
    /// # Errors
    ///
    /// Any lex, parse, evaluation or conversion error.
    fn eval_int(&mut self, program: &str) -> ExprResult<i64>;

    /// Evaluates to a string.
    ///
    /// # Errors
    ///
    /// Any lex, parse or evaluation error, or a non-string result.
    fn eval_string(&mut self, program: &str) -> ExprResult<String>;

    /// The environment's random stream, shared with the weighted sampler.
    fn rng(&mut self) -> &mut DeterministicRng;
}

/// Builds environments.
pub trait EnvFactory {
    /// Environment type produced.
    type Env: Environment;

    /// Creates a fresh environment bound to `items` in slot order.
    ///
    /// # Errors
    ///
    /// Implementations may reject contexts they cannot bind.
    fn build(&self, ctx: &EnvContext<'_>, items: &[ItemRecord]) -> RecipeResult<Self::Env>;
}

/// Default environment backed by the `crucible_expr` sandbox.
#[derive(Debug)]
pub struct ExprEnv {
    scope: Scope,
    rng: DeterministicRng,
    limits: Limits,
    programs: HashMap<String, Program>,
}

impl ExprEnv {
    /// Evaluates a program to an untyped value.
    ///
    /// Compiled programs are cached for the lifetime of this environment.
    ///
    /// # Errors
    ///
    /// Any lex, parse or evaluation error.
    pub fn eval(&mut self, program: &str) -> ExprResult<Value> {
        if !self.programs.contains_key(program) {
            let compiled = Program::compile(program, &self.limits)?;
            self.programs.insert(program.to_string(), compiled);
        }
        let compiled = &self.programs[program];
        compiled.eval(&self.scope, &mut self.rng, &self.limits)
    }

    /// Bindings visible to programs.
    #[must_use]
    pub fn scope(&self) -> &Scope {
        &self.scope
    }
}

impl Environment for ExprEnv {
    fn eval_float(&mut self, program: &str) -> ExprResult<f64> {
        let value = self.eval(program)?;
        Numeric::from_value(&value)?.to_f64()
    }

    fn eval_int(&mut self, program: &str) -> ExprResult<i64> {
        match self.eval(program)? {
            Value::Int(v) => Ok(v),
            Value::Float(f) => integral_f64_to_i64(f),
            other => Err(ExprError::Type(format!("expected int result, got {}", other.kind()))),
        }
    }

    fn eval_string(&mut self, program: &str) -> ExprResult<String> {
        match self.eval(program)? {
            Value::Str(s) => Ok(s),
            other => Err(ExprError::Type(format!("expected string result, got {}", other.kind()))),
        }
    }

    fn rng(&mut self) -> &mut DeterministicRng {
        &mut self.rng
    }
}

/// Factory for [`ExprEnv`], configured once per engine.
#[derive(Clone, Debug, Default)]
pub struct ExprEnvFactory {
    limits: Limits,
    seed_domain: String,
}

impl ExprEnvFactory {
    /// Creates a factory from engine settings.
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            limits: config.limits,
            seed_domain: config.seed_domain.clone(),
        }
    }
}

impl EnvFactory for ExprEnvFactory {
    type Env = ExprEnv;

    fn build(&self, ctx: &EnvContext<'_>, items: &[ItemRecord]) -> RecipeResult<ExprEnv> {
        Ok(ExprEnv {
            scope: build_scope(ctx, items),
            rng: DeterministicRng::from_seed(derive_seed(&self.seed_domain, ctx, items)),
            limits: self.limits,
            programs: HashMap::new(),
        })
    }
}

fn bind_item(scope: &mut Scope, prefix: &str, item: &ItemRecord) {
    for kv in &item.doubles {
        scope.insert(format!("{prefix}{}", kv.key), Value::Float(kv.value));
    }
    for kv in &item.longs {
        scope.insert(format!("{prefix}{}", kv.key), Value::Int(kv.value));
    }
    for kv in &item.strings {
        scope.insert(format!("{prefix}{}", kv.key), Value::Str(kv.value.clone()));
    }
}

/// Builds the variable bindings for an environment.
#[must_use]
pub fn build_scope(ctx: &EnvContext<'_>, items: &[ItemRecord]) -> Scope {
    let mut scope = Scope::new();
    if let [only] = items {
        bind_item(&mut scope, "", only);
    }
    for (i, item) in items.iter().enumerate() {
        bind_item(&mut scope, &format!("input{i}."), item);
    }

    scope.insert("recipe_id".into(), Value::from(ctx.recipe_id));
    scope.insert("cookbook_id".into(), Value::from(ctx.cookbook_id));
    scope.insert("output_id".into(), Value::from(ctx.output_id));
    if let Some(height) = ctx.block_height.and_then(|h| i64::try_from(h).ok()) {
        scope.insert("block_height".into(), Value::Int(height));
    }
    scope
}

/// Canonical, length-prefixed writer over a 128-bit SipHash.
struct SeedWriter(SipHasher24);

impl SeedWriter {
    fn new(lane: u8) -> Self {
        let mut h = SipHasher24::new_with_keys(SEED_KEY_0, SEED_KEY_1);
        h.write(&[lane]);
        Self(h)
    }

    fn u64(&mut self, v: u64) {
        self.0.write(&v.to_le_bytes());
    }

    fn bytes(&mut self, b: &[u8]) {
        self.u64(b.len() as u64);
        self.0.write(b);
    }

    fn str(&mut self, s: &str) {
        self.bytes(s.as_bytes());
    }

    fn item(&mut self, item: &ItemRecord) {
        self.str(&item.id);

        let mut doubles: Vec<_> = item.doubles.iter().collect();
        doubles.sort_by(|a, b| a.key.cmp(&b.key));
        self.u64(doubles.len() as u64);
        for kv in doubles {
            self.str(&kv.key);
            self.u64(kv.value.to_bits());
        }

        let mut longs: Vec<_> = item.longs.iter().collect();
        longs.sort_by(|a, b| a.key.cmp(&b.key));
        self.u64(longs.len() as u64);
        for kv in longs {
            self.str(&kv.key);
            self.0.write(&kv.value.to_le_bytes());
        }

        let mut strings: Vec<_> = item.strings.iter().collect();
        strings.sort_by(|a, b| a.key.cmp(&b.key));
        self.u64(strings.len() as u64);
        for kv in strings {
            self.str(&kv.key);
            self.str(&kv.value);
        }
    }

    fn finish(&self) -> [u8; 16] {
        let h = self.0.finish128();
        let mut out = [0u8; 16];
        out[..8].copy_from_slice(&h.h1.to_le_bytes());
        out[8..].copy_from_slice(&h.h2.to_le_bytes());
        out
    }
}

/// Derives the 256-bit generator seed for an environment.
///
/// Depends only on the arguments; see the module docs for the encoding.
#[must_use]
pub fn derive_seed(domain: &str, ctx: &EnvContext<'_>, items: &[ItemRecord]) -> [u8; 32] {
    let mut seed = [0u8; 32];
    for (lane, chunk) in seed.chunks_exact_mut(16).enumerate() {
        #[allow(clippy::cast_possible_truncation)]
        let mut w = SeedWriter::new(lane as u8);
        w.str(domain);
        w.str(ctx.cookbook_id);
        w.str(ctx.recipe_id);
        w.str(ctx.output_id);
        match ctx.block_height {
            Some(h) => {
                w.0.write(&[1]);
                w.u64(h);
            }
            None => w.0.write(&[0]),
        }
        w.u64(items.len() as u64);
        for item in items {
            w.item(item);
        }
        chunk.copy_from_slice(&w.finish());
    }
    seed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::Item;

    fn ctx(output_id: &str) -> EnvContext<'_> {
        EnvContext {
            cookbook_id: "cb",
            recipe_id: "forge",
            output_id,
            block_height: Some(42),
        }
    }

    fn sword() -> ItemRecord {
        Item::new("cb", "sword1")
            .with_string("Name", "sword")
            .with_long("HP", 150)
            .with_double("attack", 2.5)
            .snapshot()
    }

    fn factory() -> ExprEnvFactory {
        ExprEnvFactory::new(&EngineConfig::default())
    }

    #[test]
    fn test_single_item_binds_bare_and_prefixed_fields() {
        let mut env = factory().build(&ctx(""), &[sword()]).unwrap();
        assert_eq!(env.eval_int("HP + input0.HP").unwrap(), 300);
        assert_eq!(env.eval_float("attack").unwrap(), 2.5);
        assert_eq!(env.eval_string("Name").unwrap(), "sword");
        assert_eq!(env.eval_string("recipe_id").unwrap(), "forge");
        assert_eq!(env.eval_int("block_height").unwrap(), 42);
    }

    #[test]
    fn test_multi_item_binds_only_prefixed_fields() {
        let shield = Item::new("cb", "shield1").with_long("HP", 10).snapshot();
        let mut env = factory().build(&ctx(""), &[sword(), shield]).unwrap();
        assert_eq!(env.eval_int("input0.HP + input1.HP").unwrap(), 160);
        assert!(matches!(env.eval_int("HP"), Err(ExprError::Unbound(_))));
    }

    #[test]
    fn test_typed_results() {
        let mut env = factory().build(&ctx(""), &[sword()]).unwrap();
        assert_eq!(env.eval_float("HP").unwrap(), 150.0);
        assert_eq!(env.eval_int("2.0 * 3").unwrap(), 6);
        assert!(env.eval_int("2.5").is_err());
        assert!(env.eval_string("HP").is_err());
        assert!(env.eval_float("Name").is_err());
    }

    #[test]
    fn test_seed_is_stable_and_sensitive() {
        let items = [sword()];
        let a = derive_seed("d", &ctx("out"), &items);
        assert_eq!(a, derive_seed("d", &ctx("out"), &items));
        assert_ne!(a, derive_seed("d2", &ctx("out"), &items));
        assert_ne!(a, derive_seed("d", &ctx("other"), &items));

        let mut changed = sword();
        changed.set_long("HP", 151);
        assert_ne!(a, derive_seed("d", &ctx("out"), &[changed]));

        let no_height = EnvContext {
            block_height: None,
            ..ctx("out")
        };
        assert_ne!(a, derive_seed("d", &no_height, &items));
    }

    #[test]
    fn test_seed_ignores_attribute_order() {
        let a = Item::new("cb", "x").with_long("a", 1).with_long("b", 2).snapshot();
        let b = Item::new("cb", "x").with_long("b", 2).with_long("a", 1).snapshot();
        assert_eq!(derive_seed("d", &ctx(""), &[a]), derive_seed("d", &ctx(""), &[b]));
    }

    #[test]
    fn test_rand_reproducible_across_environments() {
        let f = factory();
        let mut e1 = f.build(&ctx("coins"), &[sword()]).unwrap();
        let mut e2 = f.build(&ctx("coins"), &[sword()]).unwrap();
        for _ in 0..10 {
            assert_eq!(e1.eval_int("rand(1000)").unwrap(), e2.eval_int("rand(1000)").unwrap());
        }
    }
}
