//! # CRUCIBLE Expression Sandbox
//!
//! Deterministic, bounded evaluation of recipe programs.
//!
//! ## Design Principles
//!
//! 1. **Pure** - No clock, no I/O, no OS entropy
//! 2. **Bounded** - Program length, nesting depth and visited nodes are capped
//! 3. **Reproducible** - Randomness comes from a caller-seeded ChaCha20 stream
//! 4. **Closed coercion** - Numeric widening follows an enumerated table
//!
//! ## Example
//!
//! ```rust
//! use crucible_expr::{DeterministicRng, Limits, Program, Scope, Value};
//!
//! let limits = Limits::default();
//! let program = Program::compile("HP * 2 + rand(10)", &limits).unwrap();
//!
//! let mut scope = Scope::new();
//! scope.insert("HP".to_string(), Value::Int(100));
//!
//! let mut rng = DeterministicRng::from_seed([0u8; 32]);
//! let value = program.eval(&scope, &mut rng, &limits).unwrap();
//! assert!(matches!(value, Value::Int(v) if (200..210).contains(&v)));
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod error;
pub mod eval;
pub mod lexer;
pub mod numeric;
pub mod parser;
pub mod rng;
pub mod value;

pub use error::{ExprError, ExprResult};
pub use eval::{Limits, Program, Scope};
pub use numeric::Numeric;
pub use rng::DeterministicRng;
pub use value::Value;
