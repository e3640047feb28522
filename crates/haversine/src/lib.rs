//! Tools for benchmarking a haversine distance sum over a JSON input.
//!
//! * [`parse`] reads a JSON document with one explicit state machine per
//!   construct, copying strings into a bounded [`Arena`] or borrowing them
//!   from the input.
//! * [`profiler`] measures nested code regions and repeated trials.
//! * [`generator`], [`pairs`] and [`distance`] produce the input, decode the
//!   coordinate pairs and compute the reference answer.
//!
//! ```rust
//! use haversine::{Arena, ParserOptions, distance, generator, pairs, parse};
//!
//! let generated = generator::generate_json(&generator::GeneratorOptions {
//!     count: 100,
//!     ..Default::default()
//! })?;
//!
//! let arena = Arena::with_capacity(1 << 20);
//! let document = parse(generated.json.as_bytes(), &arena, ParserOptions::default())?;
//! let pairs = pairs::decode_pairs(&document)?;
//!
//! assert_eq!(pairs, generated.pairs);
//! assert_eq!(distance::mean_haversine(&pairs), generated.expected_mean);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![allow(missing_docs)]

mod arena;
mod error;
mod options;
mod parser;
mod span;
mod value;

pub mod distance;
pub mod generator;
pub mod pairs;
pub mod profiler;


pub use arena::{Arena, DEFAULT_ARENA_CAPACITY};
pub use error::{ArenaError, Construct, ErrorSource, ObjectFull, ParserError, SyntaxError, TypeMismatch};
pub use options::{DEFAULT_MAX_DEPTH, ParserOptions, StringMode};
pub use parser::{Parser, parse};
pub use span::{Backing, ByteSpan};
pub use value::{DEFAULT_OBJECT_CAPACITY, JsonArray, JsonKind, JsonObject, JsonValue};
