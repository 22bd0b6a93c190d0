//! `jspp_core` is the engine of the `jspp` javascript preprocessor. It
//! implements C-preprocessor style conditional compilation, variable
//! substitution and file inclusion driven by directives written in comments,
//! followed by whitespace normalization of the result.
//!
//! ## Processing Pipeline
//!
//! ```text
//! Source text
//!   → Scanner (segments text into directives, comments, strings, regexes and code)
//!   → Conditional stack (decides which segments are emitted)
//!   → Variable store + expression evaluator (`#define`, `#if`, `$_NAME` substitution)
//!   → Inclusion resolver (`#include`, `#include_once`, cycle detection)
//!   → Line compactor (trailing whitespace, empty lines, end of lines, indentation)
//! ```
//!
//! ## Directives
//!
//! ```js
//! //#define DEBUG
//! //#set $_VERSION "1.0.0"
//! //#if DEBUG && $_VERSION !== "0"
//! console.log($_VERSION)
//! //#elif defined(TRACE)
//! //#else
//! //#endif
//! //#include "lib/utils"
//! //#include_once "lib/polyfills.js"
//! //#indent 2s
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use jspp_core::Options;
//! use jspp_core::preprocess_str;
//!
//! let output = preprocess_str("//#define A 2\n//#if A > 1\nyes\n//#endif\n", &Options::default()).unwrap();
//! assert_eq!(output.text, "yes\n");
//! ```

pub use comments::*;
pub use compactor::*;
pub use conditional::*;
pub use config::*;
pub use engine::*;
pub use error::*;
pub use expression::evaluate;
pub use tokens::*;
pub use value::*;
pub use variables::*;

pub mod comments;
pub mod compactor;
pub mod conditional;
pub mod config;
mod engine;
#[allow(unused_assignments)]
mod error;
pub mod expression;
pub mod lexer;
pub mod resolver;
mod tokens;
mod value;
mod variables;

#[cfg(test)]
mod __fixtures;
#[cfg(test)]
mod __tests;
