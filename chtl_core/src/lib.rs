//! `chtl_core` is the compiler library for CHTL, a templated superset of HTML
//! with embedded CSS-like style blocks and an expression language for style
//! values. It turns one CHTL document, together with the files it imports,
//! into a single HTML document with an aggregated stylesheet.
//!
//! ## Processing Pipeline
//!
//! ```text
//! CHTL source
//!   → Scanner (splits out global style / script blocks as fragments)
//!   → Configuration pre-scan (keyword spellings, index base)
//!   → Import graph (loads every imported unit, rejects cycles)
//!   → Parser (builds the tree, registers definitions per namespace)
//!   → Expansion (element templates, specialization, origin usages)
//!   → Style resolution (template merging, `&` rewriting, expressions)
//!   → Generator + merger (HTML, stylesheet, scripts)
//! ```
//!
//! ## Modules
//!
//! - [`scanner`]: Fragment splitting.
//! - [`lexer`] / [`tokens`]: CHTL tokenization with configurable keywords.
//! - [`parser`] / [`ast`]: Recursive-descent parser and the document tree.
//! - [`registry`]: Namespaced template and custom definitions.
//! - [`expand`]: Element-template expansion.
//! - [`expression`]: The style-value expression language and its
//!   dependency-ordered evaluator.
//! - [`config`]: `chtl.toml` loading and in-source `[Configuration]`.
//!
//! ## Quick Start
//!
//! ```rust
//! use chtl_core::CompileOptions;
//! use chtl_core::compile;
//!
//! let source = r#"div { style { .greet { color: green; } } text { "hi" } }"#;
//! let output = compile(source, &CompileOptions::default()).unwrap();
//!
//! assert_eq!(output.body, r#"<div class="greet">hi</div>"#);
//! assert_eq!(output.stylesheet, ".greet { color: green; }");
//! ```
//!
//! ## Lenient and strict mode
//!
//! Usages of unknown definitions and characters the lexer does not
//! recognise are skipped with a [`Warning`] by default. Setting the
//! matching [`Policy`] to `error` (in `chtl.toml` or [`StrictConfig`])
//! turns them into errors instead.

pub use compiler::*;
pub use config::*;
pub use context::*;
pub use diagnostic::*;
pub use error::*;
pub use generator::*;
pub use imports::*;
pub use merger::*;
pub use position::*;
pub use scanner::*;
pub use style::*;

pub mod ast;
mod compiler;
pub mod config;
mod context;
mod diagnostic;
#[allow(unused_assignments)]
mod error;
pub mod expand;
pub mod expression;
mod generator;
mod imports;
pub mod lexer;
mod merger;
pub mod parser;
mod position;
pub mod registry;
pub mod scanner;
mod style;
pub mod tokens;

#[cfg(test)]
mod __fixtures;
#[cfg(test)]
mod __tests;
