//! The style-value expression language.
//!
//! ```text
//! ternary     = or ( "?" ternary ( ":" ternary )? )?
//! or          = and ( "||" and )*
//! and         = comparison ( "&&" comparison )*
//! comparison  = additive ( ( ">" | ">=" | "<" | "<=" | "==" | "!=" ) additive )*
//! additive    = term ( ( "+" | "-" ) term )*
//! term        = power ( ( "*" | "/" | "%" ) power )*
//! power       = unary ( "**" power )?
//! unary       = "-" unary | primary
//! primary     = NUMBER | STRING | selector ( "." property )? | IDENT
//!             | IDENT "(" args ")" | "(" ternary ")"
//! ```

pub use eval::*;
pub use graph::*;
pub use lexer::*;
pub use parser::*;
pub use value::*;

mod eval;
mod graph;
mod lexer;
mod parser;
mod value;
