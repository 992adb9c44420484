//! Query language: AST, fingerprints, text grammar and formatting.
//!
//! The surface is deliberately small: equality, negation, conjunction,
//! disjunction, and an optional group-by field list.
//!
//! ```text
//! country = "DE" & active = "true" ; city
//! ^ ( country = "DE" | country = "FR" )
//! country = $1 ; city
//! ```
//!
//! # Example
//!
//! ```
//! use tally_core::query::Parser;
//!
//! let query = Parser::parse(r#"country = $1 ; city"#).unwrap();
//! let bound = query.bind(&["DE".to_string()]).unwrap();
//! assert_eq!(bound.to_string(), r#"country = "DE" ; city"#);
//! ```

mod ast;
mod error;
mod format;
mod parser;
mod walk;

pub use ast::{EqValue, Expression, Query};
pub use error::{ParseError, ParseErrorKind};
pub use parser::Parser;
pub use walk::walk;
