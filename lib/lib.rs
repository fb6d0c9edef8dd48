//! Cesk: finding faulting memory accesses with an abstract CESK machine.
//!
//! Cesk analyzes programs in a C-like language, given as an annotated syntax
//! tree, and discovers memory accesses which may fault without ever running
//! the program. The analysis is an abstract Control/Environment/Store/
//! Kontinuation machine stepped to a fixed point by a worklist explorer.
//!
//! Along the way every access to shared memory inside an OpenMP construct is
//! surfaced as an [`explorer::Event`], which a race detector may consume.
//!
//! # Layout
//!
//! * [`ast`] - The input program, and helpers to build programs by hand.
//! * [`domain`] - The abstract value lattice.
//! * [`memory`] - Addresses, blocks, the abstract store and type layouts.
//! * [`machine`] - The small-step abstract machine.
//! * [`explorer`] - The worklist fixed point over machine states.
//!
//! # Example
//!
//! ```
//! use cesk::ast::*;
//!
//! let program = Program::new("main")
//!     .function(Function::new(
//!         "main",
//!         Type::Int,
//!         vec![],
//!         block(vec![
//!             declare("x", Type::Int, None),
//!             ret(Some(ident("x"))),
//!         ]),
//!     ));
//!
//! let report = cesk::analyze(&program, &cesk::Config::default()).unwrap();
//! assert_eq!(report.faults().len(), 1);
//! ```

pub mod ast;
pub mod config;
pub mod domain;
mod error;
pub mod explorer;
pub mod machine;
pub mod memory;
#[cfg(test)]
mod tests;

pub use crate::config::Config;
pub use crate::error::Error;
pub use crate::explorer::{analyze, Explorer, Report};

#[cfg(not(feature = "thread_safe"))]
pub type RC<T> = std::rc::Rc<T>;
#[cfg(feature = "thread_safe")]
pub type RC<T> = std::sync::Arc<T>;
