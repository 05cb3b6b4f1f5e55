//! IR data model for the semdiff differential function comparator.
//!
//! This crate provides pure IR types with no comparison logic. Inputs are
//! constructed through [`FunctionBuilder`] (IR parsing lives outside this
//! workspace). The comparison engine is implemented in `semdiff-core`.

mod block;
mod builder;
mod function;
mod instr;
mod layout;
mod module;
mod types;
mod validate;
mod value;

pub use block::*;
pub use builder::*;
pub use function::*;
pub use instr::*;
pub use layout::*;
pub use module::*;
pub use types::*;
pub use validate::*;
pub use value::*;
