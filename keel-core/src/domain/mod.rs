//! Core domain types
//!
//! These types describe a stage the way an external pipeline engine consumes it.
//! They are shared between the Lua definition loader (which builds them) and
//! the CLI (which validates, prints and exports them).

pub mod arguments;
pub mod dependency;
pub mod parameter;
pub mod stage;
pub mod step;
