//! HTTP surface: one router module per concern, merged flat (no `/api`
//! prefix — paths match the literal external interface table).

pub mod env;
pub mod files;
pub mod generate;
pub mod health;
pub mod process;
pub mod providers;
