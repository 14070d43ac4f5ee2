//! Subcommand implementations

pub mod evaluate;
pub mod inspect;
pub mod predict;
