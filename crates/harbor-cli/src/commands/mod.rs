//! CLI subcommands.

pub(crate) mod config;
pub(crate) mod grants;
pub(crate) mod run;
pub(crate) mod validate;
