pub mod commands;
// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

pub use commands::command_argument_builder;
pub use handlers::{
    InitReport, apply_walk_overrides, build_client, config_path, init_workspace, load_settings,
    walk_options,
};

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);
