//! CLI domain: parse, route and output only.
//! No engine orchestration beyond what each command needs.

mod output;
mod parse;
mod route;

pub use output::{format_demo_report, format_health_report, map_error};
pub use parse::{Cli, Commands};
pub use route::RunContext;
