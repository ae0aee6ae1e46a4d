//! CLI command implementations.
//!
//! | Module   | Commands handled |
//! |----------|------------------|
//! | `run`    | `Run`, `Exec`    |
//! | `config` | `Config`         |

pub mod config;
pub mod run;

pub use config::cmd_config;
pub use run::{cmd_exec, cmd_run};
