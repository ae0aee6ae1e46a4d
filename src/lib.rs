pub mod agent;
pub mod ai;
pub mod blocks;
pub mod config;
pub mod controller;
pub mod errors;
pub mod exec;
pub mod git;
pub mod logging;
pub mod notify;
pub mod process;
pub mod stream;
pub mod supervisor;
pub mod util;
