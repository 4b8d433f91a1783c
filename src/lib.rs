pub mod aggregate;
pub mod cli;
pub mod config;
pub mod discovery;
pub mod host;
pub mod logging;
pub mod manifest;
pub mod output;
pub mod parsers;
pub mod report;
pub mod snapshot;
pub mod time;
