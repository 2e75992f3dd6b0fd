pub mod cli;
pub mod command;
pub mod data;
pub mod help;
pub mod namespace;
pub mod sys;
pub mod types;
