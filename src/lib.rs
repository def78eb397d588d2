pub mod agent;
pub mod cli;
pub mod codegen;
pub mod config;
pub mod error;
pub mod exec;
pub mod orchestration;
pub mod provider;
pub mod repl;
pub mod safety;
pub mod tools;
