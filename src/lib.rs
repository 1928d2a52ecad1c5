pub mod cli;
pub mod complete_command;
pub mod error;
pub mod fetch;
pub mod history;
pub mod interpreter;
pub mod manual;
pub mod parser;
pub mod repl;
pub mod repl_v2;
pub mod resolver;
pub mod system;
pub mod vfs;
