pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod futures_pdf;
pub mod market;
pub mod report;
pub mod scanner;
pub mod spot_table;
pub mod verify;
