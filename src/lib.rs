pub mod calendar;
pub mod cli;
pub mod commands;
pub mod config;
pub mod logging;
pub mod model;
pub mod storage;
pub mod ui;
pub mod validate;
