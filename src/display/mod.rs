// src/display/mod.rs
//! Display modules for different interfaces

pub mod terminal;

pub use terminal::{PlayerCommand, TerminalDisplay, TerminalView};
