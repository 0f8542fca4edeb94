//! Call transcript generator
//!
//! Synthesizes multi-turn phone-support conversations between a caller and a
//! bot, including tool invocations and memory writes, and emits them as one
//! JSON document.

pub mod batch;
pub mod blocks;
pub mod catalog;
pub mod composer;
pub mod config;
pub mod factory;
pub mod invariants;
pub mod sink;
