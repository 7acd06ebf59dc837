//! Effect interpreter
//!
//! Trampolined evaluation of effect nodes. One `interpret` call drives one node tree to an
//! exit under one interruption token.

mod exec_loop;
mod frames;
mod group;

pub(crate) use exec_loop::{interpret, LoopSettings};

#[cfg(test)]
mod tests;
