//! Interpreter behaviour tests
//!
//! Organized by feature area

mod basic_tests;
mod helpers;
mod resource_tests;
