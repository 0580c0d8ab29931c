//! Interpreter tests
//!
//! Organized by feature area; every test runs real programs through
//! `Runtime` against in-memory host capabilities.

mod helpers;

mod arith_tests;
mod ecs_tests;
mod error_tests;
mod timer_tests;
