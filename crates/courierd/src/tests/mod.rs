//! Agent-level tests and shared fixtures.

mod support;
