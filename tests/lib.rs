//! Shared harness for the integration suites.

pub mod test_helpers;
