//! Router integration tests.

mod operations_test;
mod routing_test;
