//! Integration tests

mod e2e_test;
mod lag_test;
mod query_test;
mod replay_test;
