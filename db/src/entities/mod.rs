//! Row types for the session table and the queries that read and write them.
//!
//! Every query takes an `impl sqlx::Executor` so callers decide whether it runs on the pool,
//! a single connection or a transaction.

pub mod session;
