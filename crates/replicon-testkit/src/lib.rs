//! Shared fixtures for scenario tests: domain-row builders, a broker
//! wrapper that injects per-follower rejection, and a harness that wires a
//! real `WorkerContext` against Postgres + Redis (skipped, never faked,
//! when either is unavailable — see `harness::test_env_from_env`).

pub mod fault_broker;
pub mod fixtures;
pub mod harness;

pub use fault_broker::RejectingBroker;
pub use harness::{build_worker_context, purge_fixtures_with_prefix, test_env_from_env, TestEnv};
