//! Integration tests for the metasync metadata engine

mod cli_contracts;
mod lifecycle_scenarios;
mod reconcile_scenarios;
mod router_scenarios;
mod support;
