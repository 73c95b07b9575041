//! Integration tests for the repository migration

mod migration_scenarios;
mod pack_properties;
mod runner_records;
mod support;
