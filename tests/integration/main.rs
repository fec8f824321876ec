// tests/integration/main.rs

mod command_roles;
mod error_handling;
mod plan_loading;
