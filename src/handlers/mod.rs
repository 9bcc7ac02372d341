pub mod health_handlers;
pub mod migration_handlers;
