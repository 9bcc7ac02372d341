pub mod bootstrap;
pub mod listing;
pub mod migration_service;
pub mod transfer;
