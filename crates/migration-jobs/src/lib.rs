//! migration-jobs: jobs de migración de documentos
//!
//! Define el job `simple-migration` (aplica un update a un documento), el
//! contrato `MigrationHelper` con su implementación por defecto y el registro
//! de estos tipos en un `jobs::JobRegistry`.

pub mod errors;
pub mod factory;
pub mod helper;
pub mod simple;

pub use errors::MigrationError;
pub use factory::register_migration_jobs;
pub use helper::{MigrationBase, MigrationHelper, MigrationMetadata};
pub use simple::{simple_migration_id, simple_migration_type, SimpleMigrationJob, SimpleMigrationRecord, SIMPLE_MIGRATION};
