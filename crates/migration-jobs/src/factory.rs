use crate::errors::MigrationError;
use crate::helper::MigrationHelper;
use crate::simple::{simple_migration_type, SimpleMigrationJob, SimpleMigrationRecord};
use jobs::{Job, JobRegistry};
use std::sync::Arc;

/// Registra los tipos de job de migración en `registry`.
///
/// La fábrica deserializa el registro y re-adjunta `helper`, que es el único
/// colaborador que no viaja con el job. Registrar dos veces sobre el mismo
/// registro devuelve `JobError::AlreadyRegistered`.
pub fn register_migration_jobs(registry: &JobRegistry, helper: Arc<dyn MigrationHelper>) -> Result<(), MigrationError> {
  registry.add_job_type(simple_migration_type(), move |payload| {
            let record: SimpleMigrationRecord = serde_json::from_value(payload)?;
            let job = SimpleMigrationJob::from_record(Arc::clone(&helper), record)?;
            Ok(Box::new(job) as Box<dyn Job>)
          })?;
  Ok(())
}
