// Archivo: simple.rs
// Propósito: job `simple-migration`, que aplica un único update a un único
// documento identificado por namespace + id.
use crate::errors::MigrationError;
use crate::helper::{MigrationBase, MigrationHelper};
use jobs::{Format, Job, JobBase, JobType};
use migration_domain::{Environment, MigrationDefinition, SessionGuard};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;

/// Nombre registrado del tipo de job.
pub const SIMPLE_MIGRATION: &str = "simple-migration";

/// Tipo `simple-migration`, versión 0, formato JSON.
pub fn simple_migration_type() -> JobType {
  JobType::new(SIMPLE_MIGRATION, 0, Format::Json)
}

/// Id determinista del job: el arreglo JSON `[migración, db, colección, id]`.
/// El id del documento conserva su tipo (`1` y `"1"` son jobs distintos) y
/// los puntos dentro de los nombres no se confunden con separadores. Dos
/// definiciones iguales producen el mismo id y la cola las deduplica.
pub fn simple_migration_id(definition: &MigrationDefinition) -> String {
  let ns = definition.namespace();
  json!([definition.migration(), ns.db(), ns.collection(), definition.id().to_json()]).to_string()
}

/// Parte serializable del job. Es lo que viaja en `JobInterchange::job`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleMigrationRecord {
  #[serde(rename = "migration")]
  pub definition: MigrationDefinition,
  #[serde(rename = "job_base")]
  pub base: JobBase,
}

/// Job ejecutable: el registro de datos más el helper, que no se serializa.
pub struct SimpleMigrationJob {
  record: SimpleMigrationRecord,
  helper: Arc<dyn MigrationHelper>,
}

impl SimpleMigrationJob {
  /// Crea el job con el helper por defecto (`MigrationBase`) sobre `env`.
  pub fn new(env: Arc<dyn Environment>, definition: MigrationDefinition) -> Self {
    Self::with_helper(Arc::new(MigrationBase::new(env)), definition)
  }

  pub fn with_helper(helper: Arc<dyn MigrationHelper>, definition: MigrationDefinition) -> Self {
    let base = JobBase::new(simple_migration_id(&definition), simple_migration_type());
    Self { record: SimpleMigrationRecord { definition, base },
           helper }
  }

  /// Reconstruye el job desde un registro deserializado, re-adjuntando el
  /// helper. Rechaza registros de otro tipo de job.
  pub fn from_record(helper: Arc<dyn MigrationHelper>, record: SimpleMigrationRecord) -> Result<Self, MigrationError> {
    let found = record.base.job_type();
    if found.name != SIMPLE_MIGRATION {
      return Err(MigrationError::Other(format!("se esperaba un job '{}', llegó '{}'", SIMPLE_MIGRATION, found)));
    }
    Ok(Self { record, helper })
  }

  pub fn definition(&self) -> &MigrationDefinition {
    &self.record.definition
  }

  pub fn record(&self) -> &SimpleMigrationRecord {
    &self.record
  }
}

/// Notifica el fin de la invocación al salir de `run`, por cualquier camino.
struct CompletionGuard<'a> {
  helper: &'a dyn MigrationHelper,
  migration: &'a str,
  base: &'a mut JobBase,
}

impl CompletionGuard<'_> {
  fn base(&mut self) -> &mut JobBase {
    &mut *self.base
  }
}

impl Drop for CompletionGuard<'_> {
  fn drop(&mut self) {
    if let Err(err) = self.helper.finish_migration(self.migration, &mut *self.base) {
      log::warn!("no se pudo registrar el fin de la migración '{}' (job '{}'): {}",
                 self.migration,
                 self.base.id(),
                 err);
    }
  }
}

impl Job for SimpleMigrationJob {
  fn base(&self) -> &JobBase {
    &self.record.base
  }

  fn base_mut(&mut self) -> &mut JobBase {
    &mut self.record.base
  }

  fn run(&mut self) {
    let SimpleMigrationRecord { definition, base } = &mut self.record;
    let definition: &MigrationDefinition = definition;
    // Se declara antes que la sesión: al salir, la sesión se libera primero.
    let mut completion = CompletionGuard { helper: self.helper.as_ref(),
                                           migration: definition.migration(),
                                           base };
    completion.base().mark_started();

    let env = self.helper.env();
    let session = match env.get_session() {
      Ok(session) => session,
      Err(err) => {
        log::debug!("job '{}': sin sesión: {}", completion.base().id(), err);
        completion.base().add_error(MigrationError::Session(err));
        return;
      }
    };
    let mut session = SessionGuard::new(session);

    let ns = definition.namespace();
    let applied = session.db(ns.db())
                         .collection(ns.collection())
                         .and_then(|mut coll| coll.update_by_key(definition.id(), definition.update()));
    match applied {
      Ok(()) => log::debug!("job '{}': update aplicado sobre {}", completion.base().id(), ns),
      Err(err) => completion.base().add_error(MigrationError::Update(err)),
    }
  }

  fn export(&self) -> jobs::Result<JsonValue> {
    Ok(serde_json::to_value(&self.record)?)
  }
}
