use crate::errors::MigrationError;
use jobs::JobBase;
use migration_domain::{DocumentId, Environment, SessionGuard};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Colaborador de un job de migración: acceso al entorno y notificación de
/// fin.
///
/// Se adjunta al construir o rehidratar el job y nunca se serializa. Un doble
/// de prueba puede sustituir el entorno y capturar las notificaciones.
pub trait MigrationHelper: Send + Sync {
  /// Entorno compartido del proceso.
  fn env(&self) -> Arc<dyn Environment>;

  /// Registra el fin de una invocación de la migración `name`. Se llama
  /// exactamente una vez por invocación, haya ido bien o mal. Un error aquí
  /// no aborta el job: quien llama sólo lo registra en el log.
  fn finish_migration(&self, name: &str, base: &mut JobBase) -> Result<(), MigrationError>;
}

/// Registro de seguimiento que se guarda al terminar cada job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationMetadata {
  #[serde(rename = "_id")]
  pub id: String,
  pub migration: String,
  pub has_errors: bool,
  pub completed: bool,
}

/// Implementación por defecto de `MigrationHelper`.
///
/// `finish_migration` marca el job como completado y hace upsert de un
/// `MigrationMetadata` (clave = id del job) en el namespace de metadatos del
/// entorno.
#[derive(Clone)]
pub struct MigrationBase {
  env: Arc<dyn Environment>,
}

impl MigrationBase {
  pub fn new(env: Arc<dyn Environment>) -> Self {
    Self { env }
  }
}

impl MigrationHelper for MigrationBase {
  fn env(&self) -> Arc<dyn Environment> {
    Arc::clone(&self.env)
  }

  fn finish_migration(&self, name: &str, base: &mut JobBase) -> Result<(), MigrationError> {
    base.mark_complete();
    let meta = MigrationMetadata { id: base.id().to_string(),
                                   migration: name.to_string(),
                                   has_errors: base.has_errors(),
                                   completed: true };
    let ns = self.env.metadata_namespace();
    let mut session = SessionGuard::new(self.env.get_session()?);
    session.db(ns.db())
           .collection(ns.collection())?
           .upsert_by_key(&DocumentId::from(meta.id.clone()), serde_json::to_value(&meta)?)?;
    log::info!("migración '{}' terminada (job '{}', errores: {})", name, meta.id, meta.has_errors);
    Ok(())
  }
}
