use migration_domain::{DomainError, StoreError};
use thiserror::Error;

// Errores del ejecutor de migraciones.
//
// Centraliza los errores que puede registrar un job de migración: fallos del
// contrato de jobs (`JobError`), del dominio (`DomainError`), del almacén
// (`StoreError`) y de serialización.
#[derive(Error, Debug)]
pub enum MigrationError {
  /// No se pudo obtener una sesión del entorno. Normalmente transitorio.
  #[error("problema obteniendo la sesión de base de datos: {0}")]
  Session(#[source] StoreError),

  /// El update sobre el documento falló (no existe o fue rechazado).
  #[error("problema aplicando la migración: {0}")]
  Update(#[source] StoreError),

  /// Errores del almacén fuera de los dos casos anteriores (por ejemplo al
  /// registrar metadatos).
  #[error("Error de almacenamiento: {0}")]
  Store(#[from] StoreError),

  /// Errores originados por el contrato de jobs.
  #[error("Error de job: {0}")]
  Job(#[from] jobs::JobError),

  /// Errores de validación del dominio.
  #[error("Error de dominio: {0}")]
  Domain(#[from] DomainError),

  /// Errores de serializacion/deserializacion JSON.
  #[error("Error de serializacion: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error("Otro error: {0}")]
  Other(String),
}

impl MigrationError {
  /// `true` cuando el documento objetivo no existía. Un scheduler puede
  /// tratarlo como migración ya aplicada.
  pub fn is_not_found(&self) -> bool {
    match self {
      MigrationError::Update(e) | MigrationError::Store(e) => e.is_not_found(),
      _ => false,
    }
  }
}

impl From<MigrationError> for jobs::JobError {
  fn from(e: MigrationError) -> Self {
    match e {
      MigrationError::Job(inner) => inner,
      MigrationError::Serialization(inner) => jobs::JobError::Serialization(inner),
      other => jobs::JobError::Other(other.to_string()),
    }
  }
}
