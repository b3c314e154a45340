use migration_domain::{DomainError, StoreError};
use thiserror::Error;

/// Errores al configurar o abrir la persistencia. Una vez abierto el
/// entorno, las operaciones devuelven `StoreError` como cualquier otro
/// `Environment`.
#[derive(Error, Debug)]
pub enum PersistenceError {
  /// Variables de entorno ausentes o con valores inválidos.
  #[error("Error de configuración: {0}")]
  Config(String),

  #[error("Error de dominio: {0}")]
  Domain(#[from] DomainError),

  /// Fallos al crear el pool o aplicar las migraciones del esquema.
  #[error("Error de almacenamiento: {0}")]
  Store(#[from] StoreError),
}
