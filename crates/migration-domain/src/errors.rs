// errors.rs
use thiserror::Error;

/// Errores de construcción y validación de definiciones de migración.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
  #[error("Error de validación: {0}")]
  ValidationError(String),
  #[error("Error de serialización: {0}")]
  SerializationError(String),
}

impl From<serde_json::Error> for DomainError {
  fn from(e: serde_json::Error) -> Self {
    Self::SerializationError(e.to_string())
  }
}

/// Errores devueltos por un `Environment` o una `Session`.
///
/// - `NotFound`: no existe documento con esa clave en el namespace.
/// - `Rejected`: la mutación no se puede aplicar al documento.
/// - `Session`: no se pudo obtener la sesión o ya estaba cerrada.
/// - `Storage`: cualquier otro fallo del almacenamiento subyacente.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
  #[error("Documento no encontrado: {id} en {namespace}")]
  NotFound { namespace: String, id: String },
  #[error("Mutación rechazada: {0}")]
  Rejected(String),
  #[error("Error de sesión: {0}")]
  Session(String),
  #[error("Error de almacenamiento: {0}")]
  Storage(String),
}

impl StoreError {
  /// `true` cuando el error indica que el documento objetivo no existe.
  pub fn is_not_found(&self) -> bool {
    matches!(self, StoreError::NotFound { .. })
  }
}
