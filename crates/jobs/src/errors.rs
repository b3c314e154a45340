// Archivo: errors.rs
// Propósito: definir los errores del contrato de jobs y el alias Result<T>
// usado por las APIs del crate.
use thiserror::Error;
/// Errores comunes del contrato de jobs.
///
/// - `UnknownJobType`: el registro no conoce el tipo pedido.
/// - `AlreadyRegistered`: se intentó registrar dos veces el mismo tipo.
/// - `VersionMismatch`: el job encolado tiene otra versión que la registrada.
/// - `Duplicate`: ya existe un job con ese id en la cola.
/// - `Failed`: el job terminó con errores acumulados.
#[derive(Error, Debug)]
pub enum JobError {
  #[error("Tipo de job desconocido: {0}")]
  UnknownJobType(String),
  #[error("Tipo de job ya registrado: {0}")]
  AlreadyRegistered(String),
  /// El tipo existe pero con otra versión.
  #[error("Versión incompatible para {name}: registrada {registered}, recibida {found}")]
  VersionMismatch { name: String, registered: u32, found: u32 },
  #[error("Job duplicado: {0}")]
  Duplicate(String),
  /// Errores acumulados durante una invocación, unidos en un único mensaje.
  #[error("Job fallido: {0}")]
  Failed(String),
  /// Fallo al (de)serializar el intercambio de un job.
  #[error("Error de serialización: {0}")]
  Serialization(#[from] serde_json::Error),
  /// Fallo interno del registro, la cola o el pool (por ejemplo un mutex
  /// envenenado).
  #[error("Error de almacenamiento: {0}")]
  Storage(String),
  #[error("Otro: {0}")]
  Other(String),
}
/// Alias de resultado usado por las APIs del crate.
pub type Result<T> = std::result::Result<T, JobError>;
