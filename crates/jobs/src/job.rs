// Archivo: job.rs
// Propósito: definir el trait `Job`, el contrato que el scheduler usa para
// ejecutar e inspeccionar un job.
use crate::domain::{JobBase, JobStatus, JobType};
use crate::errors::{JobError, Result};
use serde_json::Value as JsonValue;

/// Unidad de trabajo ejecutable.
///
/// `run` nunca devuelve error: los fallos se acumulan en la `JobBase` y el
/// scheduler los consulta después con `error()` / `status()`.
pub trait Job: Send {
    /// Base compuesta con identidad, estado y errores.
    fn base(&self) -> &JobBase;

    fn base_mut(&mut self) -> &mut JobBase;

    /// Ejecuta el trabajo una vez.
    fn run(&mut self);

    /// Serializa la parte persistible del job (sin colaboradores de
    /// runtime). Es lo que recibe la fábrica del registro al rehidratar.
    fn export(&self) -> Result<JsonValue>;

    fn id(&self) -> &str {
        self.base().id()
    }

    fn job_type(&self) -> &JobType {
        self.base().job_type()
    }

    fn status(&self) -> &JobStatus {
        self.base().status()
    }

    fn error(&self) -> Option<JobError> {
        self.base().error()
    }
}
