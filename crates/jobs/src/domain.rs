// Archivo: domain.rs
// Propósito: tipos base que comparten todos los jobs (identidad, tipo,
// estado, errores acumulados y tiempos).
use crate::errors::JobError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Formato de serialización del intercambio de un job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Json,
}

/// Identidad del tipo de job que usa el registro para reconstruirlo.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobType {
    pub name: String,
    pub version: u32,
    #[serde(default)]
    pub format: Format,
}

impl JobType {
    pub fn new(name: impl Into<String>, version: u32, format: Format) -> Self {
        Self { name: name.into(),
               version,
               format }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// Estado visible para el orquestador.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JobStatus {
    pub completed: bool,
    pub in_progress: bool,
    /// Errores registrados durante la invocación, en orden. Vacío = éxito.
    #[serde(default)]
    pub errors: Vec<String>,
    pub modified_at: Option<DateTime<Utc>>,
}

/// Marcas de tiempo del ciclo de vida.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobTimeInfo {
    pub created: DateTime<Utc>,
    pub started: Option<DateTime<Utc>>,
    pub finished: Option<DateTime<Utc>>,
}

/// Contrato base que componen los jobs concretos: identidad, metadatos
/// serializables, acumulación de errores y bandera de completado.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobBase {
    id: String,
    job_type: JobType,
    status: JobStatus,
    time_info: JobTimeInfo,
}

impl JobBase {
    /// Crea la base con un id explícito.
    pub fn new(id: impl Into<String>, job_type: JobType) -> Self {
        Self { id: id.into(),
               job_type,
               status: JobStatus::default(),
               time_info: JobTimeInfo { created: Utc::now(),
                                        started: None,
                                        finished: None } }
    }

    /// Crea la base con un id aleatorio (`{tipo}-{uuid}`).
    pub fn with_random_id(job_type: JobType) -> Self {
        let id = format!("{}-{}", job_type.name, Uuid::new_v4());
        Self::new(id, job_type)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    pub fn job_type(&self) -> &JobType {
        &self.job_type
    }

    pub fn status(&self) -> &JobStatus {
        &self.status
    }

    pub fn time_info(&self) -> &JobTimeInfo {
        &self.time_info
    }

    /// Registra un error al final de la lista.
    pub fn add_error(&mut self, err: impl fmt::Display) {
        self.status.errors.push(err.to_string());
        self.touch();
    }

    pub fn has_errors(&self) -> bool {
        !self.status.errors.is_empty()
    }

    pub fn errors(&self) -> &[String] {
        &self.status.errors
    }

    /// Error agregado (`JobError::Failed`) o `None` si no hubo errores.
    pub fn error(&self) -> Option<JobError> {
        if self.status.errors.is_empty() {
            None
        } else {
            Some(JobError::Failed(self.status.errors.join("; ")))
        }
    }

    pub fn mark_started(&mut self) {
        self.status.in_progress = true;
        self.time_info.started = Some(Utc::now());
        self.touch();
    }

    pub fn mark_complete(&mut self) {
        self.status.in_progress = false;
        self.status.completed = true;
        self.time_info.finished = Some(Utc::now());
        self.touch();
    }

    pub fn is_complete(&self) -> bool {
        self.status.completed
    }

    fn touch(&mut self) {
        self.status.modified_at = Some(Utc::now());
    }
}
