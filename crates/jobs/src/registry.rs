// Archivo: registry.rs
// Propósito: registro de tipos de job (nombre -> fábrica) y representación de
// intercambio con la que un job viaja por la cola.
use crate::domain::{JobStatus, JobType};
use crate::errors::{JobError, Result};
use crate::job::Job;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Fábrica que reconstruye un job a partir de su payload exportado. Es el
/// punto donde se re-adjuntan los colaboradores que no se serializan.
pub type JobFactory = Box<dyn Fn(JsonValue) -> Result<Box<dyn Job>> + Send + Sync>;

/// Representación persistida/encolada de un job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobInterchange {
    pub id: String,
    #[serde(rename = "type")]
    pub job_type: JobType,
    /// Payload producido por `Job::export`.
    pub job: JsonValue,
    pub status: JobStatus,
}

impl JobInterchange {
    pub fn from_job(job: &dyn Job) -> Result<Self> {
        Ok(Self { id: job.id().to_string(),
                  job_type: job.job_type().clone(),
                  job: job.export()?,
                  status: job.status().clone() })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

struct RegisteredType {
    job_type: JobType,
    factory: JobFactory,
}

/// Registro de tipos de job.
///
/// Se inyecta explícitamente donde haga falta (no hay registro global). Es
/// seguro compartirlo entre hilos.
pub struct JobRegistry {
    types: RwLock<HashMap<String, RegisteredType>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self { types: RwLock::new(HashMap::new()) }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, RegisteredType>>> {
        self.types.read().map_err(|e| JobError::Storage(format!("lock poisoned: {:?}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, RegisteredType>>> {
        self.types.write().map_err(|e| JobError::Storage(format!("lock poisoned: {:?}", e)))
    }

    /// Registra `job_type` con su fábrica. Registrar dos veces el mismo
    /// nombre es un error y conserva el primero.
    pub fn add_job_type<F>(&self, job_type: JobType, factory: F) -> Result<()>
        where F: Fn(JsonValue) -> Result<Box<dyn Job>> + Send + Sync + 'static
    {
        let mut types = self.write()?;
        if types.contains_key(&job_type.name) {
            log::warn!("tipo de job '{}' ya registrado", job_type.name);
            return Err(JobError::AlreadyRegistered(job_type.name));
        }
        log::debug!("registrado tipo de job {}", job_type);
        types.insert(job_type.name.clone(),
                     RegisteredType { job_type,
                                      factory: Box::new(factory) });
        Ok(())
    }

    /// Tipo registrado bajo `name`, si existe.
    pub fn job_type(&self, name: &str) -> Result<Option<JobType>> {
        Ok(self.read()?.get(name).map(|r| r.job_type.clone()))
    }

    /// Nombres registrados, ordenados.
    pub fn job_type_names(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.read()?.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    /// Reconstruye un job desde su intercambio. Falla si el tipo no está
    /// registrado o si la versión no coincide con la registrada.
    pub fn rehydrate(&self, interchange: &JobInterchange) -> Result<Box<dyn Job>> {
        let types = self.read()?;
        let registered = types.get(&interchange.job_type.name)
                              .ok_or_else(|| JobError::UnknownJobType(interchange.job_type.name.clone()))?;
        if registered.job_type.version != interchange.job_type.version {
            return Err(JobError::VersionMismatch { name: interchange.job_type.name.clone(),
                                                   registered: registered.job_type.version,
                                                   found: interchange.job_type.version });
        }
        let job = (registered.factory)(interchange.job.clone())?;
        if job.id() != interchange.id {
            return Err(JobError::Other(format!("la fábrica de '{}' devolvió el id '{}' en lugar de '{}'",
                                               interchange.job_type.name,
                                               job.id(),
                                               interchange.id)));
        }
        Ok(job)
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}
