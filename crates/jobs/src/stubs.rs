// Archivo: stubs.rs
// Propósito: cola en memoria para pruebas y wiring rápido.
//
// No garantiza durabilidad ni comportamiento distribuido: basta para encolar
// jobs, deduplicarlos por id y guardar su estado final.
use crate::errors::{JobError, Result};
use crate::job::Job;
use crate::registry::JobInterchange;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

/// Contadores de la cola.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueStats {
    pub total: usize,
    pub pending: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Cola en memoria de intercambios de job.
#[derive(Debug, Default)]
pub struct InMemoryJobQueue {
    pending: Mutex<VecDeque<String>>,
    /// Último intercambio conocido por id de job.
    jobs: Mutex<HashMap<String, JobInterchange>>,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock<'a, T>(&'a self, m: &'a Mutex<T>) -> Result<MutexGuard<'a, T>> {
        m.lock().map_err(|e| JobError::Storage(format!("mutex poisoned: {:?}", e)))
    }

    /// Encola un job. Un id ya conocido (pendiente o terminado) se rechaza
    /// con `JobError::Duplicate`.
    pub fn put(&self, job: &dyn Job) -> Result<()> {
        let interchange = JobInterchange::from_job(job)?;
        self.put_interchange(interchange)
    }

    /// Igual que `put` pero con un intercambio ya serializado.
    pub fn put_interchange(&self, interchange: JobInterchange) -> Result<()> {
        let mut jobs = self.lock(&self.jobs)?;
        if jobs.contains_key(&interchange.id) {
            return Err(JobError::Duplicate(interchange.id));
        }
        let mut pending = self.lock(&self.pending)?;
        pending.push_back(interchange.id.clone());
        jobs.insert(interchange.id.clone(), interchange);
        Ok(())
    }

    /// Reclama el siguiente job pendiente, si existe.
    pub fn next(&self) -> Result<Option<JobInterchange>> {
        let jobs = self.lock(&self.jobs)?;
        let mut pending = self.lock(&self.pending)?;
        Ok(pending.pop_front().and_then(|id| jobs.get(&id).cloned()))
    }

    /// Saca todos los pendientes de una vez.
    pub fn drain_pending(&self) -> Result<Vec<JobInterchange>> {
        let jobs = self.lock(&self.jobs)?;
        let mut pending = self.lock(&self.pending)?;
        Ok(pending.drain(..).filter_map(|id| jobs.get(&id).cloned()).collect())
    }

    /// Guarda el estado final de un job ya ejecutado.
    pub fn complete(&self, job: &dyn Job) -> Result<()> {
        let interchange = JobInterchange::from_job(job)?;
        let mut jobs = self.lock(&self.jobs)?;
        if !jobs.contains_key(&interchange.id) {
            log::warn!("se completó el job '{}' que no estaba en la cola", interchange.id);
        }
        jobs.insert(interchange.id.clone(), interchange);
        Ok(())
    }

    /// Último intercambio conocido para `id`.
    pub fn get(&self, id: &str) -> Result<Option<JobInterchange>> {
        Ok(self.lock(&self.jobs)?.get(id).cloned())
    }

    /// Todos los intercambios conocidos, ordenados por id.
    pub fn jobs(&self) -> Result<Vec<JobInterchange>> {
        let mut all: Vec<JobInterchange> = self.lock(&self.jobs)?.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }

    pub fn stats(&self) -> Result<QueueStats> {
        let jobs = self.lock(&self.jobs)?;
        let pending = self.lock(&self.pending)?;
        let completed = jobs.values().filter(|j| j.status.completed).count();
        let failed = jobs.values().filter(|j| j.status.completed && !j.status.errors.is_empty()).count();
        Ok(QueueStats { total: jobs.len(),
                        pending: pending.len(),
                        completed,
                        failed })
    }
}
