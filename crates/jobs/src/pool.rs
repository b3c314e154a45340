// Archivo: pool.rs
// Propósito: pool local que despacha los jobs pendientes de una cola en
// paralelo. Cada `run` corre en su propio worker de rayon.
use crate::errors::{JobError, Result};
use crate::registry::{JobInterchange, JobRegistry};
use crate::stubs::InMemoryJobQueue;
use rayon::prelude::*;

/// Resultado de un despacho.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Jobs ejecutados (con o sin errores propios).
    pub ran: usize,
    /// Jobs que ya estaban completados y no se volvieron a ejecutar.
    pub skipped: usize,
    /// Jobs que no se pudieron reconstruir o guardar, con su error.
    pub dispatch_failures: Vec<(String, JobError)>,
}

enum Outcome {
    Ran,
    Skipped,
}

/// Pool local de workers.
pub struct LocalWorkerPool {
    workers: usize,
}

impl LocalWorkerPool {
    /// `workers == 0` usa el número de hilos por defecto de rayon.
    pub fn new(workers: usize) -> Self {
        Self { workers }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Ejecuta todos los jobs pendientes de `queue` reconstruyéndolos con
    /// `registry`, y guarda su estado final en la cola.
    pub fn run_pending(&self, queue: &InMemoryJobQueue, registry: &JobRegistry) -> Result<DispatchReport> {
        let batch = queue.drain_pending()?;
        if batch.is_empty() {
            return Ok(DispatchReport::default());
        }
        let pool = rayon::ThreadPoolBuilder::new().num_threads(self.workers)
                                                  .build()
                                                  .map_err(|e| JobError::Other(format!("no se pudo crear el pool: {}", e)))?;
        log::debug!("despachando {} jobs con {} workers", batch.len(), pool.current_num_threads());
        let outcomes: Vec<(String, Result<Outcome>)> =
            pool.install(|| {
                    batch.into_par_iter()
                         .map(|interchange| {
                             let id = interchange.id.clone();
                             (id, dispatch_one(&interchange, queue, registry))
                         })
                         .collect()
                });

        let mut report = DispatchReport::default();
        for (id, outcome) in outcomes {
            match outcome {
                Ok(Outcome::Ran) => report.ran += 1,
                Ok(Outcome::Skipped) => report.skipped += 1,
                Err(err) => {
                    log::warn!("no se pudo despachar el job '{}': {}", id, err);
                    report.dispatch_failures.push((id, err));
                }
            }
        }
        Ok(report)
    }
}

fn dispatch_one(interchange: &JobInterchange, queue: &InMemoryJobQueue, registry: &JobRegistry) -> Result<Outcome> {
    if interchange.status.completed {
        log::debug!("job '{}' ya completado, se omite", interchange.id);
        return Ok(Outcome::Skipped);
    }
    let mut job = registry.rehydrate(interchange)?;
    job.run();
    if let Some(err) = job.error() {
        log::info!("job '{}' terminó con errores: {}", job.id(), err);
    } else {
        log::info!("job '{}' terminó correctamente", job.id());
    }
    queue.complete(&*job)?;
    Ok(Outcome::Ran)
}
