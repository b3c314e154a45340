// Archivo: stubs.rs
// Propósito: entorno en memoria para pruebas y wiring rápido. No es durable.
use crate::definition::{DocumentId, Namespace};
use crate::environment::{with_document_id, Environment, Session};
use crate::update::Update;
use crate::StoreError;
use dashmap::DashMap;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

struct InMemoryStore {
  /// Documentos por namespace, indexados por `DocumentId::storage_key`.
  collections: DashMap<Namespace, BTreeMap<String, JsonValue>>,
  metadata_namespace: Namespace,
  /// Si contiene un mensaje, `get_session` falla con él.
  session_failure: Mutex<Option<String>>,
  sessions_opened: AtomicUsize,
  sessions_released: AtomicUsize,
  update_attempts: AtomicUsize,
}

/// Entorno en memoria. Clonarlo comparte el mismo almacén.
///
/// Además de servir como almacén lleva contadores de sesiones abiertas y
/// liberadas y de intentos de update, para que las pruebas puedan verificar
/// el ciclo de vida de las sesiones.
#[derive(Clone)]
pub struct InMemoryEnvironment {
  inner: Arc<InMemoryStore>,
}

impl InMemoryEnvironment {
  pub fn new() -> Self {
    Self::with_metadata_namespace(Namespace::default_metadata())
  }

  pub fn with_metadata_namespace(metadata_namespace: Namespace) -> Self {
    Self { inner: Arc::new(InMemoryStore { collections: DashMap::new(),
                                           metadata_namespace,
                                           session_failure: Mutex::new(None),
                                           sessions_opened: AtomicUsize::new(0),
                                           sessions_released: AtomicUsize::new(0),
                                           update_attempts: AtomicUsize::new(0) }) }
  }

  /// Hace que las siguientes llamadas a `get_session` fallen con `message`
  /// (o vuelvan a funcionar con `None`).
  pub fn fail_sessions(&self, message: Option<&str>) {
    *self.inner.session_failure.lock().unwrap_or_else(|e| e.into_inner()) = message.map(|m| m.to_string());
  }

  /// Inserta o reemplaza un documento directamente, sin pasar por sesión.
  pub fn insert_document(&self, namespace: &Namespace, id: &DocumentId, document: JsonValue) -> Result<(), StoreError> {
    let body = with_document_id(id, document)?;
    self.inner.collections.entry(namespace.clone()).or_default().insert(id.storage_key(), body);
    Ok(())
  }

  /// Lee un documento directamente, sin pasar por sesión.
  pub fn document(&self, namespace: &Namespace, id: &DocumentId) -> Option<JsonValue> {
    self.inner.collections.get(namespace).and_then(|c| c.get(&id.storage_key()).cloned())
  }

  pub fn sessions_opened(&self) -> usize {
    self.inner.sessions_opened.load(Ordering::SeqCst)
  }

  pub fn sessions_released(&self) -> usize {
    self.inner.sessions_released.load(Ordering::SeqCst)
  }

  pub fn update_attempts(&self) -> usize {
    self.inner.update_attempts.load(Ordering::SeqCst)
  }
}

impl Default for InMemoryEnvironment {
  fn default() -> Self {
    Self::new()
  }
}

impl Environment for InMemoryEnvironment {
  fn get_session(&self) -> Result<Box<dyn Session>, StoreError> {
    let failure = self.inner.session_failure.lock().map_err(|e| StoreError::Session(format!("mutex poisoned: {:?}", e)))?;
    if let Some(message) = failure.as_ref() {
      return Err(StoreError::Session(message.clone()));
    }
    self.inner.sessions_opened.fetch_add(1, Ordering::SeqCst);
    Ok(Box::new(InMemorySession { store: Arc::clone(&self.inner),
                                  closed: false }))
  }

  fn metadata_namespace(&self) -> Namespace {
    self.inner.metadata_namespace.clone()
  }
}

struct InMemorySession {
  store: Arc<InMemoryStore>,
  closed: bool,
}

impl InMemorySession {
  fn store(&self) -> Result<&InMemoryStore, StoreError> {
    if self.closed {
      return Err(StoreError::Session("sesión cerrada".into()));
    }
    Ok(&self.store)
  }
}

impl Session for InMemorySession {
  fn find_by_key(&mut self, namespace: &Namespace, id: &DocumentId) -> Result<Option<JsonValue>, StoreError> {
    let store = self.store()?;
    Ok(store.collections.get(namespace).and_then(|c| c.get(&id.storage_key()).cloned()))
  }

  fn update_by_key(&mut self, namespace: &Namespace, id: &DocumentId, update: &Update) -> Result<(), StoreError> {
    let store = self.store()?;
    store.update_attempts.fetch_add(1, Ordering::SeqCst);
    let not_found = || StoreError::NotFound { namespace: namespace.to_string(),
                                              id: id.to_string() };
    // El shard de DashMap queda bloqueado mientras se aplica el update, lo
    // que hace atómica la mutación por documento.
    let mut collection = store.collections.get_mut(namespace).ok_or_else(not_found)?;
    let document = collection.get_mut(&id.storage_key()).ok_or_else(not_found)?;
    update.apply(document)
  }

  fn upsert_by_key(&mut self, namespace: &Namespace, id: &DocumentId, document: JsonValue) -> Result<(), StoreError> {
    let store = self.store()?;
    let body = with_document_id(id, document)?;
    store.collections.entry(namespace.clone()).or_default().insert(id.storage_key(), body);
    Ok(())
  }

  fn list(&mut self, namespace: &Namespace) -> Result<Vec<JsonValue>, StoreError> {
    let store = self.store()?;
    Ok(store.collections
            .get(namespace)
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default())
  }

  fn close(&mut self) {
    if !self.closed {
      self.closed = true;
      self.store.sessions_released.fetch_add(1, Ordering::SeqCst);
    }
  }
}
