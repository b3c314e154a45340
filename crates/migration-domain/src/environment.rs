use crate::definition::{DocumentId, Namespace};
use crate::update::Update;
use crate::StoreError;
use serde_json::Value as JsonValue;
use std::ops::{Deref, DerefMut};

/// Base de datos por defecto donde se guardan los metadatos de migración.
pub const DEFAULT_METADATA_DB: &str = "docmigrate";
/// Colección por defecto donde se guardan los metadatos de migración.
pub const DEFAULT_METADATA_COLLECTION: &str = "migration_metadata";

/// Entorno compartido por todos los jobs del proceso.
///
/// Debe permitir obtener sesiones de forma concurrente (normalmente es un
/// pool de conexiones). Ningún job es dueño del entorno: se inyecta
/// explícitamente en cada job o en la fábrica del registro.
pub trait Environment: Send + Sync {
  /// Obtiene una sesión exclusiva para una invocación.
  fn get_session(&self) -> Result<Box<dyn Session>, StoreError>;

  /// Namespace donde se registran los metadatos de migraciones terminadas.
  fn metadata_namespace(&self) -> Namespace;
}

/// Handle al almacén ligado a una única invocación.
///
/// `close` debe ser idempotente; después de cerrar, cualquier operación
/// devuelve `StoreError::Session`.
pub trait Session: Send {
  /// Lee el documento cuya clave es `id`.
  fn find_by_key(&mut self, namespace: &Namespace, id: &DocumentId) -> Result<Option<JsonValue>, StoreError>;

  /// Aplica `update` al documento cuya clave es `id`. Devuelve
  /// `StoreError::NotFound` si no existe y `StoreError::Rejected` si la
  /// mutación no se puede aplicar.
  fn update_by_key(&mut self, namespace: &Namespace, id: &DocumentId, update: &Update) -> Result<(), StoreError>;

  /// Reemplaza (o inserta) el documento completo. Fija `_id` a `id`.
  fn upsert_by_key(&mut self, namespace: &Namespace, id: &DocumentId, document: JsonValue) -> Result<(), StoreError>;

  /// Lista los documentos de un namespace ordenados por clave.
  fn list(&mut self, namespace: &Namespace) -> Result<Vec<JsonValue>, StoreError>;

  /// Libera la sesión.
  fn close(&mut self);
}

/// Envoltorio que libera la sesión exactamente una vez al salir de scope.
pub struct SessionGuard {
  session: Box<dyn Session>,
}

impl SessionGuard {
  pub fn new(session: Box<dyn Session>) -> Self {
    Self { session }
  }

  /// Resuelve una base de datos por nombre.
  pub fn db(&mut self, name: &str) -> Database<'_> {
    Database { session: self.session.as_mut(),
               name: name.to_string() }
  }
}

impl Deref for SessionGuard {
  type Target = dyn Session;

  fn deref(&self) -> &Self::Target {
    self.session.as_ref()
  }
}

impl DerefMut for SessionGuard {
  fn deref_mut(&mut self) -> &mut Self::Target {
    self.session.as_mut()
  }
}

impl Drop for SessionGuard {
  fn drop(&mut self) {
    self.session.close();
  }
}

pub struct Database<'s> {
  session: &'s mut dyn Session,
  name: String,
}

impl<'s> Database<'s> {
  pub fn name(&self) -> &str {
    &self.name
  }

  /// Resuelve una colección dentro de esta base de datos.
  pub fn collection(self, name: &str) -> Result<Collection<'s>, StoreError> {
    let namespace = Namespace::new(self.name, name).map_err(|e| StoreError::Rejected(e.to_string()))?;
    Ok(Collection { session: self.session,
                    namespace })
  }
}

/// Colección resuelta sobre una sesión prestada.
pub struct Collection<'s> {
  session: &'s mut dyn Session,
  namespace: Namespace,
}

impl Collection<'_> {
  pub fn namespace(&self) -> &Namespace {
    &self.namespace
  }

  pub fn find_by_key(&mut self, id: &DocumentId) -> Result<Option<JsonValue>, StoreError> {
    self.session.find_by_key(&self.namespace, id)
  }

  pub fn update_by_key(&mut self, id: &DocumentId, update: &Update) -> Result<(), StoreError> {
    self.session.update_by_key(&self.namespace, id, update)
  }

  pub fn upsert_by_key(&mut self, id: &DocumentId, document: JsonValue) -> Result<(), StoreError> {
    self.session.upsert_by_key(&self.namespace, id, document)
  }

  pub fn list(&mut self) -> Result<Vec<JsonValue>, StoreError> {
    self.session.list(&self.namespace)
  }
}

/// Prepara el cuerpo que se persiste para `id`: debe ser un objeto y
/// siempre lleva `_id`.
pub fn with_document_id(id: &DocumentId, document: JsonValue) -> Result<JsonValue, StoreError> {
  match document {
    JsonValue::Object(mut map) => {
      map.insert("_id".to_string(), id.to_json());
      Ok(JsonValue::Object(map))
    }
    other => Err(StoreError::Rejected(format!("el documento debe ser un objeto, se recibió {}", other))),
  }
}
