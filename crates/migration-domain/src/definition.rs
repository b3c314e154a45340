// definition.rs
use crate::environment::{DEFAULT_METADATA_COLLECTION, DEFAULT_METADATA_DB};
use crate::update::Update;
use crate::DomainError;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// Par (base de datos, colección) que identifica dónde vive un documento.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawNamespace")]
pub struct Namespace {
  #[serde(rename = "db_name")]
  db: String,
  collection: String,
}

#[derive(Deserialize)]
struct RawNamespace {
  db_name: String,
  collection: String,
}

impl TryFrom<RawNamespace> for Namespace {
  type Error = DomainError;

  fn try_from(raw: RawNamespace) -> Result<Self, Self::Error> {
    Namespace::new(raw.db_name, raw.collection)
  }
}

impl Namespace {
  pub fn new(db: impl Into<String>, collection: impl Into<String>) -> Result<Self, DomainError> {
    let db = db.into();
    let collection = collection.into();
    if db.trim().is_empty() {
      return Err(DomainError::ValidationError("el nombre de la base de datos no puede estar vacío".to_string()));
    }
    if db.contains('.') {
      return Err(DomainError::ValidationError(format!("nombre de base de datos inválido: '{}'", db)));
    }
    if collection.trim().is_empty() {
      return Err(DomainError::ValidationError("el nombre de la colección no puede estar vacío".to_string()));
    }
    Ok(Self { db, collection })
  }

  /// Namespace de metadatos usado cuando no se configura otro.
  pub fn default_metadata() -> Self {
    Self { db: DEFAULT_METADATA_DB.to_string(),
           collection: DEFAULT_METADATA_COLLECTION.to_string() }
  }

  pub fn db(&self) -> &str {
    &self.db
  }

  pub fn collection(&self) -> &str {
    &self.collection
  }
}

impl fmt::Display for Namespace {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}.{}", self.db, self.collection)
  }
}

/// Clave opaca de un documento dentro de su namespace.
///
/// Se acepta un entero o una cadena no vacía; cualquier otro valor JSON
/// (null, flotante, objeto) se rechaza al deserializar.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocumentId {
  Int(i64),
  Text(String),
}

impl DocumentId {
  /// Representación JSON canónica usada como clave de almacenamiento. Evita
  /// que `1` y `"1"` colisionen.
  pub fn storage_key(&self) -> String {
    self.to_json().to_string()
  }

  /// Valor que se guarda en el campo `_id` del documento.
  pub fn to_json(&self) -> JsonValue {
    match self {
      DocumentId::Int(n) => JsonValue::from(*n),
      DocumentId::Text(s) => JsonValue::String(s.clone()),
    }
  }

  fn validate(&self) -> Result<(), DomainError> {
    match self {
      DocumentId::Text(s) if s.trim().is_empty() => {
        Err(DomainError::ValidationError("el id del documento no puede estar vacío".to_string()))
      }
      _ => Ok(()),
    }
  }
}

impl fmt::Display for DocumentId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      DocumentId::Int(n) => write!(f, "{}", n),
      DocumentId::Text(s) => write!(f, "{}", s),
    }
  }
}

impl From<i64> for DocumentId {
  fn from(n: i64) -> Self {
    DocumentId::Int(n)
  }
}

impl From<&str> for DocumentId {
  fn from(s: &str) -> Self {
    DocumentId::Text(s.to_string())
  }
}

impl From<String> for DocumentId {
  fn from(s: String) -> Self {
    DocumentId::Text(s)
  }
}

/// Descripción inmutable de una mutación dirigida a un único documento.
///
/// Es dato puro: se puede serializar, registrar en logs y re-ejecutar. La
/// deserialización valida la forma completa, de modo que una definición
/// inválida nunca llega a construirse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDefinition")]
pub struct MigrationDefinition {
  #[serde(rename = "migration_id")]
  migration: String,
  id: DocumentId,
  namespace: Namespace,
  update: Update,
}

#[derive(Deserialize)]
struct RawDefinition {
  migration_id: String,
  id: DocumentId,
  namespace: Namespace,
  update: Update,
}

impl TryFrom<RawDefinition> for MigrationDefinition {
  type Error = DomainError;

  fn try_from(raw: RawDefinition) -> Result<Self, Self::Error> {
    MigrationDefinition::new(raw.migration_id, raw.namespace, raw.id, raw.update)
  }
}

impl MigrationDefinition {
  pub fn new(migration: impl Into<String>,
             namespace: Namespace,
             id: impl Into<DocumentId>,
             update: Update)
             -> Result<Self, DomainError> {
    let migration = migration.into();
    if migration.trim().is_empty() {
      return Err(DomainError::ValidationError("el nombre de la migración no puede estar vacío".to_string()));
    }
    let id = id.into();
    id.validate()?;
    if update.is_empty() {
      log::debug!("migración '{}' sobre {} en {} con update vacío", migration, id, namespace);
    }
    Ok(Self { migration, id, namespace, update })
  }

  /// Construye la definición a partir de su representación JSON.
  pub fn from_json(value: JsonValue) -> Result<Self, DomainError> {
    Ok(serde_json::from_value(value)?)
  }

  pub fn migration(&self) -> &str {
    &self.migration
  }

  pub fn id(&self) -> &DocumentId {
    &self.id
  }

  pub fn namespace(&self) -> &Namespace {
    &self.namespace
  }

  pub fn update(&self) -> &Update {
    &self.update
  }
}
