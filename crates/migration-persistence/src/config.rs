// Archivo: config.rs
// Propósito: configuración de la persistencia leída de variables de entorno
// (con `.env` vía dotenvy).
use crate::errors::PersistenceError;
use migration_domain::{Namespace, DEFAULT_METADATA_COLLECTION, DEFAULT_METADATA_DB};

/// URL usada sin `pg` cuando no hay ninguna configurada: SQLite en memoria
/// compartida. Con una base en memoria el pool se limita a una conexión (ver
/// `PersistenceConfig::connection_limit`).
pub const DEFAULT_SQLITE_URL: &str = "file:docmigrate?mode=memory&cache=shared";
pub const DEFAULT_POOL_SIZE: u32 = 4;

/// Parámetros de conexión del `DieselEnvironment`.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistenceConfig {
  database_url: String,
  pool_size: u32,
  metadata_namespace: Namespace,
}

impl PersistenceConfig {
  /// Configuración explícita con los valores por defecto para el resto.
  pub fn new(database_url: impl Into<String>) -> Self {
    Self { database_url: database_url.into(),
           pool_size: DEFAULT_POOL_SIZE,
           metadata_namespace: Namespace::default_metadata() }
  }

  pub fn with_pool_size(mut self, pool_size: u32) -> Self {
    self.pool_size = pool_size;
    self
  }

  pub fn with_metadata_namespace(mut self, namespace: Namespace) -> Self {
    self.metadata_namespace = namespace;
    self
  }

  /// Lee la configuración del entorno.
  ///
  /// - `MIGRATION_DB_URL` (o `DATABASE_URL`): con `pg` es obligatoria y debe
  ///   parecer una URL de Postgres; sin `pg` se usa `DEFAULT_SQLITE_URL`.
  /// - `MIGRATION_DB_POOL_SIZE`: entero positivo, 4 por defecto.
  /// - `MIGRATION_METADATA_DB` / `MIGRATION_METADATA_COLLECTION`: namespace
  ///   donde se registran los metadatos de migración.
  pub fn from_env() -> Result<Self, PersistenceError> {
    dotenvy::dotenv().ok();
    let url = std::env::var("MIGRATION_DB_URL").or_else(|_| std::env::var("DATABASE_URL"));
    let database_url = if cfg!(feature = "pg") {
      let url = url.map_err(|_| PersistenceError::Config("MIGRATION_DB_URL / DATABASE_URL no definida".into()))?;
      let l = url.to_lowercase();
      if !(l.starts_with("postgres://") || l.starts_with("postgresql://") || url.contains('@')) {
        return Err(PersistenceError::Config("MIGRATION_DB_URL / DATABASE_URL no parece una URL de Postgres".into()));
      }
      url
    } else {
      url.unwrap_or_else(|_| DEFAULT_SQLITE_URL.into())
    };

    let pool_size = match std::env::var("MIGRATION_DB_POOL_SIZE") {
      Ok(raw) => parse_pool_size(&raw)?,
      Err(_) => DEFAULT_POOL_SIZE,
    };

    let db = std::env::var("MIGRATION_METADATA_DB").unwrap_or_else(|_| DEFAULT_METADATA_DB.into());
    let collection = std::env::var("MIGRATION_METADATA_COLLECTION").unwrap_or_else(|_| DEFAULT_METADATA_COLLECTION.into());
    let metadata_namespace = Namespace::new(db, collection)?;

    log::debug!("persistencia: pool de {} conexiones, metadatos en {}", pool_size, metadata_namespace);
    Ok(Self { database_url,
              pool_size,
              metadata_namespace })
  }

  pub fn database_url(&self) -> &str {
    &self.database_url
  }

  pub fn pool_size(&self) -> u32 {
    self.pool_size
  }

  pub fn metadata_namespace(&self) -> &Namespace {
    &self.metadata_namespace
  }

  /// `true` para URLs de SQLite en memoria (`:memory:` o `mode=memory`).
  pub fn is_in_memory(&self) -> bool {
    let url = self.database_url.to_lowercase();
    url == ":memory:" || url.contains("mode=memory")
  }

  /// Conexiones que abre realmente el pool. SQLite en memoria con caché
  /// compartida bloquea por tabla (SQLITE_LOCKED) y `busy_timeout` no
  /// reintenta ese caso, así que las escrituras concurrentes fallarían: se
  /// usa una sola conexión y los workers esperan turno en el pool.
  pub fn connection_limit(&self) -> u32 {
    if self.is_in_memory() {
      1
    } else {
      self.pool_size
    }
  }
}

fn parse_pool_size(raw: &str) -> Result<u32, PersistenceError> {
  match raw.trim().parse::<u32>() {
    Ok(n) if n > 0 => Ok(n),
    _ => Err(PersistenceError::Config(format!("MIGRATION_DB_POOL_SIZE inválido: '{}'", raw))),
  }
}
