use crate::config::PersistenceConfig;
use crate::errors::PersistenceError;
use crate::schema::documents;
use crate::schema::documents::dsl as docs_dsl;
use chrono::Utc;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::result::Error as DieselError;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use migration_domain::{with_document_id, DocumentId, Environment, Namespace, Session, StoreError, Update};
use serde_json::Value as JsonValue;
use std::sync::Arc;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("./migrations");
#[cfg(feature = "pg")]
type DbConn = PgConnection;
#[cfg(not(feature = "pg"))]
type DbConn = SqliteConnection;
type DbPool = Pool<ConnectionManager<DbConn>>;
type DbPooled = PooledConnection<ConnectionManager<DbConn>>;

#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = documents)]
struct DocumentRow {
  pub db_name: String,
  pub collection: String,
  pub doc_key: String,
  pub body: String,
  pub updated_at_ts: i64,
}

/// Pragmas aplicados a cada conexión SQLite que entrega el pool.
#[cfg(not(feature = "pg"))]
#[derive(Debug)]
struct SqlitePragmas;

#[cfg(not(feature = "pg"))]
impl r2d2::CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for SqlitePragmas {
  fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
    use diesel::connection::SimpleConnection;
    conn.batch_execute("PRAGMA journal_mode = WAL; PRAGMA busy_timeout = 5000;")
        .map_err(diesel::r2d2::Error::QueryError)
  }
}

/// Error interno de las transacciones de escritura: Diesel necesita poder
/// construirlo desde `diesel::result::Error` para hacer rollback.
#[derive(Debug)]
enum TxError {
  Db(DieselError),
  Store(StoreError),
}

impl From<DieselError> for TxError {
  fn from(e: DieselError) -> Self {
    TxError::Db(e)
  }
}

impl From<StoreError> for TxError {
  fn from(e: StoreError) -> Self {
    TxError::Store(e)
  }
}

impl From<TxError> for StoreError {
  fn from(e: TxError) -> Self {
    match e {
      TxError::Db(e) => db_err(e),
      TxError::Store(e) => e,
    }
  }
}

fn db_err(e: DieselError) -> StoreError {
  StoreError::Storage(format!("db: {}", e))
}

fn parse_body(body: &str) -> Result<JsonValue, StoreError> {
  serde_json::from_str(body).map_err(|e| StoreError::Storage(format!("documento ilegible: {}", e)))
}

fn now_ts() -> i64 {
  Utc::now().timestamp_millis()
}

/// Ejecuta `f` en una transacción de escritura. En SQLite se toma el lock de
/// escritura al empezar (`BEGIN IMMEDIATE`) para que lectura y escritura del
/// mismo documento no se intercalen con otra conexión.
fn write_transaction<T, F>(conn: &mut DbConn, f: F) -> Result<T, StoreError>
  where F: FnOnce(&mut DbConn) -> Result<T, TxError>
{
  #[cfg(not(feature = "pg"))]
  let res = conn.immediate_transaction(f);
  #[cfg(feature = "pg")]
  let res = conn.transaction(f);
  res.map_err(StoreError::from)
}

/// `Environment` respaldado por Diesel + r2d2.
///
/// Cada `get_session` toma una conexión del pool; la conexión vuelve al pool
/// al cerrar la sesión.
#[derive(Clone)]
pub struct DieselEnvironment {
  pool: Arc<DbPool>,
  metadata_namespace: Namespace,
}

impl DieselEnvironment {
  /// Crea el pool y aplica las migraciones de esquema pendientes.
  pub fn connect(config: &PersistenceConfig) -> Result<Self, PersistenceError> {
    let manager = ConnectionManager::<DbConn>::new(config.database_url());
    let max_size = config.connection_limit();
    if max_size < config.pool_size() {
      log::info!("base en memoria: pool limitado a {} conexión (pedidas {})", max_size, config.pool_size());
    }
    let builder = Pool::builder().max_size(max_size);
    #[cfg(not(feature = "pg"))]
    let builder = builder.connection_customizer(Box::new(SqlitePragmas));
    let pool = builder.build(manager)
                      .map_err(|e| StoreError::Storage(format!("no se pudo crear el pool de conexiones: {}", e)))?;
    {
      let mut pooled = pool.get().map_err(|e| StoreError::Session(format!("pool: {}", e)))?;
      let conn: &mut DbConn = &mut pooled;
      let applied = conn.run_pending_migrations(MIGRATIONS)
                        .map_err(|e| StoreError::Storage(format!("migraciones: {}", e)))?;
      if !applied.is_empty() {
        log::info!("aplicadas {} migraciones de esquema", applied.len());
      }
    }
    Ok(Self { pool: Arc::new(pool),
              metadata_namespace: config.metadata_namespace().clone() })
  }

  /// Atajo: `PersistenceConfig::from_env` + `connect`.
  pub fn new_from_env() -> Result<Self, PersistenceError> {
    let config = PersistenceConfig::from_env()?;
    Self::connect(&config)
  }
}

impl Environment for DieselEnvironment {
  fn get_session(&self) -> Result<Box<dyn Session>, StoreError> {
    let conn = self.pool.get().map_err(|e| StoreError::Session(format!("pool: {}", e)))?;
    Ok(Box::new(DieselSession { conn: Some(conn) }))
  }

  fn metadata_namespace(&self) -> Namespace {
    self.metadata_namespace.clone()
  }
}

struct DieselSession {
  conn: Option<DbPooled>,
}

impl DieselSession {
  fn conn(&mut self) -> Result<&mut DbConn, StoreError> {
    self.conn.as_deref_mut().ok_or_else(|| StoreError::Session("sesión cerrada".into()))
  }
}

impl Session for DieselSession {
  fn find_by_key(&mut self, namespace: &Namespace, id: &DocumentId) -> Result<Option<JsonValue>, StoreError> {
    let conn = self.conn()?;
    let key = id.storage_key();
    let row = documents::table.find((namespace.db(), namespace.collection(), key.as_str()))
                              .first::<DocumentRow>(conn)
                              .optional()
                              .map_err(db_err)?;
    row.map(|r| parse_body(&r.body)).transpose()
  }

  fn update_by_key(&mut self, namespace: &Namespace, id: &DocumentId, update: &Update) -> Result<(), StoreError> {
    let conn = self.conn()?;
    let key = id.storage_key();
    write_transaction(conn, |conn| {
      let pk = (namespace.db(), namespace.collection(), key.as_str());
      #[cfg(feature = "pg")]
      let found = documents::table.find(pk).for_update().first::<DocumentRow>(conn).optional()?;
      #[cfg(not(feature = "pg"))]
      let found = documents::table.find(pk).first::<DocumentRow>(conn).optional()?;
      let row = found.ok_or_else(|| StoreError::NotFound { namespace: namespace.to_string(),
                                                           id: id.to_string() })?;
      let mut document = parse_body(&row.body)?;
      update.apply(&mut document)?;
      diesel::update(documents::table.find(pk)).set((docs_dsl::body.eq(document.to_string()),
                                                     docs_dsl::updated_at_ts.eq(now_ts())))
                                               .execute(conn)?;
      Ok(())
    })
  }

  fn upsert_by_key(&mut self, namespace: &Namespace, id: &DocumentId, document: JsonValue) -> Result<(), StoreError> {
    let body = with_document_id(id, document)?.to_string();
    let conn = self.conn()?;
    let row = DocumentRow { db_name: namespace.db().to_string(),
                            collection: namespace.collection().to_string(),
                            doc_key: id.storage_key(),
                            body,
                            updated_at_ts: now_ts() };
    write_transaction(conn, |conn| {
      let target = documents::table.find((row.db_name.as_str(), row.collection.as_str(), row.doc_key.as_str()));
      let updated = diesel::update(target).set((docs_dsl::body.eq(row.body.as_str()), docs_dsl::updated_at_ts.eq(row.updated_at_ts)))
                                          .execute(conn)?;
      if updated == 0 {
        diesel::insert_into(documents::table).values(&row).execute(conn)?;
      }
      Ok(())
    })
  }

  fn list(&mut self, namespace: &Namespace) -> Result<Vec<JsonValue>, StoreError> {
    let conn = self.conn()?;
    let rows = docs_dsl::documents.filter(docs_dsl::db_name.eq(namespace.db()))
                                  .filter(docs_dsl::collection.eq(namespace.collection()))
                                  .order(docs_dsl::doc_key.asc())
                                  .load::<DocumentRow>(conn)
                                  .map_err(db_err)?;
    rows.iter().map(|r| parse_body(&r.body)).collect()
  }

  fn close(&mut self) {
    // la conexión vuelve al pool al soltarla
    self.conn.take();
  }
}
