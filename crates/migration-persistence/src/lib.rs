//! Persistencia Diesel para el ejecutor de migraciones.
//! Expone `DieselEnvironment`, un `Environment` sobre una tabla `documents`
//! (SQLite por defecto, Postgres con la feature `pg`), y la configuración
//! leída del entorno.

pub mod config;
mod environment;
mod errors;
pub mod schema;

pub use config::{PersistenceConfig, DEFAULT_POOL_SIZE, DEFAULT_SQLITE_URL};
pub use environment::{DieselEnvironment, MIGRATIONS};
pub use errors::PersistenceError;
