//! migration-domain: definiciones de migración y contrato del almacén.
//!
//! Contiene el dato puro `MigrationDefinition` (namespace + clave + update),
//! el contrato `Environment`/`Session` que necesita un job para aplicar una
//! mutación y un entorno en memoria (`InMemoryEnvironment`) para pruebas.
mod definition;
mod environment;
mod errors;
mod stubs;
mod update;

pub use definition::{DocumentId, MigrationDefinition, Namespace};
pub use environment::{with_document_id, Collection, Database, Environment, Session, SessionGuard,
                      DEFAULT_METADATA_COLLECTION, DEFAULT_METADATA_DB};
pub use errors::{DomainError, StoreError};
pub use stubs::InMemoryEnvironment;
pub use update::Update;
