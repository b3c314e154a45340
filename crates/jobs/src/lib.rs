//! Crate `jobs` — contrato base de jobs para un scheduler
//!
//! Este crate define la base compuesta de un job (`JobBase`: identidad,
//! tipo, estado, errores acumulados), el trait `Job` que invoca el
//! scheduler, el registro de tipos (`JobRegistry`) que reconstruye jobs
//! desde su representación de intercambio (`JobInterchange`) y una cola en
//! memoria con un pool local de workers para pruebas y demos.
//!
//! Diseño resumido:
//! - `run` nunca devuelve error: los fallos quedan en la lista de errores.
//! - Los colaboradores de runtime no se serializan; la fábrica registrada
//!   los re-adjunta al rehidratar.
//! - Los jobs completados no se vuelven a despachar.
pub mod domain;
pub mod errors;
pub mod job;
pub mod pool;
pub mod registry;
pub mod stubs;

pub use domain::*;
pub use errors::*;
pub use job::*;
pub use pool::*;
pub use registry::*;
pub use stubs::*;
