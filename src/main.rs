use anyhow::{anyhow, Context, Result};
use jobs::{InMemoryJobQueue, JobError, JobRegistry, LocalWorkerPool};
use migration_domain::{DocumentId, Environment, MigrationDefinition, Namespace, SessionGuard};
use migration_jobs::{register_migration_jobs, MigrationBase, MigrationHelper, MigrationMetadata, SimpleMigrationJob};
use migration_persistence::DieselEnvironment;
use serde_json::Value as JsonValue;
use std::io::{self, Write};
use std::sync::Arc;

/// Pequeño menú interactivo para operar el ejecutor de migraciones sobre la
/// persistencia configurada en el entorno (`MIGRATION_DB_URL`, ...).
///
/// Opciones soportadas:
/// 1) Ver documentos de un namespace
/// 2) Crear o reemplazar un documento
/// 3) Ejecutar migraciones desde un archivo JSON
/// 4) Ver metadatos de migraciones
/// 5) Salir
fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
                             .with_writer(io::stderr)
                             .init();

    // Abre el pool y aplica las migraciones de esquema embebidas
    let env = DieselEnvironment::new_from_env().context("no se pudo abrir la persistencia")?;
    let shared: Arc<dyn Environment> = Arc::new(env.clone());
    let helper: Arc<dyn MigrationHelper> = Arc::new(MigrationBase::new(shared));
    let registry = JobRegistry::new();
    register_migration_jobs(&registry, helper.clone())?;
    let pool = LocalWorkerPool::new(workers_from_env()?);
    log::info!("persistencia lista; metadatos en {}", env.metadata_namespace());

    loop {
        println!("\n== docmigrate ==");
        println!("1) Ver documentos de un namespace");
        println!("2) Crear o reemplazar un documento");
        println!("3) Ejecutar migraciones desde un archivo JSON");
        println!("4) Ver metadatos de migraciones");
        println!("5) Salir");
        print!("Elige una opción: ");
        io::stdout().flush().ok();

        let mut choice = String::new();
        if io::stdin().read_line(&mut choice)? == 0 {
            break;
        }
        let outcome = match choice.trim() {
            "1" => list_documents(&env),
            "2" => upsert_document(&env),
            "3" => run_migrations(&helper, &registry, &pool),
            "4" => show_metadata(&env),
            "5" => {
                println!("Saliendo...");
                break;
            }
            other => {
                println!("Opción inválida: {}", other);
                Ok(())
            }
        };
        if let Err(e) = outcome {
            eprintln!("Error: {:#}", e);
        }
    }

    Ok(())
}

fn workers_from_env() -> Result<usize> {
    match std::env::var("MIGRATION_WORKERS") {
        Ok(raw) => raw.trim().parse().with_context(|| format!("MIGRATION_WORKERS inválido: '{}'", raw)),
        Err(_) => Ok(0),
    }
}

fn prompt(msg: &str) -> io::Result<String> {
    print!("{}", msg);
    io::stdout().flush()?;
    let mut s = String::new();
    io::stdin().read_line(&mut s)?;
    Ok(s.trim().to_string())
}

fn prompt_namespace() -> Result<Namespace> {
    let db = prompt("Base de datos: ")?;
    let collection = prompt("Colección: ")?;
    Ok(Namespace::new(db, collection)?)
}

/// Un id numérico se toma como entero; cualquier otra cosa como texto.
fn parse_document_id(raw: &str) -> Result<DocumentId> {
    let text = raw.trim_matches('"');
    if text.is_empty() {
        return Err(anyhow!("el id no puede estar vacío"));
    }
    Ok(match raw.parse::<i64>() {
           Ok(n) => DocumentId::from(n),
           Err(_) => DocumentId::from(text),
       })
}

fn list_documents(env: &DieselEnvironment) -> Result<()> {
    let ns = prompt_namespace()?;
    let mut session = SessionGuard::new(env.get_session()?);
    let docs = session.list(&ns)?;
    if docs.is_empty() {
        println!("(sin documentos en {})", ns);
    }
    for doc in docs {
        println!("{}", doc);
    }
    Ok(())
}

fn upsert_document(env: &DieselEnvironment) -> Result<()> {
    let ns = prompt_namespace()?;
    let id = parse_document_id(&prompt("Id del documento: ")?)?;
    let body = prompt("Documento (objeto JSON): ")?;
    let doc: JsonValue = serde_json::from_str(&body).context("JSON inválido")?;
    let mut session = SessionGuard::new(env.get_session()?);
    session.upsert_by_key(&ns, &id, doc)?;
    println!("Documento {} guardado en {}", id, ns);
    Ok(())
}

/// El archivo contiene una definición o un arreglo de definiciones.
fn load_definitions(path: &str) -> Result<Vec<MigrationDefinition>> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("no se pudo leer '{}'", path))?;
    let value: JsonValue = serde_json::from_str(&raw).with_context(|| format!("'{}' no es JSON válido", path))?;
    let items = match value {
        JsonValue::Array(items) => items,
        single => vec![single],
    };
    items.into_iter()
         .enumerate()
         .map(|(i, item)| MigrationDefinition::from_json(item).with_context(|| format!("definición #{} inválida", i)))
         .collect()
}

fn run_migrations(helper: &Arc<dyn MigrationHelper>, registry: &JobRegistry, pool: &LocalWorkerPool) -> Result<()> {
    let path = prompt("Archivo de definiciones: ")?;
    let definitions = load_definitions(&path)?;
    let queue = InMemoryJobQueue::new();
    for definition in definitions {
        let job = SimpleMigrationJob::with_helper(helper.clone(), definition);
        match queue.put(&job) {
            Ok(()) => {}
            Err(JobError::Duplicate(id)) => println!("Definición repetida, se omite: {}", id),
            Err(e) => return Err(e.into()),
        }
    }

    let report = pool.run_pending(&queue, registry)?;
    let stats = queue.stats()?;
    println!("Ejecutados: {} | omitidos: {} | con errores: {} | sin despachar: {}",
             report.ran,
             report.skipped,
             stats.failed,
             report.dispatch_failures.len());
    for job in queue.jobs()? {
        if !job.status.errors.is_empty() {
            println!("  {}: {}", job.id, job.status.errors.join("; "));
        }
    }
    for (id, err) in report.dispatch_failures {
        println!("  {}: no despachado: {}", id, err);
    }
    Ok(())
}

fn show_metadata(env: &DieselEnvironment) -> Result<()> {
    let ns = env.metadata_namespace();
    let mut session = SessionGuard::new(env.get_session()?);
    let records = session.list(&ns)?;
    println!("\nJOB                                              | MIGRACIÓN        | ERRORES");
    println!("-------------------------------------------------------------------------------");
    for raw in records {
        match serde_json::from_value::<MigrationMetadata>(raw.clone()) {
            Ok(meta) => println!("{:<48} | {:<16} | {}", meta.id, meta.migration, if meta.has_errors { "sí" } else { "no" }),
            Err(_) => println!("{}", raw),
        }
    }
    Ok(())
}
