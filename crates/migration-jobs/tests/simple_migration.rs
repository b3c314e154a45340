use jobs::{InMemoryJobQueue, Job, JobBase, JobInterchange, JobRegistry, LocalWorkerPool};
use migration_domain::{DocumentId, Environment, InMemoryEnvironment, MigrationDefinition, Namespace, Update};
use migration_jobs::{register_migration_jobs, simple_migration_id, MigrationBase, MigrationError, MigrationHelper, MigrationMetadata,
                     SimpleMigrationJob, SimpleMigrationRecord, SIMPLE_MIGRATION};
use serde_json::json;
use std::sync::{Arc, Mutex};

/// Llamada capturada por `RecordingHelper`.
#[derive(Debug, Clone, PartialEq)]
struct Finished {
  migration: String,
  errors: Vec<String>,
  /// Sesiones liberadas en el momento de la notificación.
  sessions_released: usize,
}

/// Doble de prueba: entrega el entorno en memoria y registra cada
/// `finish_migration` sin escribir metadatos.
struct RecordingHelper {
  env: InMemoryEnvironment,
  calls: Mutex<Vec<Finished>>,
  fail_tracking: bool,
}

impl RecordingHelper {
  fn new(env: &InMemoryEnvironment) -> Arc<Self> {
    Arc::new(Self { env: env.clone(),
                    calls: Mutex::new(Vec::new()),
                    fail_tracking: false })
  }

  fn failing(env: &InMemoryEnvironment) -> Arc<Self> {
    Arc::new(Self { env: env.clone(),
                    calls: Mutex::new(Vec::new()),
                    fail_tracking: true })
  }

  fn calls(&self) -> Vec<Finished> {
    self.calls.lock().unwrap().clone()
  }
}

impl MigrationHelper for RecordingHelper {
  fn env(&self) -> Arc<dyn Environment> {
    Arc::new(self.env.clone())
  }

  fn finish_migration(&self, name: &str, base: &mut JobBase) -> Result<(), MigrationError> {
    base.mark_complete();
    self.calls.lock().unwrap().push(Finished { migration: name.to_string(),
                                               errors: base.errors().to_vec(),
                                               sessions_released: self.env.sessions_released() });
    if self.fail_tracking {
      return Err(MigrationError::Other("metadatos no disponibles".into()));
    }
    Ok(())
  }
}

fn users() -> Namespace {
  Namespace::new("app", "users").unwrap()
}

fn status_migration(id: &str) -> MigrationDefinition {
  MigrationDefinition::new("status-v2",
                           users(),
                           id,
                           Update::from_json(json!({"status": "migrated"})).unwrap()).unwrap()
}

fn env_with_doc1() -> InMemoryEnvironment {
  let env = InMemoryEnvironment::new();
  env.insert_document(&users(), &DocumentId::from("doc1"), json!({"status": "pending"})).unwrap();
  env
}

#[test]
fn existing_document_is_migrated() {
  let env = env_with_doc1();
  let helper = RecordingHelper::new(&env);
  let mut job = SimpleMigrationJob::with_helper(helper.clone(), status_migration("doc1"));
  job.run();

  assert!(job.error().is_none());
  assert!(job.status().completed);
  assert_eq!(env.document(&users(), &DocumentId::from("doc1")).unwrap(),
             json!({"_id": "doc1", "status": "migrated"}));
  let calls = helper.calls();
  assert_eq!(calls.len(), 1);
  assert_eq!(calls[0].migration, "status-v2");
  assert!(calls[0].errors.is_empty());
  assert_eq!(env.sessions_opened(), 1);
  assert_eq!(env.sessions_released(), 1);
}

#[test]
fn missing_document_records_one_error() {
  let env = InMemoryEnvironment::new();
  let helper = RecordingHelper::new(&env);
  let mut job = SimpleMigrationJob::with_helper(helper.clone(), status_migration("doc1"));
  job.run();

  assert_eq!(job.base().errors().len(), 1);
  assert!(job.base().errors()[0].contains("no encontrado"), "{:?}", job.base().errors());
  assert!(job.error().is_some());
  assert_eq!(helper.calls().len(), 1);
  assert_eq!(env.update_attempts(), 1);
  assert_eq!(env.sessions_released(), 1);
}

#[test]
fn session_failure_skips_update_and_still_notifies() {
  let env = env_with_doc1();
  env.fail_sessions(Some("servidor caído"));
  let helper = RecordingHelper::new(&env);
  let mut job = SimpleMigrationJob::with_helper(helper.clone(), status_migration("doc1"));
  job.run();

  let expected = MigrationError::Session(migration_domain::StoreError::Session("servidor caído".into())).to_string();
  assert_eq!(job.base().errors(), &[expected]);
  assert_eq!(env.update_attempts(), 0);
  assert_eq!(env.sessions_opened(), 0);
  assert_eq!(helper.calls().len(), 1);
  assert_eq!(env.document(&users(), &DocumentId::from("doc1")).unwrap()["status"], "pending");
}

#[test]
fn session_is_released_before_completion_is_notified() {
  let env = env_with_doc1();
  let helper = RecordingHelper::new(&env);
  SimpleMigrationJob::with_helper(helper.clone(), status_migration("doc1")).run();
  SimpleMigrationJob::with_helper(helper.clone(), status_migration("missing")).run();

  let calls = helper.calls();
  assert_eq!(calls.len(), 2);
  assert_eq!(calls[0].sessions_released, 1);
  assert_eq!(calls[1].sessions_released, 2);
  assert_eq!(env.sessions_opened(), env.sessions_released());
}

#[test]
fn applying_the_same_migration_twice_is_idempotent() {
  let env = env_with_doc1();
  let helper = RecordingHelper::new(&env);
  let mut first = SimpleMigrationJob::with_helper(helper.clone(), status_migration("doc1"));
  first.run();
  let after_first = env.document(&users(), &DocumentId::from("doc1"));
  let mut second = SimpleMigrationJob::with_helper(helper.clone(), status_migration("doc1"));
  second.run();

  assert!(second.error().is_none());
  assert_eq!(env.document(&users(), &DocumentId::from("doc1")), after_first);
}

#[test]
fn tracking_failure_is_not_a_job_error() {
  let env = env_with_doc1();
  let helper = RecordingHelper::failing(&env);
  let mut job = SimpleMigrationJob::with_helper(helper.clone(), status_migration("doc1"));
  job.run();

  assert!(job.error().is_none());
  assert!(job.status().completed);
  assert_eq!(helper.calls().len(), 1);
}

#[test]
fn default_helper_records_metadata() {
  let env = env_with_doc1();
  let shared: Arc<dyn Environment> = Arc::new(env.clone());
  let mut ok = SimpleMigrationJob::new(shared.clone(), status_migration("doc1"));
  ok.run();
  let mut missing = SimpleMigrationJob::new(shared, status_migration("doc2"));
  missing.run();

  let meta_ns = Namespace::default_metadata();
  let stored = env.document(&meta_ns, &DocumentId::from(ok.id())).expect("metadata doc1");
  let meta: MigrationMetadata = serde_json::from_value(stored).unwrap();
  assert_eq!(meta,
             MigrationMetadata { id: r#"["status-v2","app","users","doc1"]"#.into(),
                                 migration: "status-v2".into(),
                                 has_errors: false,
                                 completed: true });
  let stored = env.document(&meta_ns, &DocumentId::from(missing.id())).expect("metadata doc2");
  assert_eq!(stored["has_errors"], json!(true));
  // una sesión para el update y otra para los metadatos, por job
  assert_eq!(env.sessions_opened(), 4);
  assert_eq!(env.sessions_released(), 4);
}

#[test]
fn default_helper_with_session_failure_keeps_single_error() {
  let env = env_with_doc1();
  env.fail_sessions(Some("sin red"));
  let mut job = SimpleMigrationJob::new(Arc::new(env.clone()), status_migration("doc1"));
  job.run();

  assert_eq!(job.base().errors().len(), 1);
  assert!(job.status().completed);
  assert!(env.document(&Namespace::default_metadata(), &DocumentId::from(job.id())).is_none());
}

#[test]
fn job_id_is_deterministic() {
  assert_eq!(simple_migration_id(&status_migration("doc1")), r#"["status-v2","app","users","doc1"]"#);
  assert_eq!(simple_migration_id(&status_migration("doc1")), simple_migration_id(&status_migration("doc1")));
  let numeric = MigrationDefinition::new("m", users(), 7i64, Update::default()).unwrap();
  assert_eq!(simple_migration_id(&numeric), r#"["m","app","users",7]"#);
}

#[test]
fn int_and_text_ids_get_distinct_job_ids() {
  let int_id = MigrationDefinition::new("m", users(), 1i64, Update::default()).unwrap();
  let text_id = MigrationDefinition::new("m", users(), "1", Update::default()).unwrap();
  assert_ne!(int_id, text_id);
  assert_ne!(simple_migration_id(&int_id), simple_migration_id(&text_id));

  let env = InMemoryEnvironment::new();
  let helper = RecordingHelper::new(&env);
  let queue = InMemoryJobQueue::new();
  queue.put(&SimpleMigrationJob::with_helper(helper.clone(), int_id)).expect("int id");
  queue.put(&SimpleMigrationJob::with_helper(helper.clone(), text_id)).expect("text id");
  assert_eq!(queue.jobs().unwrap().len(), 2);
}

#[test]
fn dots_in_names_do_not_merge_job_ids() {
  let dotted_collection = MigrationDefinition::new("m", Namespace::new("app", "users.a").unwrap(), "b", Update::default()).unwrap();
  let dotted_id = MigrationDefinition::new("m", users(), "a.b", Update::default()).unwrap();
  let dotted_migration = MigrationDefinition::new("m.app", Namespace::new("users", "a").unwrap(), "b", Update::default()).unwrap();
  let ids = [simple_migration_id(&dotted_collection),
             simple_migration_id(&dotted_id),
             simple_migration_id(&dotted_migration)];
  assert_ne!(ids[0], ids[1]);
  assert_ne!(ids[0], ids[2]);
  assert_ne!(ids[1], ids[2]);

  let env = InMemoryEnvironment::new();
  let helper = RecordingHelper::new(&env);
  let queue = InMemoryJobQueue::new();
  for def in [dotted_collection, dotted_id, dotted_migration] {
    queue.put(&SimpleMigrationJob::with_helper(helper.clone(), def)).expect("distinct job");
  }
  assert_eq!(queue.jobs().unwrap().len(), 3);
}

#[test]
fn export_uses_wire_field_names() {
  let env = env_with_doc1();
  let job = SimpleMigrationJob::with_helper(RecordingHelper::new(&env), status_migration("doc1"));
  let exported = job.export().unwrap();
  assert_eq!(exported["migration"],
             json!({"migration_id": "status-v2",
                    "id": "doc1",
                    "namespace": {"db_name": "app", "collection": "users"},
                    "update": {"status": "migrated"}}));
  assert_eq!(exported["job_base"]["id"], r#"["status-v2","app","users","doc1"]"#);

  let record: SimpleMigrationRecord = serde_json::from_value(exported).unwrap();
  assert_eq!(&record, job.record());
}

#[test]
fn registry_rehydrates_with_helper_attached() {
  let env = env_with_doc1();
  let helper = RecordingHelper::new(&env);
  let registry = JobRegistry::new();
  register_migration_jobs(&registry, helper.clone()).expect("register");
  assert!(register_migration_jobs(&registry, helper.clone()).is_err());

  let job = SimpleMigrationJob::with_helper(helper.clone(), status_migration("doc1"));
  let raw = JobInterchange::from_job(&job).unwrap().to_json().unwrap();
  let interchange = JobInterchange::from_json(&raw).unwrap();
  assert_eq!(interchange.job_type.name, SIMPLE_MIGRATION);
  assert_eq!(interchange.job_type.version, 0);

  let mut rebuilt = registry.rehydrate(&interchange).expect("rehydrate");
  rebuilt.run();
  assert!(rebuilt.error().is_none());
  assert_eq!(helper.calls().len(), 1);
  assert_eq!(env.document(&users(), &DocumentId::from("doc1")).unwrap()["status"], "migrated");
}

#[test]
fn record_of_another_type_is_rejected() {
  let env = InMemoryEnvironment::new();
  let record = SimpleMigrationRecord { definition: status_migration("doc1"),
                                       base: JobBase::new("x", jobs::JobType::new("otro", 0, jobs::Format::Json)) };
  assert!(SimpleMigrationJob::from_record(RecordingHelper::new(&env), record).is_err());
}

#[test]
fn pool_runs_migrations_in_parallel() {
  let env = InMemoryEnvironment::new();
  for i in 0..20i64 {
    env.insert_document(&users(), &DocumentId::from(i), json!({"status": "pending", "n": i})).unwrap();
  }
  let helper: Arc<dyn MigrationHelper> = Arc::new(MigrationBase::new(Arc::new(env.clone())));
  let registry = JobRegistry::new();
  register_migration_jobs(&registry, helper.clone()).unwrap();

  let queue = InMemoryJobQueue::new();
  for i in 0..22i64 {
    let def = MigrationDefinition::new("status-v2", users(), i, Update::from_json(json!({"$set": {"status": "migrated"}, "$inc": {"n": 1}})).unwrap()).unwrap();
    queue.put(&SimpleMigrationJob::with_helper(helper.clone(), def)).unwrap();
  }
  // la misma definición no se encola dos veces
  let dup = MigrationDefinition::new("status-v2", users(), 0i64, Update::default()).unwrap();
  assert!(queue.put(&SimpleMigrationJob::with_helper(helper.clone(), dup)).is_err());

  let report = LocalWorkerPool::new(4).run_pending(&queue, &registry).unwrap();
  assert_eq!(report.ran, 22);
  assert!(report.dispatch_failures.is_empty());

  let stats = queue.stats().unwrap();
  assert_eq!(stats.completed, 22);
  assert_eq!(stats.failed, 2);
  for i in 0..20i64 {
    let doc = env.document(&users(), &DocumentId::from(i)).unwrap();
    assert_eq!(doc["status"], "migrated");
    assert_eq!(doc["n"], json!(i + 1));
  }
  assert_eq!(env.sessions_opened(), env.sessions_released());
}
