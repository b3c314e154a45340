use migration_domain::{DocumentId, Environment, InMemoryEnvironment, Namespace, SessionGuard, StoreError, Update};
use serde_json::json;

#[test]
fn session_resolves_collection_and_updates_by_key() {
  let env = InMemoryEnvironment::new();
  let ns = Namespace::new("app", "users").unwrap();
  let id = DocumentId::from("doc1");
  env.insert_document(&ns, &id, json!({"status": "pending"})).unwrap();

  {
    let mut session = SessionGuard::new(env.get_session().expect("session"));
    let mut users = session.db("app").collection("users").expect("collection");
    assert_eq!(users.namespace(), &ns);
    let update = Update::from_json(json!({"status": "migrated"})).unwrap();
    users.update_by_key(&id, &update).expect("update");
    let doc = users.find_by_key(&id).unwrap().expect("document");
    assert_eq!(doc, json!({"status": "migrated", "_id": "doc1"}));
  }

  assert_eq!(env.sessions_opened(), 1);
  assert_eq!(env.sessions_released(), 1);
  assert_eq!(env.update_attempts(), 1);
}

#[test]
fn update_of_missing_document_is_not_found() {
  let env = InMemoryEnvironment::new();
  let ns = Namespace::new("app", "users").unwrap();
  let mut session = SessionGuard::new(env.get_session().unwrap());
  let update = Update::from_json(json!({"status": "migrated"})).unwrap();
  let err = session.update_by_key(&ns, &DocumentId::from("doc1"), &update).unwrap_err();
  assert!(err.is_not_found());
}

#[test]
fn closed_session_rejects_operations_and_close_is_idempotent() {
  let env = InMemoryEnvironment::new();
  let ns = Namespace::new("app", "users").unwrap();
  let mut session = env.get_session().unwrap();
  session.close();
  session.close();
  assert_eq!(env.sessions_released(), 1);
  assert!(matches!(session.list(&ns), Err(StoreError::Session(_))));
}

#[test]
fn session_failure_can_be_simulated() {
  let env = InMemoryEnvironment::new();
  env.fail_sessions(Some("sin conexión"));
  match env.get_session() {
    Err(StoreError::Session(msg)) => assert_eq!(msg, "sin conexión"),
    Err(other) => panic!("unexpected error {:?}", other),
    Ok(_) => panic!("session should fail"),
  }
  env.fail_sessions(None);
  assert!(env.get_session().is_ok());
}

#[test]
fn upsert_sets_id_and_list_is_ordered_by_key() {
  let env = InMemoryEnvironment::new();
  let ns = Namespace::new("app", "users").unwrap();
  let mut session = SessionGuard::new(env.get_session().unwrap());
  session.upsert_by_key(&ns, &DocumentId::from("b"), json!({"n": 2})).unwrap();
  session.upsert_by_key(&ns, &DocumentId::from("a"), json!({"n": 1})).unwrap();
  assert!(session.upsert_by_key(&ns, &DocumentId::from("c"), json!(3)).is_err());
  let docs = session.list(&ns).unwrap();
  assert_eq!(docs, vec![json!({"n": 1, "_id": "a"}), json!({"n": 2, "_id": "b"})]);
}
