// update.rs
use crate::{DomainError, StoreError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
  Set,
  Unset,
  Inc,
}

impl Operator {
  fn parse(key: &str) -> Option<Self> {
    match key {
      "$set" => Some(Operator::Set),
      "$unset" => Some(Operator::Unset),
      "$inc" => Some(Operator::Inc),
      _ => None,
    }
  }
}

/// Mutación declarativa aplicada a un documento.
///
/// Admite dos formas, nunca mezcladas:
/// - campos: `{"status": "migrated", "meta.version": 2}` asigna cada ruta;
/// - operadores: `{"$set": {..}, "$unset": {..}, "$inc": {..}}`.
///
/// La forma se valida al construir (y por tanto al deserializar); `apply`
/// sólo puede fallar por el contenido del documento.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "IndexMap<String, JsonValue>", into = "IndexMap<String, JsonValue>")]
pub struct Update {
  entries: IndexMap<String, JsonValue>,
}

impl TryFrom<IndexMap<String, JsonValue>> for Update {
  type Error = DomainError;

  fn try_from(entries: IndexMap<String, JsonValue>) -> Result<Self, Self::Error> {
    Update::new(entries)
  }
}

impl From<Update> for IndexMap<String, JsonValue> {
  fn from(update: Update) -> Self {
    update.entries
  }
}

impl Update {
  pub fn new(entries: IndexMap<String, JsonValue>) -> Result<Self, DomainError> {
    let operators = entries.keys().filter(|k| k.starts_with('$')).count();
    if operators != 0 && operators != entries.len() {
      return Err(DomainError::ValidationError("el update mezcla operadores y rutas de campo".to_string()));
    }
    if operators > 0 {
      for (key, operand) in entries.iter() {
        let op = Operator::parse(key).ok_or_else(|| DomainError::ValidationError(format!("operador desconocido: {}", key)))?;
        let fields = operand.as_object()
                            .ok_or_else(|| DomainError::ValidationError(format!("el operando de {} debe ser un objeto", key)))?;
        for (path, value) in fields.iter() {
          validate_path(path)?;
          if op == Operator::Inc && !value.is_number() {
            return Err(DomainError::ValidationError(format!("$inc sobre '{}' requiere un número", path)));
          }
        }
      }
    } else {
      for path in entries.keys() {
        validate_path(path)?;
      }
    }
    Ok(Self { entries })
  }

  /// Construye un update desde un objeto JSON.
  pub fn from_json(value: JsonValue) -> Result<Self, DomainError> {
    match value {
      JsonValue::Object(map) => Self::new(map.into_iter().collect()),
      other => Err(DomainError::ValidationError(format!("el update debe ser un objeto, se recibió {}", other))),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn is_operator_form(&self) -> bool {
    self.entries.keys().next().is_some_and(|k| k.starts_with('$'))
  }

  pub fn as_map(&self) -> &IndexMap<String, JsonValue> {
    &self.entries
  }

  /// Aplica la mutación sobre `document`. Si algún paso falla el documento
  /// queda intacto.
  pub fn apply(&self, document: &mut JsonValue) -> Result<(), StoreError> {
    if !document.is_object() {
      return Err(StoreError::Rejected("el documento no es un objeto".to_string()));
    }
    let mut working = document.clone();
    if self.is_operator_form() {
      for (key, operand) in self.entries.iter() {
        let op = Operator::parse(key).ok_or_else(|| StoreError::Rejected(format!("operador desconocido: {}", key)))?;
        let Some(fields) = operand.as_object() else {
          return Err(StoreError::Rejected(format!("el operando de {} debe ser un objeto", key)));
        };
        for (path, value) in fields.iter() {
          match op {
            Operator::Set => set_path(&mut working, path, value.clone())?,
            Operator::Unset => unset_path(&mut working, path)?,
            Operator::Inc => inc_path(&mut working, path, value)?,
          }
        }
      }
    } else {
      for (path, value) in self.entries.iter() {
        set_path(&mut working, path, value.clone())?;
      }
    }
    *document = working;
    Ok(())
  }
}

fn validate_path(path: &str) -> Result<(), DomainError> {
  if path.is_empty() || path.split('.').any(|s| s.is_empty()) {
    return Err(DomainError::ValidationError(format!("ruta de campo inválida: '{}'", path)));
  }
  if path.starts_with('$') {
    return Err(DomainError::ValidationError(format!("la ruta no puede empezar por '$': '{}'", path)));
  }
  if path == "_id" || path.starts_with("_id.") {
    return Err(DomainError::ValidationError("el campo _id es inmutable".to_string()));
  }
  Ok(())
}

fn split_path(path: &str) -> (Vec<&str>, &str) {
  match path.rsplit_once('.') {
    Some((parents, leaf)) => (parents.split('.').collect(), leaf),
    None => (Vec::new(), path),
  }
}

fn not_traversable(path: &str) -> StoreError {
  StoreError::Rejected(format!("no se puede recorrer '{}': un segmento intermedio no es un objeto", path))
}

// Con `create` se crean los objetos intermedios que falten; sin él una ruta
// ausente devuelve `None`.
fn parent_object<'a>(document: &'a mut JsonValue,
                     parents: &[&str],
                     path: &str,
                     create: bool)
                     -> Result<Option<&'a mut JsonMap<String, JsonValue>>, StoreError> {
  let mut current = document;
  for segment in parents {
    let Some(object) = current.as_object_mut() else {
      return if create { Err(not_traversable(path)) } else { Ok(None) };
    };
    if create {
      current = object.entry(segment.to_string()).or_insert_with(|| JsonValue::Object(JsonMap::new()));
    } else {
      match object.get_mut(*segment) {
        Some(next) => current = next,
        None => return Ok(None),
      }
    }
  }
  match current.as_object_mut() {
    Some(object) => Ok(Some(object)),
    None if create => Err(not_traversable(path)),
    None => Ok(None),
  }
}

fn set_path(document: &mut JsonValue, path: &str, value: JsonValue) -> Result<(), StoreError> {
  let (parents, leaf) = split_path(path);
  if let Some(object) = parent_object(document, &parents, path, true)? {
    object.insert(leaf.to_string(), value);
  }
  Ok(())
}

fn unset_path(document: &mut JsonValue, path: &str) -> Result<(), StoreError> {
  let (parents, leaf) = split_path(path);
  if let Some(object) = parent_object(document, &parents, path, false)? {
    object.remove(leaf);
  }
  Ok(())
}

fn inc_path(document: &mut JsonValue, path: &str, delta: &JsonValue) -> Result<(), StoreError> {
  let (parents, leaf) = split_path(path);
  let Some(object) = parent_object(document, &parents, path, true)? else {
    return Ok(());
  };
  let next = match object.get(leaf) {
    None => delta.clone(),
    Some(current) => add_numbers(current, delta).ok_or_else(|| {
                                                   StoreError::Rejected(format!("$inc sobre '{}' que no es numérico", path))
                                                 })?,
  };
  object.insert(leaf.to_string(), next);
  Ok(())
}

fn add_numbers(current: &JsonValue, delta: &JsonValue) -> Option<JsonValue> {
  if let (Some(a), Some(b)) = (current.as_i64(), delta.as_i64()) {
    if let Some(sum) = a.checked_add(b) {
      return Some(JsonValue::from(sum));
    }
  }
  let sum = current.as_f64()? + delta.as_f64()?;
  serde_json::Number::from_f64(sum).map(JsonValue::Number)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn split_path_separates_leaf() {
    assert_eq!(split_path("a.b.c"), (vec!["a", "b"], "c"));
    assert_eq!(split_path("status"), (Vec::<&str>::new(), "status"));
  }

  #[test]
  fn add_numbers_keeps_integers_and_rejects_strings() {
    assert_eq!(add_numbers(&JsonValue::from(2), &JsonValue::from(3)), Some(JsonValue::from(5)));
    assert_eq!(add_numbers(&JsonValue::from(1.5), &JsonValue::from(1)), Some(JsonValue::from(2.5)));
    assert_eq!(add_numbers(&JsonValue::from("x"), &JsonValue::from(1)), None);
  }
}
