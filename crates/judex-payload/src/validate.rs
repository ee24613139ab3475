//! Raw payload → typed [`CaseRecord`].
//!
//! Validation is strict on types and lenient on optionality: an absent key
//! yields the field's default, a present key of the wrong shape is a
//! [`FieldError`]. Errors never discard what did validate; the partially
//! filled record travels inside [`Rejection`].

use std::fmt;

use chrono::NaiveDate;
use judex_core::{
  case::{CASE_FIELDS, CaseClass, CaseHeader, CaseRecord, FieldMap, MAX_ID},
  child::{ChildKind, Children},
  normalize_case_key,
};
use serde_json::{Map, Value};

// ─── Results ─────────────────────────────────────────────────────────────────

/// One field that could not be typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
  /// Storage column, e.g. `filing_date` or `parties[2]`.
  pub field:   String,
  /// Payload key, e.g. `data_protocolo` or `partes[2]`.
  pub source:  String,
  pub message: String,
}

impl FieldError {
  fn new(
    field: impl Into<String>,
    source: impl Into<String>,
    message: impl Into<String>,
  ) -> Self {
    Self { field: field.into(), source: source.into(), message: message.into() }
  }
}

impl fmt::Display for FieldError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} ({}): {}", self.field, self.source, self.message)
  }
}

/// A payload that validated only in part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
  pub case_key: String,
  pub errors:   Vec<FieldError>,
  /// Everything that did validate; failed fields hold their defaults.
  pub partial:  CaseRecord,
}

impl Rejection {
  /// One-line rendering for the `error_message` column.
  pub fn summary(&self) -> String {
    self
      .errors
      .iter()
      .map(ToString::to_string)
      .collect::<Vec<_>>()
      .join("; ")
  }
}

/// Outcome of [`validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
  Valid(CaseRecord),
  Invalid(Rejection),
}

impl Validation {
  pub fn case_key(&self) -> &str {
    match self {
      Self::Valid(record) => record.case_key(),
      Self::Invalid(rejection) => &rejection.case_key,
    }
  }

  pub fn is_valid(&self) -> bool { matches!(self, Self::Valid(_)) }
}

// ─── Entry point ─────────────────────────────────────────────────────────────

/// Type one raw payload fetched for `case_key`.
pub fn validate(case_key: &str, payload: &Value) -> Validation {
  let case_key = normalize_case_key(case_key);
  let case_key = case_key.as_str();
  let mut errors = Vec::new();

  let record = match payload {
    Value::Object(obj) => CaseRecord {
      header:   header(case_key, obj, &mut errors),
      children: children(obj, &mut errors),
    },
    other => {
      errors.push(FieldError::new(
        "payload",
        "payload",
        format!("expected an object, got {}", shape(other)),
      ));
      CaseRecord::new(case_key)
    }
  };

  if errors.is_empty() {
    Validation::Valid(record)
  } else {
    tracing::debug!(case_key, errors = errors.len(), "payload failed validation");
    Validation::Invalid(Rejection {
      case_key: case_key.to_owned(),
      errors,
      partial: record,
    })
  }
}

// ─── Header ──────────────────────────────────────────────────────────────────

/// First present, non-null value among the field's keys.
fn lookup<'p>(obj: &'p Map<String, Value>, map: &FieldMap) -> Option<(&'static str, &'p Value)> {
  map
    .keys()
    .find_map(|key| obj.get(key).filter(|v| !v.is_null()).map(|v| (key, v)))
}

fn header(
  case_key: &str,
  obj: &Map<String, Value>,
  errors: &mut Vec<FieldError>,
) -> CaseHeader {
  let mut header = CaseHeader::new(case_key);

  for map in CASE_FIELDS {
    let Some((key, value)) = lookup(obj, map) else {
      continue;
    };
    let applied = match map.column {
      "case_key" => text(value).and_then(|given| {
        if given.is_empty() || given == case_key {
          Ok(())
        } else {
          Err(format!("{given:?} does not match requested key {case_key:?}"))
        }
      }),
      "process_id" => id(value).map(|v| header.process_id = Some(v)),
      "incident_id" => id(value).map(|v| header.incident_id = Some(v)),
      "class" => text(value).map(|raw| {
        let class = CaseClass::parse(&raw);
        if !class.is_recognized() && !raw.is_empty() {
          tracing::warn!(case_key, class = %raw, "unrecognized case class");
        }
        header.class = class;
      }),
      "medium" => text(value).map(|v| header.medium = v),
      "publicity" => text(value).map(|v| header.publicity = v),
      "injunction" => flag(value).map(|v| header.injunction = v),
      "reporting_judge" => text(value).map(|v| header.reporting_judge = v),
      "origin_court" => text(value).map(|v| header.origin_court = v),
      "origin_body" => text(value).map(|v| header.origin_body = v),
      "filing_date" => date(value).map(|v| header.filing_date = v),
      "primary_author" => text(value).map(|v| header.primary_author = v),
      "subjects" => text_list(value).map(|v| header.subjects = v),
      "badges" => text_list(value).map(|v| header.badges = v),
      "origin_numbers" => number_list(value).map(|v| header.origin_numbers = v),
      "volumes" => count(value).map(|v| header.volumes = Some(v)),
      "sheets" => count(value).map(|v| header.sheets = Some(v)),
      "attachments" => count(value).map(|v| header.attachments = Some(v)),
      "source_markup" => markup(value).map(|v| header.source_markup = v),
      _ => Ok(()),
    };
    if let Err(message) = applied {
      errors.push(FieldError::new(map.column, key, message));
    }
  }

  header
}

// ─── Children ────────────────────────────────────────────────────────────────

fn children(obj: &Map<String, Value>, errors: &mut Vec<FieldError>) -> Children {
  let mut children = Children::default();

  for &kind in ChildKind::ALL {
    let source = kind.source_key();
    let items = match obj.get(source) {
      None | Some(Value::Null) => continue,
      Some(Value::Array(items)) => items,
      Some(other) => {
        errors.push(FieldError::new(
          kind.table(),
          source,
          format!("expected a list, got {}", shape(other)),
        ));
        continue;
      }
    };

    for (position, item) in items.iter().enumerate() {
      let field = format!("{}[{position}]", kind.table());
      let origin = format!("{source}[{position}]");
      let values = match item {
        Value::Object(entry) => entry_values(kind, entry, &field, &origin, errors),
        other => {
          errors.push(FieldError::new(
            field,
            origin,
            format!("expected an object, got {}", shape(other)),
          ));
          vec![String::new(); kind.fields().len()]
        }
      };
      children.push_values(kind, values);
    }
  }

  children
}

/// Column values of one list entry. Keys outside the field map (including
/// the crawler's `_index`/`index`/`index_num`) are ignored.
fn entry_values(
  kind: ChildKind,
  entry: &Map<String, Value>,
  field: &str,
  origin: &str,
  errors: &mut Vec<FieldError>,
) -> Vec<String> {
  kind
    .fields()
    .iter()
    .map(|map| match entry.get(map.source) {
      None => String::new(),
      Some(value) => text(value).unwrap_or_else(|message| {
        errors.push(FieldError::new(
          format!("{field}.{}", map.column),
          format!("{origin}.{}", map.source),
          message,
        ));
        String::new()
      }),
    })
    .collect()
}

// ─── Scalar coercions ────────────────────────────────────────────────────────

type Coerced<T> = Result<T, String>;

fn shape(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "a boolean",
    Value::Number(_) => "a number",
    Value::String(_) => "a string",
    Value::Array(_) => "a list",
    Value::Object(_) => "an object",
  }
}

/// Trim and collapse internal whitespace runs.
fn clean(s: &str) -> String { s.split_whitespace().collect::<Vec<_>>().join(" ") }

fn text(value: &Value) -> Coerced<String> {
  match value {
    Value::Null => Ok(String::new()),
    Value::String(s) => Ok(clean(s)),
    Value::Number(n) => Ok(n.to_string()),
    Value::Bool(b) => Ok(b.to_string()),
    other => Err(format!("expected text, got {}", shape(other))),
  }
}

fn markup(value: &Value) -> Coerced<String> {
  match value {
    Value::String(s) => Ok(s.clone()),
    other => Err(format!("expected markup text, got {}", shape(other))),
  }
}

fn unsigned(value: &Value) -> Option<u64> {
  match value {
    Value::Number(n) => n.as_u64(),
    Value::String(s) => s.trim().parse().ok(),
    _ => None,
  }
}

fn id(value: &Value) -> Coerced<u64> {
  match unsigned(value) {
    Some(n) if (1..=MAX_ID).contains(&n) => Ok(n),
    Some(n) if n > MAX_ID => Err(format!("identifier {n} exceeds {MAX_ID}")),
    _ => Err(format!("expected a positive integer, got {value}")),
  }
}

fn count(value: &Value) -> Coerced<u32> {
  unsigned(value)
    .and_then(|n| u32::try_from(n).ok())
    .ok_or_else(|| format!("expected a non-negative count, got {value}"))
}

fn flag(value: &Value) -> Coerced<bool> {
  let invalid = || format!("expected a flag, got {value}");
  match value {
    Value::Bool(b) => Ok(*b),
    Value::Number(n) => match n.as_i64() {
      Some(0) => Ok(false),
      Some(1) => Ok(true),
      _ => Err(invalid()),
    },
    Value::String(s) => match s.trim().to_lowercase().as_str() {
      "" | "0" | "false" | "não" | "nao" | "n" => Ok(false),
      "1" | "true" | "sim" | "s" => Ok(true),
      _ => Err(invalid()),
    },
    // The crawler reports injunctions as a list of labels.
    Value::Array(items) => Ok(!items.is_empty()),
    _ => Err(invalid()),
  }
}

const DATE_FORMATS: &[&str] = &["%d/%m/%Y", "%Y-%m-%d"];

fn date(value: &Value) -> Coerced<Option<NaiveDate>> {
  let Value::String(s) = value else {
    return Err(format!("expected a date, got {}", shape(value)));
  };
  // Some pages append a time of day; only the date part is kept.
  let Some(day) = s.split_whitespace().next() else {
    return Ok(None);
  };
  DATE_FORMATS
    .iter()
    .find_map(|fmt| NaiveDate::parse_from_str(day, fmt).ok())
    .map(Some)
    .ok_or_else(|| format!("expected dd/mm/yyyy, got {s:?}"))
}

fn text_list(value: &Value) -> Coerced<Vec<String>> {
  match value {
    Value::String(s) => {
      let s = clean(s);
      Ok(if s.is_empty() { Vec::new() } else { vec![s] })
    }
    Value::Array(items) => items.iter().map(text).collect(),
    other => Err(format!("expected a list of text, got {}", shape(other))),
  }
}

fn number_list(value: &Value) -> Coerced<Vec<u64>> {
  match value {
    Value::Number(_) => id(value).map(|n| vec![n]),
    Value::String(s) => Ok(
      s.split(|c: char| !c.is_ascii_digit())
        .filter_map(|run| run.parse().ok())
        .collect(),
    ),
    Value::Array(items) => items.iter().map(id).collect(),
    other => Err(format!("expected a list of numbers, got {}", shape(other))),
  }
}
