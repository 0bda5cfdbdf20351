use super::{ElasticsearchConfig, MysqlConfig, RegistrationConfig};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// Allowed members of the `fields` projection list.
pub const ALLOWED_FIELDS: [&str; 4] = ["an_title", "in_date", "kw_docid", "an_content"];

/// Source index used when a mysql registration does not name one.
pub const DEFAULT_ES_SOURCE_INDEX: &str = "lucy_main_v4_20240314";

/// One violated constraint, keyed by the offending field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    pub field: String,
    pub message: String,
}

impl Violation {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Every constraint a payload violated. Validation is all-or-nothing: a
/// single entry here rejects the whole payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationFailure {
    pub violations: Vec<Violation>,
}

impl ValidationFailure {
    fn single(field: &str, message: impl Into<String>) -> Self {
        Self {
            violations: vec![Violation::new(field, message)],
        }
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .violations
            .iter()
            .map(|v| format!("{}: {}", v.field, v.message))
            .collect();
        write!(f, "invalid registration payload: {}", parts.join("; "))
    }
}

impl std::error::Error for ValidationFailure {}

/// Validates an inbound registration payload into a canonical
/// [`RegistrationConfig`].
///
/// The `service` tag is resolved first; it alone decides which variant's
/// field set is required, so nothing else is checked until the tag is usable.
/// After that, every remaining constraint is checked and all violations are
/// collected, not just the first.
///
/// Rules:
/// - `project_name`: no spaces; every `-` replaced with `_` (the name is used
///   as a schema-registry key, which forbids hyphens)
/// - `st_seq`: JSON integer
/// - `fields`: non-empty list drawn from [`ALLOWED_FIELDS`]; a rejection
///   names every invalid member plus the sorted allow-list
/// - variant-specific connection fields must be present strings;
///   `es_source_index` is defaulted for mysql and mandatory for elasticsearch
pub fn validate_payload(payload: &Value) -> Result<RegistrationConfig, ValidationFailure> {
    let Some(map) = payload.as_object() else {
        return Err(ValidationFailure::single("body", "must be a JSON object"));
    };

    let service = match map.get("service") {
        Some(Value::String(s)) => s.as_str(),
        Some(_) => return Err(ValidationFailure::single("service", "must be a string")),
        None => return Err(ValidationFailure::single("service", "field is required")),
    };
    if service != "mysql" && service != "elasticsearch" {
        return Err(ValidationFailure::single(
            "service",
            format!("unknown service '{}', must be one of: mysql, elasticsearch", service),
        ));
    }

    let mut violations = Vec::new();

    let project_name = require_project_name(map, &mut violations);
    let st_seq = require_int(map, "st_seq", &mut violations);
    let query = require_str(map, "query", &mut violations);
    let fields = require_fields(map, &mut violations);

    // Helpers return placeholders on failure; a config is only assembled
    // once the violation list is confirmed empty.
    let config = match service {
        "mysql" => RegistrationConfig::Mysql(MysqlConfig {
            project_name,
            st_seq,
            es_source_index: optional_str(map, "es_source_index", &mut violations)
                .unwrap_or_else(|| DEFAULT_ES_SOURCE_INDEX.to_string()),
            query,
            mysql_host: require_str(map, "mysql_host", &mut violations),
            mysql_database: require_str(map, "mysql_database", &mut violations),
            mysql_table: require_str(map, "mysql_table", &mut violations),
            user: require_str(map, "user", &mut violations),
            password: require_str(map, "password", &mut violations),
            fields,
        }),
        _ => RegistrationConfig::Elasticsearch(ElasticsearchConfig {
            project_name,
            st_seq,
            es_source_index: require_str(map, "es_source_index", &mut violations),
            query,
            es_target_hosts: require_str(map, "es_target_hosts", &mut violations),
            es_target_index: require_str(map, "es_target_index", &mut violations),
            user: require_str(map, "user", &mut violations),
            password: require_str(map, "password", &mut violations),
            fields,
        }),
    };

    if violations.is_empty() {
        Ok(config)
    } else {
        Err(ValidationFailure { violations })
    }
}

/// Required string field. Records a violation and returns an empty
/// placeholder when missing or mistyped.
fn require_str(map: &Map<String, Value>, key: &str, violations: &mut Vec<Violation>) -> String {
    match map.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(_) => {
            violations.push(Violation::new(key, "must be a string"));
            String::new()
        }
        None => {
            violations.push(Violation::new(key, "field is required"));
            String::new()
        }
    }
}

/// Optional string field. `None` means absent; a present non-string records
/// a violation and also reads as `None`.
fn optional_str(
    map: &Map<String, Value>,
    key: &str,
    violations: &mut Vec<Violation>,
) -> Option<String> {
    match map.get(key) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            violations.push(Violation::new(key, "must be a string"));
            None
        }
        None => None,
    }
}

/// Required integer field. No string coercion: `"5"` is a violation.
fn require_int(map: &Map<String, Value>, key: &str, violations: &mut Vec<Violation>) -> i64 {
    match map.get(key).map(Value::as_i64) {
        Some(Some(n)) => n,
        Some(None) => {
            violations.push(Violation::new(key, "must be an integer"));
            0
        }
        None => {
            violations.push(Violation::new(key, "field is required"));
            0
        }
    }
}

/// Checks `project_name` and applies hyphen normalization.
fn require_project_name(map: &Map<String, Value>, violations: &mut Vec<Violation>) -> String {
    let name = require_str(map, "project_name", violations);
    if name.contains(' ') {
        violations.push(Violation::new("project_name", "must not contain spaces"));
    }
    name.replace('-', "_")
}

/// Checks the `fields` projection list against [`ALLOWED_FIELDS`].
fn require_fields(map: &Map<String, Value>, violations: &mut Vec<Violation>) -> Vec<String> {
    let entries = match map.get("fields") {
        Some(Value::Array(items)) => items,
        Some(_) => {
            violations.push(Violation::new("fields", "must be a list of strings"));
            return Vec::new();
        }
        None => {
            violations.push(Violation::new("fields", "field is required"));
            return Vec::new();
        }
    };

    let mut fields = Vec::with_capacity(entries.len());
    for entry in entries {
        match entry {
            Value::String(s) => fields.push(s.clone()),
            _ => {
                violations.push(Violation::new("fields", "must be a list of strings"));
                return Vec::new();
            }
        }
    }

    if fields.is_empty() {
        violations.push(Violation::new("fields", "must contain at least one entry"));
        return fields;
    }

    let invalid: Vec<&str> = fields
        .iter()
        .map(String::as_str)
        .filter(|f| !ALLOWED_FIELDS.contains(f))
        .collect();
    if !invalid.is_empty() {
        let mut allowed = ALLOWED_FIELDS.to_vec();
        allowed.sort_unstable();
        violations.push(Violation::new(
            "fields",
            format!("Invalid fields: {:?}. Allowed: {:?}", invalid, allowed),
        ));
    }

    fields
}
