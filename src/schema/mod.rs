use serde::Serialize;

mod validation;

pub use validation::{
    validate_payload, ValidationFailure, Violation, ALLOWED_FIELDS, DEFAULT_ES_SOURCE_INDEX,
};

/// A validated pipeline registration, discriminated by the `service` tag.
///
/// Exactly one variant is selected per request. Serializes flat (tag inline
/// next to the variant's fields), which is the shape forwarded to Airflow as
/// the DAG run conf.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "service")]
pub enum RegistrationConfig {
    #[serde(rename = "mysql")]
    Mysql(MysqlConfig),
    #[serde(rename = "elasticsearch")]
    Elasticsearch(ElasticsearchConfig),
}

/// Registration for a MySQL-sourced pipeline.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MysqlConfig {
    /// Downstream schema-registry key; hyphens already normalized to underscores
    pub project_name: String,
    pub st_seq: i64,
    /// Defaults when the caller does not name a source index
    pub es_source_index: String,
    pub query: String,

    pub mysql_host: String,
    pub mysql_database: String,
    pub mysql_table: String,
    pub user: String,
    pub password: String,

    pub fields: Vec<String>,
}

/// Registration for an Elasticsearch-sourced pipeline.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ElasticsearchConfig {
    pub project_name: String,
    pub st_seq: i64,
    pub es_source_index: String,
    pub query: String,

    pub es_target_hosts: String,
    pub es_target_index: String,
    pub user: String,
    pub password: String,

    pub fields: Vec<String>,
}

impl RegistrationConfig {
    /// The `service` tag this configuration was validated against.
    pub fn service(&self) -> &'static str {
        match self {
            RegistrationConfig::Mysql(_) => "mysql",
            RegistrationConfig::Elasticsearch(_) => "elasticsearch",
        }
    }

    /// The pipeline DAG triggered for this service (fixed, closed mapping).
    pub fn dag_id(&self) -> &'static str {
        match self {
            RegistrationConfig::Mysql(_) => "mysql_pipeline_dag",
            RegistrationConfig::Elasticsearch(_) => "elasticsearch_pipeline_dag",
        }
    }

    pub fn project_name(&self) -> &str {
        match self {
            RegistrationConfig::Mysql(c) => &c.project_name,
            RegistrationConfig::Elasticsearch(c) => &c.project_name,
        }
    }
}
