//! Tenant configuration loading and resolution.
//!
//! The tenant file is a YAML mapping with a `tenants` list. It is parsed into
//! a strongly typed raw document and validated at the boundary: no field is
//! trusted before resolution succeeds. Resolution preserves input order,
//! which later determines both provisioning order and `print-env` output
//! order.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{CatalogError, Result};

/// PostgreSQL caps identifiers at 63 bytes.
const MAX_IDENTIFIER_LEN: usize = 63;

/// A single tenant entry as written in the configuration file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTenant {
    /// Tenant identifier (case-insensitive, normalized to lowercase)
    slug: String,
    /// Optional schema override; `dbname` accepted for compatibility with
    /// older tenant files
    #[serde(alias = "dbname")]
    schema: Option<String>,
    /// Free-text description, carried through but never interpreted
    description: Option<String>,
}

/// The tenant configuration document as written on disk.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    tenants: Vec<RawTenant>,
    schema_sql: Option<PathBuf>,
    seed_sql: Option<PathBuf>,
}

/// A normalized tenant record.
///
/// Constructed once per run during resolution and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantSpec {
    /// Lowercased, identifier-safe tenant identifier, unique within a run
    pub identifier: String,
    /// Target schema name; defaults to the identifier when no override is
    /// present in the document
    pub schema_name: String,
    /// Optional operator-facing description
    pub description: Option<String>,
}

/// Validated tenant configuration.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Tenants in document order
    pub tenants: Vec<TenantSpec>,
    /// Path to the canonical schema-definition script, if configured
    pub schema_sql: Option<PathBuf>,
    /// Path to the optional seed-data script, if configured
    pub seed_sql: Option<PathBuf>,
}

impl CatalogConfig {
    /// Loads and resolves a tenant configuration file.
    ///
    /// # Errors
    /// Returns `CatalogError::Io` if the file cannot be read and
    /// `CatalogError::Configuration` if the document is malformed or fails
    /// validation.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            CatalogError::io_failed(format!("reading tenant file {}", path.display()), e)
        })?;
        Self::from_yaml(&text)
    }

    /// Resolves a tenant configuration from YAML text.
    ///
    /// # Errors
    /// Returns `CatalogError::Configuration` if the `tenants` field is
    /// absent or not a list, an entry lacks a `slug`, a slug or schema name
    /// is not identifier-safe, or two entries resolve to the same identifier.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let raw: RawConfig = serde_yaml::from_str(text).map_err(|e| {
            CatalogError::configuration(format!("invalid tenant configuration: {e}"))
        })?;

        let mut seen = HashSet::new();
        let mut tenants = Vec::with_capacity(raw.tenants.len());
        for entry in raw.tenants {
            let identifier = entry.slug.trim().to_lowercase();
            validate_identifier(&identifier, "tenant slug")?;

            let schema_name = match entry.schema {
                Some(schema) => {
                    validate_identifier(&schema, "schema name")?;
                    schema
                }
                None => identifier.clone(),
            };

            if !seen.insert(identifier.clone()) {
                return Err(CatalogError::configuration(format!(
                    "duplicate tenant identifier '{identifier}'"
                )));
            }

            tenants.push(TenantSpec {
                identifier,
                schema_name,
                description: entry.description,
            });
        }

        Ok(Self {
            tenants,
            schema_sql: raw.schema_sql,
            seed_sql: raw.seed_sql,
        })
    }
}

/// Validates a name against PostgreSQL identifier rules.
///
/// Schema names travel unquoted inside the composed `search_path` directive,
/// so anything outside the identifier-safe character set is rejected here
/// rather than relied on to fail later inside the database.
fn validate_identifier(name: &str, what: &str) -> Result<()> {
    if name.is_empty() {
        return Err(CatalogError::configuration(format!("{what} cannot be empty")));
    }
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(CatalogError::configuration(format!(
            "{what} '{name}' too long: maximum {MAX_IDENTIFIER_LEN} characters"
        )));
    }
    let mut chars = name.chars();
    let first = chars.next().unwrap_or('_');
    if !first.is_ascii_lowercase() && first != '_' {
        return Err(CatalogError::configuration(format!(
            "{what} '{name}' must start with a letter or underscore"
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        return Err(CatalogError::configuration(format!(
            "{what} '{name}' contains invalid characters (only lowercase letters, digits, and underscores allowed)"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_is_case_normalized_and_schema_defaults() {
        let config = CatalogConfig::from_yaml("tenants:\n  - slug: Acme\n").unwrap();

        assert_eq!(config.tenants.len(), 1);
        assert_eq!(config.tenants[0].identifier, "acme");
        assert_eq!(config.tenants[0].schema_name, "acme");
        assert_eq!(config.tenants[0].description, None);
    }

    #[test]
    fn test_schema_override_wins_over_slug() {
        let config =
            CatalogConfig::from_yaml("tenants:\n  - slug: x\n    schema: custom\n").unwrap();

        assert_eq!(config.tenants[0].identifier, "x");
        assert_eq!(config.tenants[0].schema_name, "custom");
    }

    #[test]
    fn test_dbname_alias_accepted() {
        let config =
            CatalogConfig::from_yaml("tenants:\n  - slug: x\n    dbname: legacy\n").unwrap();

        assert_eq!(config.tenants[0].schema_name, "legacy");
    }

    #[test]
    fn test_tenants_must_be_a_list() {
        let err = CatalogConfig::from_yaml("tenants: oops\n").unwrap_err();

        assert!(matches!(err, CatalogError::Configuration { .. }));
    }

    #[test]
    fn test_missing_tenants_field_rejected() {
        let err = CatalogConfig::from_yaml("schema_sql: sql/schema.sql\n").unwrap_err();

        assert!(matches!(err, CatalogError::Configuration { .. }));
    }

    #[test]
    fn test_entry_without_slug_rejected() {
        let err = CatalogConfig::from_yaml("tenants:\n  - schema: orphan\n").unwrap_err();

        assert!(matches!(err, CatalogError::Configuration { .. }));
    }

    #[test]
    fn test_duplicate_identifiers_rejected() {
        let err =
            CatalogConfig::from_yaml("tenants:\n  - slug: acme\n  - slug: ACME\n").unwrap_err();

        assert!(err.to_string().contains("duplicate tenant identifier"));
    }

    #[test]
    fn test_unsafe_schema_name_rejected() {
        let err = CatalogConfig::from_yaml(
            "tenants:\n  - slug: acme\n    schema: \"acme,public; DROP\"\n",
        )
        .unwrap_err();

        assert!(matches!(err, CatalogError::Configuration { .. }));
    }

    #[test]
    fn test_unsafe_slug_rejected() {
        let err = CatalogConfig::from_yaml("tenants:\n  - slug: \"bad tenant\"\n").unwrap_err();

        assert!(matches!(err, CatalogError::Configuration { .. }));
    }

    #[test]
    fn test_input_order_preserved() {
        let config = CatalogConfig::from_yaml(
            "tenants:\n  - slug: zeta\n  - slug: alpha\n  - slug: mid\n",
        )
        .unwrap();

        let order: Vec<&str> = config
            .tenants
            .iter()
            .map(|t| t.identifier.as_str())
            .collect();
        assert_eq!(order, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_duplicate_schema_names_are_not_validated() {
        // Duplicate schemas across tenants are a caller error surfaced by
        // the database, not by the resolver.
        let config = CatalogConfig::from_yaml(
            "tenants:\n  - slug: a\n    schema: shared\n  - slug: b\n    schema: shared\n",
        )
        .unwrap();

        assert_eq!(config.tenants[0].schema_name, "shared");
        assert_eq!(config.tenants[1].schema_name, "shared");
    }

    #[test]
    fn test_script_paths_carried_through() {
        let config = CatalogConfig::from_yaml(
            "tenants:\n  - slug: acme\nschema_sql: sql/01_schema.sql\nseed_sql: sql/02_seed.sql\n",
        )
        .unwrap();

        assert_eq!(config.schema_sql, Some(PathBuf::from("sql/01_schema.sql")));
        assert_eq!(config.seed_sql, Some(PathBuf::from("sql/02_seed.sql")));
    }

    #[test]
    fn test_load_from_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "tenants:").unwrap();
        writeln!(file, "  - slug: acme").unwrap();
        writeln!(file, "    description: Acme Corp").unwrap();

        let config = CatalogConfig::load(file.path()).unwrap();
        assert_eq!(config.tenants[0].identifier, "acme");
        assert_eq!(config.tenants[0].description.as_deref(), Some("Acme Corp"));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = CatalogConfig::load(Path::new("/nonexistent/tenants.yaml")).unwrap_err();

        assert!(matches!(err, CatalogError::Io { .. }));
    }
}
