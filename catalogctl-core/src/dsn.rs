//! DSN composition: scoping a base connection string to a tenant schema.
//!
//! The composer takes a base PostgreSQL connection URL and a schema name and
//! produces a new URL whose `options` query parameter carries a
//! `-c search_path=<schema>,public` session directive. Encoding is the
//! failure-prone part: the directive contains a literal space and `=`, both
//! of which must be percent-encoded in the final query string or the
//! resulting DSN is ambiguous. Everything here is a pure function of its
//! inputs; composed DSNs are derived fresh per tenant and never cached.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use url::Url;

use crate::config::TenantSpec;
use crate::error::{CatalogError, Result};

/// Query-string encode set: percent-encode everything except ASCII
/// alphanumerics and `:`, `-`, `_`, `.`.
///
/// Space and `=` are deliberately NOT in the safe set; they occur inside the
/// `options` value and must arrive at the server percent-encoded.
const QUERY_SAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b':')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.');

/// Composes a tenant-scoped connection string.
///
/// The returned URL is the base URL with:
/// - the path defaulted to `/postgres` when the base names no database, so a
///   server-level base DSN is acceptable;
/// - the `options` parameter set to (or extended with) the directive
///   `-c search_path=<schema>,public`, merged onto any existing value with a
///   single space;
/// - the full query string re-encoded with [`QUERY_SAFE`], preserving blank
///   parameter values and parameter order.
///
/// Composing the output again with another schema appends a second `-c`
/// directive; multiple directives in one `options` value are cumulative for
/// the session.
///
/// Schema names are assumed identifier-safe; the configuration resolver
/// enforces that before any composition happens.
///
/// # Errors
/// Returns `CatalogError::ConnectionString` if the base cannot be parsed,
/// and `CatalogError::Configuration` if it does not use a
/// `postgres`/`postgresql` scheme or names no host.
///
/// # Example
/// ```rust
/// use catalogctl_core::dsn::compose_dsn;
///
/// let dsn = compose_dsn("postgres://app@db.internal:5432/catalog", "acme").unwrap();
/// assert_eq!(
///     dsn,
///     "postgres://app@db.internal:5432/catalog?options=-c%20search_path%3Dacme%2Cpublic"
/// );
/// ```
pub fn compose_dsn(base: &str, schema: &str) -> Result<String> {
    let mut url = parse_base(base)?;

    // Operators may hand us a server-level DSN with no database; scripts
    // then run against the conventional administrative database.
    if url.path().is_empty() || url.path() == "/" {
        url.set_path("/postgres");
    }

    // Decoded (key, value) pairs in order. A parameter present with an empty
    // value stays distinct from an absent parameter.
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let directive = format!("-c search_path={schema},public");
    match params.iter_mut().find(|(key, _)| key == "options") {
        Some((_, value)) if !value.is_empty() => {
            value.push(' ');
            value.push_str(&directive);
        }
        Some((_, value)) => *value = directive,
        None => params.push(("options".to_string(), directive)),
    }

    let query = params
        .iter()
        .map(|(key, value)| {
            format!(
                "{}={}",
                utf8_percent_encode(key, QUERY_SAFE),
                utf8_percent_encode(value, QUERY_SAFE)
            )
        })
        .collect::<Vec<_>>()
        .join("&");
    url.set_query(Some(&query));

    Ok(url.into())
}

/// Builds the `print-env` payload: a single-line JSON object mapping tenant
/// identifier to composed DSN, in resolver order.
///
/// # Errors
/// Returns `CatalogError::ConnectionString` for an unparseable base DSN and
/// `CatalogError::Serialization` if JSON encoding fails.
pub fn dsn_map(tenants: &[TenantSpec], base: &str) -> Result<String> {
    let mut map = serde_json::Map::new();
    for tenant in tenants {
        let dsn = compose_dsn(base, &tenant.schema_name)?;
        map.insert(tenant.identifier.clone(), serde_json::Value::String(dsn));
    }
    serde_json::to_string(&serde_json::Value::Object(map)).map_err(|e| {
        CatalogError::Serialization {
            context: "encoding tenant DSN map".to_string(),
            source: e,
        }
    })
}

/// Parses and validates the base connection string.
fn parse_base(base: &str) -> Result<Url> {
    let url = Url::parse(base)
        .map_err(|e| CatalogError::connection_string("base DSN is not a valid URL", e))?;

    if !matches!(url.scheme(), "postgres" | "postgresql") {
        return Err(CatalogError::configuration(
            "base DSN must use postgres:// or postgresql:// scheme",
        ));
    }
    if url.host_str().is_none() {
        return Err(CatalogError::configuration(
            "base DSN must specify a host",
        ));
    }

    Ok(url)
}
