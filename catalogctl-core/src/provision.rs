//! Provisioning driver: applies schemas and seed data tenant by tenant.
//!
//! Runs are strictly sequential. Each tenant gets one dedicated, non-pooled
//! connection against its composed DSN; the connection is closed before the
//! next tenant starts, on the error path as well as on success. The first
//! failure aborts the run and leaves the remaining tenants unprovisioned —
//! there is no retry and no rollback of the failing tenant's partial work.

use std::fs;
use std::path::Path;

use sqlx::{Connection, PgConnection};
use tracing::info;

use crate::config::{CatalogConfig, TenantSpec};
use crate::dsn::compose_dsn;
use crate::error::{CatalogError, Result, redact_database_url};

/// Ensures every tenant schema exists and applies the schema script to each.
///
/// # Errors
/// Returns `CatalogError::Configuration` when no `schema_sql` script is
/// configured, `CatalogError::Io` when the script cannot be read, and
/// `CatalogError::Database` on the first failing tenant. Configuration and
/// I/O problems are detected before any connection is opened.
pub async fn bootstrap(config: &CatalogConfig, base: &str) -> Result<()> {
    let script_path = config.schema_sql.as_deref().ok_or_else(|| {
        CatalogError::configuration(
            "bootstrap: no 'schema_sql' script configured in the tenant file",
        )
    })?;
    let schema_sql = read_script(script_path)?;

    for tenant in &config.tenants {
        info!("== {} ==", tenant.identifier);
        let dsn = compose_dsn(base, &tenant.schema_name)?;
        with_connection(&dsn, tenant, async |conn| {
            ensure_schema(conn, tenant).await?;
            info!("  -> apply schema");
            run_script(conn, &schema_sql, tenant, "schema script").await
        })
        .await?;
    }
    Ok(())
}

/// Applies the seed-data script to every tenant.
///
/// # Errors
/// Returns `CatalogError::Configuration` when no `seed_sql` script is
/// configured (before any connection is opened), `CatalogError::Io` when it
/// cannot be read, and `CatalogError::Database` on the first failing tenant.
pub async fn seed(config: &CatalogConfig, base: &str) -> Result<()> {
    let script_path = config.seed_sql.as_deref().ok_or_else(|| {
        CatalogError::configuration("seed: no 'seed_sql' script configured in the tenant file")
    })?;
    let seed_sql = read_script(script_path)?;

    for tenant in &config.tenants {
        info!("== {} (seed) ==", tenant.identifier);
        let dsn = compose_dsn(base, &tenant.schema_name)?;
        with_connection(&dsn, tenant, async |conn| {
            run_script(conn, &seed_sql, tenant, "seed script").await
        })
        .await?;
    }
    Ok(())
}

/// Opens one connection, runs `body`, and closes the connection again.
///
/// The close happens on both paths; a body error wins over a close error.
async fn with_connection<F>(dsn: &str, tenant: &TenantSpec, body: F) -> Result<()>
where
    F: AsyncFnOnce(&mut PgConnection) -> Result<()>,
{
    let mut conn = PgConnection::connect(dsn).await.map_err(|e| {
        CatalogError::database_failed(
            format!(
                "tenant '{}': connecting to {}",
                tenant.identifier,
                redact_database_url(dsn)
            ),
            e,
        )
    })?;

    let outcome = body(&mut conn).await;
    let closed = conn.close().await;
    outcome?;
    closed.map_err(|e| {
        CatalogError::database_failed(
            format!("tenant '{}': closing connection", tenant.identifier),
            e,
        )
    })
}

/// Idempotently ensures the tenant schema exists, owned by the connecting
/// principal. The identifier is double-quoted; the resolver has already
/// restricted it to identifier-safe characters.
async fn ensure_schema(conn: &mut PgConnection, tenant: &TenantSpec) -> Result<()> {
    let stmt = format!(
        "CREATE SCHEMA IF NOT EXISTS \"{}\" AUTHORIZATION CURRENT_USER",
        tenant.schema_name
    );
    sqlx::raw_sql(&stmt).execute(&mut *conn).await.map_err(|e| {
        CatalogError::database_failed(
            format!(
                "tenant '{}': ensuring schema '{}'",
                tenant.identifier, tenant.schema_name
            ),
            e,
        )
    })?;
    info!("  -> schema '{}' present", tenant.schema_name);
    Ok(())
}

/// Executes a SQL document verbatim. `raw_sql` uses the simple query
/// protocol, so multi-statement scripts run as written.
async fn run_script(
    conn: &mut PgConnection,
    sql: &str,
    tenant: &TenantSpec,
    what: &str,
) -> Result<()> {
    sqlx::raw_sql(sql)
        .execute(&mut *conn)
        .await
        .map(|_| ())
        .map_err(|e| {
            CatalogError::database_failed(
                format!("tenant '{}': applying {what}", tenant.identifier),
                e,
            )
        })
}

fn read_script(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .map_err(|e| CatalogError::io_failed(format!("reading SQL script {}", path.display()), e))
}
