//! Declarative column synchronization
//!
//! A table's expected columns are declared once in code
//! ([`crate::db::table_schemas`]); on startup any column missing from an
//! existing database is added with `ALTER TABLE ... ADD COLUMN`.
//!
//! SQLite can only add columns that are nullable or carry a default, and
//! never PRIMARY KEY / UNIQUE ones. Such columns are reported as drift and
//! left for a manual migration.

use crate::Result;
use sqlx::{Row, SqlitePool};
use tracing::{info, warn};

/// Column definition with SQL constraints
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,
    /// SQL type (e.g. "TEXT", "INTEGER")
    pub sql_type: String,
    pub not_null: bool,
    pub primary_key: bool,
    pub unique: bool,
    pub default_value: Option<String>,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            not_null: false,
            primary_key: false,
            unique: false,
            default_value: None,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// DEFAULT clause, as raw SQL (quote string literals yourself)
    pub fn default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Whether `ALTER TABLE ADD COLUMN` can create this column
    pub fn can_add_in_place(&self) -> bool {
        !self.primary_key && !self.unique && (!self.not_null || self.default_value.is_some())
    }

    /// Column clause for `ALTER TABLE ADD COLUMN`
    pub fn to_add_column_sql(&self) -> String {
        let mut sql = format!("{} {}", self.name, self.sql_type);
        if self.not_null {
            sql.push_str(" NOT NULL");
        }
        if let Some(default) = &self.default_value {
            sql.push_str(" DEFAULT ");
            sql.push_str(default);
        }
        sql
    }
}

/// Table with a declared column set
pub trait TableSchema {
    fn table_name() -> &'static str;
    fn expected_columns() -> Vec<ColumnDefinition>;
}

/// Outcome of syncing one table
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SyncReport {
    pub added: Vec<String>,
    /// Missing columns that need a manual migration
    pub unresolved: Vec<String>,
}

pub struct SchemaSync;

impl SchemaSync {
    /// Column names currently present in `table`
    pub async fn existing_columns(pool: &SqlitePool, table: &str) -> Result<Vec<String>> {
        let rows = sqlx::query(&format!("PRAGMA table_info({})", table))
            .fetch_all(pool)
            .await?;

        // PRAGMA table_info: (cid, name, type, notnull, dflt_value, pk)
        Ok(rows.iter().map(|row| row.get::<String, _>(1)).collect())
    }

    /// Add every declared column missing from `T`'s table
    pub async fn sync_table<T: TableSchema>(pool: &SqlitePool) -> Result<SyncReport> {
        let table = T::table_name();
        let existing = Self::existing_columns(pool, table).await?;
        let mut report = SyncReport::default();

        if existing.is_empty() {
            warn!("Schema sync: table '{}' does not exist, skipping", table);
            return Ok(report);
        }

        for column in T::expected_columns() {
            if existing.iter().any(|name| name == &column.name) {
                continue;
            }

            if !column.can_add_in_place() {
                warn!(
                    "Schema sync: {}.{} is missing and cannot be added in place",
                    table, column.name
                );
                report.unresolved.push(column.name);
                continue;
            }

            let sql = format!("ALTER TABLE {} ADD COLUMN {}", table, column.to_add_column_sql());
            sqlx::query(&sql).execute(pool).await?;
            info!("Schema sync: added {}.{}", table, column.name);
            report.added.push(column.name);
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Widgets;

    impl TableSchema for Widgets {
        fn table_name() -> &'static str {
            "widgets"
        }

        fn expected_columns() -> Vec<ColumnDefinition> {
            vec![
                ColumnDefinition::new("id", "TEXT").primary_key(),
                ColumnDefinition::new("label", "TEXT"),
                ColumnDefinition::new("count", "INTEGER").not_null().default("0"),
                ColumnDefinition::new("code", "TEXT").unique(),
            ]
        }
    }

    #[test]
    fn test_add_column_sql() {
        let col = ColumnDefinition::new("status", "TEXT").not_null().default("'new'");
        assert_eq!(col.to_add_column_sql(), "status TEXT NOT NULL DEFAULT 'new'");
        assert!(col.can_add_in_place());
        assert!(!ColumnDefinition::new("x", "TEXT").not_null().can_add_in_place());
    }

    #[tokio::test]
    async fn test_sync_adds_missing_columns() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::query("CREATE TABLE widgets (id TEXT PRIMARY KEY)")
            .execute(&pool)
            .await
            .unwrap();

        let report = SchemaSync::sync_table::<Widgets>(&pool).await.unwrap();
        assert_eq!(report.added, vec!["label".to_string(), "count".to_string()]);
        assert_eq!(report.unresolved, vec!["code".to_string()]);

        let columns = SchemaSync::existing_columns(&pool, "widgets").await.unwrap();
        assert!(columns.contains(&"count".to_string()));

        // Second run is a no-op apart from the unresolved column
        let again = SchemaSync::sync_table::<Widgets>(&pool).await.unwrap();
        assert!(again.added.is_empty());
    }

    #[tokio::test]
    async fn test_sync_skips_missing_table() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        let report = SchemaSync::sync_table::<Widgets>(&pool).await.unwrap();
        assert_eq!(report, SyncReport::default());
    }
}
