//! Declared column sets for tables that have grown since first release
//!
//! Adding a nullable or defaulted column here is enough for existing
//! databases to pick it up on next start.

use crate::db::schema_sync::{ColumnDefinition, SchemaSync, TableSchema};
use crate::Result;
use sqlx::SqlitePool;
use tracing::info;

pub struct LeadsTableSchema;

impl TableSchema for LeadsTableSchema {
    fn table_name() -> &'static str {
        "leads"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        vec![
            ColumnDefinition::new("id", "TEXT").primary_key(),
            ColumnDefinition::new("first_name", "TEXT").not_null().default("''"),
            ColumnDefinition::new("last_name", "TEXT").not_null().default("''"),
            ColumnDefinition::new("email", "TEXT").not_null().unique(),
            ColumnDefinition::new("phone", "TEXT"),
            ColumnDefinition::new("county", "TEXT"),
            ColumnDefinition::new("conviction_type", "TEXT"),
            ColumnDefinition::new("conviction_year", "INTEGER"),
            ColumnDefinition::new("probation_status", "TEXT"),
            ColumnDefinition::new("urgency", "TEXT"),
            ColumnDefinition::new("reason", "TEXT"),
            ColumnDefinition::new("source", "TEXT"),
            // Campaign attribution
            ColumnDefinition::new("utm_source", "TEXT"),
            ColumnDefinition::new("utm_medium", "TEXT"),
            ColumnDefinition::new("utm_campaign", "TEXT"),
            ColumnDefinition::new("lead_score", "INTEGER").not_null().default("0"),
            ColumnDefinition::new("lead_segment", "TEXT").not_null().default("'cold'"),
            ColumnDefinition::new("conversion_stage", "TEXT").not_null().default("'lead'"),
            ColumnDefinition::new("has_paid", "INTEGER").not_null().default("0"),
            ColumnDefinition::new("amount_paid_cents", "INTEGER").not_null().default("0"),
            ColumnDefinition::new("unsubscribed", "INTEGER").not_null().default("0"),
            // Behavior snapshot inputs
            ColumnDefinition::new("abandoned_checkout", "INTEGER").not_null().default("0"),
            ColumnDefinition::new("visited_pricing", "INTEGER").not_null().default("0"),
            ColumnDefinition::new("emails_opened", "INTEGER").not_null().default("0"),
            ColumnDefinition::new("emails_clicked", "INTEGER").not_null().default("0"),
            ColumnDefinition::new("last_activity_at", "TEXT").not_null(),
            ColumnDefinition::new("notes", "TEXT"),
            ColumnDefinition::new("created_at", "TEXT").not_null(),
            ColumnDefinition::new("updated_at", "TEXT").not_null(),
        ]
    }
}

pub struct ProductsTableSchema;

impl TableSchema for ProductsTableSchema {
    fn table_name() -> &'static str {
        "products"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        vec![
            ColumnDefinition::new("id", "TEXT").primary_key(),
            ColumnDefinition::new("name", "TEXT").not_null(),
            ColumnDefinition::new("slug", "TEXT").not_null().unique(),
            ColumnDefinition::new("description", "TEXT"),
            ColumnDefinition::new("kind", "TEXT").not_null(),
            ColumnDefinition::new("price_cents", "INTEGER").not_null(),
            ColumnDefinition::new("compare_at_cents", "INTEGER"),
            ColumnDefinition::new("status", "TEXT").not_null().default("'draft'"),
            ColumnDefinition::new("stock", "INTEGER"),
            ColumnDefinition::new("views", "INTEGER").not_null().default("0"),
            ColumnDefinition::new("add_to_cart", "INTEGER").not_null().default("0"),
            ColumnDefinition::new("sales", "INTEGER").not_null().default("0"),
            ColumnDefinition::new("revenue_cents", "INTEGER").not_null().default("0"),
            ColumnDefinition::new("created_at", "TEXT").not_null(),
            ColumnDefinition::new("updated_at", "TEXT").not_null(),
        ]
    }
}

pub struct EmailJobsTableSchema;

impl TableSchema for EmailJobsTableSchema {
    fn table_name() -> &'static str {
        "email_jobs"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        vec![
            ColumnDefinition::new("id", "INTEGER").primary_key(),
            ColumnDefinition::new("lead_id", "TEXT").not_null(),
            ColumnDefinition::new("sequence", "TEXT").not_null(),
            ColumnDefinition::new("step_index", "INTEGER").not_null(),
            ColumnDefinition::new("due_at_ms", "INTEGER").not_null(),
            ColumnDefinition::new("status", "TEXT").not_null().default("'pending'"),
            ColumnDefinition::new("attempts", "INTEGER").not_null().default("0"),
            ColumnDefinition::new("last_error", "TEXT"),
            ColumnDefinition::new("created_at", "TEXT").not_null(),
            ColumnDefinition::new("sent_at", "TEXT"),
        ]
    }
}

/// Phase 2 of database initialization
pub async fn sync_all_table_schemas(pool: &SqlitePool) -> Result<()> {
    let mut added = 0;
    added += SchemaSync::sync_table::<LeadsTableSchema>(pool).await?.added.len();
    added += SchemaSync::sync_table::<ProductsTableSchema>(pool).await?.added.len();
    added += SchemaSync::sync_table::<EmailJobsTableSchema>(pool).await?.added.len();

    if added > 0 {
        info!("Schema sync added {} column(s)", added);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_legacy_leads_table_gains_behavior_columns() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::query(
            "CREATE TABLE leads (id TEXT PRIMARY KEY, email TEXT NOT NULL UNIQUE, \
             last_activity_at TEXT NOT NULL, created_at TEXT NOT NULL, updated_at TEXT NOT NULL)",
        )
        .execute(&pool)
        .await
        .unwrap();

        let report = SchemaSync::sync_table::<LeadsTableSchema>(&pool).await.unwrap();
        assert!(report.unresolved.is_empty());
        assert!(report.added.contains(&"emails_opened".to_string()));
        assert!(report.added.contains(&"utm_campaign".to_string()));
    }

    #[test]
    fn test_declared_columns_have_unique_names() {
        let columns = LeadsTableSchema::expected_columns();
        let mut names: Vec<_> = columns.iter().map(|c| c.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), columns.len());
    }
}
