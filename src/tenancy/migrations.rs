use super::{Result, TenantError};

/// One versioned schema change for a tenant database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    pub version: i64,
    pub description: String,
    pub sql: String,
}

impl Migration {
    pub fn new(version: i64, description: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            version,
            description: description.into(),
            sql: sql.into(),
        }
    }
}

/// Migrations ordered by ascending, unique version.
#[derive(Debug, Clone)]
pub struct MigrationSet {
    migrations: Vec<Migration>,
}

impl MigrationSet {
    pub fn new(mut migrations: Vec<Migration>) -> Result<Self> {
        migrations.sort_by_key(|m| m.version);
        if let Some(pair) = migrations.windows(2).find(|w| w[0].version == w[1].version) {
            return Err(TenantError::InvalidMigrationSet(format!(
                "duplicate version {}",
                pair[0].version
            )));
        }
        if let Some(m) = migrations.iter().find(|m| m.version <= 0) {
            return Err(TenantError::InvalidMigrationSet(format!(
                "version must be positive, got {}",
                m.version
            )));
        }
        Ok(Self { migrations })
    }

    /// The tenant schema shipped with the binary (`migrations/tenant`).
    pub fn tenant() -> Self {
        Self {
            migrations: vec![
                Migration::new(
                    1,
                    "create leads",
                    include_str!("../../migrations/tenant/0001_create_leads.sql"),
                ),
                Migration::new(
                    2,
                    "leads search indexes",
                    include_str!("../../migrations/tenant/0002_leads_search_indexes.sql"),
                ),
                Migration::new(
                    3,
                    "leads updated_at trigger",
                    include_str!("../../migrations/tenant/0003_leads_updated_at_trigger.sql"),
                ),
            ],
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Migration> {
        self.migrations.iter()
    }

    /// Migrations with a version above `version`.
    pub fn after(&self, version: Option<i64>) -> impl Iterator<Item = &Migration> {
        let floor = version.unwrap_or(0);
        self.migrations.iter().filter(move |m| m.version > floor)
    }

    pub fn latest_version(&self) -> Option<i64> {
        self.migrations.last().map(|m| m.version)
    }

    pub fn versions(&self) -> Vec<i64> {
        self.migrations.iter().map(|m| m.version).collect()
    }

    /// Embedded versions not present in `applied`.
    pub fn missing_from(&self, applied: &[i64]) -> Vec<i64> {
        self.migrations
            .iter()
            .map(|m| m.version)
            .filter(|v| !applied.contains(v))
            .collect()
    }

    /// Versions in `applied` that this set does not know about.
    pub fn unknown_in(&self, applied: &[i64]) -> Vec<i64> {
        applied
            .iter()
            .copied()
            .filter(|v| !self.migrations.iter().any(|m| m.version == *v))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }
}
