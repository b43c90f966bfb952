//! In-memory `DatabaseServer` used by the unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use super::{DatabaseServer, Migration, Result, TenantDatabase, TenantError};
use crate::models::lead::{CreateLeadRequest, Lead, LeadPage, LeadQuery};

#[derive(Default)]
pub struct MemoryServer {
    databases: Mutex<HashMap<String, Arc<MemoryDatabase>>>,
    opens: Mutex<HashMap<String, usize>>,
    created: Mutex<Vec<String>>,
    denied: Mutex<HashSet<String>>,
    failing_migrations: Mutex<HashMap<String, i64>>,
    failing_connects: Mutex<HashMap<String, usize>>,
    connect_delay: Mutex<Option<Duration>>,
}

impl MemoryServer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_databases(names: &[&str]) -> Arc<Self> {
        let server = Self::default();
        for name in names {
            server.insert_database(name);
        }
        Arc::new(server)
    }

    fn insert_database(&self, name: &str) -> Arc<MemoryDatabase> {
        let failing = self.failing_migrations.lock().unwrap().get(name).copied();
        let database = Arc::new(MemoryDatabase::new(name, failing));
        self.databases
            .lock()
            .unwrap()
            .insert(name.to_string(), database.clone());
        database
    }

    /// CREATE DATABASE `name` will be rejected with a permission error.
    pub fn deny_create(&self, name: &str) {
        self.denied.lock().unwrap().insert(name.to_string());
    }

    /// Migration `version` will fail on database `name` once it is created.
    pub fn fail_migration(&self, name: &str, version: i64) {
        self.failing_migrations
            .lock()
            .unwrap()
            .insert(name.to_string(), version);
    }

    /// The next `times` connects to `name` fail even though it exists.
    pub fn fail_connects(&self, name: &str, times: usize) {
        self.failing_connects
            .lock()
            .unwrap()
            .insert(name.to_string(), times);
    }

    /// Every connect takes `delay` before it succeeds or fails.
    pub fn set_connect_delay(&self, delay: Duration) {
        *self.connect_delay.lock().unwrap() = Some(delay);
    }

    pub fn database(&self, name: &str) -> Option<Arc<MemoryDatabase>> {
        self.databases.lock().unwrap().get(name).cloned()
    }

    pub fn open_count(&self, name: &str) -> usize {
        self.opens.lock().unwrap().get(name).copied().unwrap_or(0)
    }

    pub fn created(&self) -> Vec<String> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl DatabaseServer for MemoryServer {
    async fn create_database(&self, name: &str) -> Result<()> {
        tokio::task::yield_now().await;
        if self.denied.lock().unwrap().contains(name) {
            return Err(TenantError::PermissionDenied {
                database: name.to_string(),
                reason: "must be owner of database".into(),
            });
        }
        if self.databases.lock().unwrap().contains_key(name) {
            return Err(TenantError::DatabaseAlreadyExists(name.to_string()));
        }
        self.insert_database(name);
        self.created.lock().unwrap().push(name.to_string());
        Ok(())
    }

    async fn connect(&self, name: &str) -> Result<Arc<dyn TenantDatabase>> {
        // Widens the window for concurrent first resolutions.
        tokio::task::yield_now().await;
        let delay = *self.connect_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let database = self
            .database(name)
            .ok_or_else(|| TenantError::connection(name, format!("database \"{name}\" does not exist")))?;
        if let Some(left) = self.failing_connects.lock().unwrap().get_mut(name).filter(|n| **n > 0) {
            *left -= 1;
            return Err(TenantError::connection(name, "connection refused"));
        }
        *self.opens.lock().unwrap().entry(name.to_string()).or_default() += 1;
        database.closed.store(false, Ordering::SeqCst);
        Ok(database)
    }
}

pub struct MemoryDatabase {
    name: String,
    failing_migration: Option<i64>,
    applied: Mutex<Vec<i64>>,
    leads: Mutex<Vec<Lead>>,
    queries: AtomicUsize,
    closed: AtomicBool,
}

impl MemoryDatabase {
    fn new(name: &str, failing_migration: Option<i64>) -> Self {
        Self {
            name: name.to_string(),
            failing_migration,
            applied: Mutex::new(Vec::new()),
            leads: Mutex::new(Vec::new()),
            queries: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    pub fn applied(&self) -> Vec<i64> {
        self.applied.lock().unwrap().clone()
    }

    /// Number of statements issued against this database.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn touch(&self) {
        self.queries.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl TenantDatabase for MemoryDatabase {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run_migration(&self, migration: &Migration) -> std::result::Result<(), sqlx::Error> {
        self.touch();
        if self.failing_migration == Some(migration.version) {
            return Err(sqlx::Error::Protocol(format!(
                "syntax error in migration {}",
                migration.version
            )));
        }
        self.applied.lock().unwrap().push(migration.version);
        Ok(())
    }

    async fn applied_versions(&self) -> std::result::Result<Vec<i64>, sqlx::Error> {
        self.touch();
        let mut versions = self.applied();
        versions.sort_unstable();
        Ok(versions)
    }

    async fn list_leads(&self, query: &LeadQuery) -> std::result::Result<LeadPage, sqlx::Error> {
        self.touch();
        let needle = query.search_term().map(|s| s.to_lowercase());
        let mut matching: Vec<Lead> = self
            .leads
            .lock()
            .unwrap()
            .iter()
            .filter(|lead| match &needle {
                Some(n) => [&lead.name, &lead.email, &lead.phone]
                    .iter()
                    .any(|field| field.to_lowercase().contains(n.as_str())),
                None => true,
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.id.cmp(&a.id));

        let total = matching.len() as i64;
        let data = matching
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.per_page() as usize)
            .collect();
        Ok(LeadPage::new(data, total, query))
    }

    async fn find_lead(&self, id: i64) -> std::result::Result<Option<Lead>, sqlx::Error> {
        self.touch();
        Ok(self.leads.lock().unwrap().iter().find(|l| l.id == id).cloned())
    }

    async fn insert_lead(&self, lead: &CreateLeadRequest) -> std::result::Result<Lead, sqlx::Error> {
        self.touch();
        let mut leads = self.leads.lock().unwrap();
        let now = Utc::now();
        let row = Lead {
            id: leads.len() as i64 + 1,
            name: lead.name.clone(),
            email: lead.email.clone(),
            phone: lead.phone.clone(),
            created_at: now,
            updated_at: now,
        };
        leads.push(row.clone());
        Ok(row)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
