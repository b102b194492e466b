//! Corporate accounts awaiting approval, with their uploaded documents.

use super::{any_contains, needle, ViewListing};
use crate::error::ActionError;
use crate::orm::{corporate_documents, users};
use crate::realtime::TableTopic;
use crate::storage::StorageBackend;
use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CorporateFilter {
    pub search: String,
    /// `pending`, `approved`, `rejected` or `all`
    pub status: Option<String>,
}

impl Default for CorporateFilter {
    fn default() -> Self {
        Self {
            search: String::new(),
            status: Some("pending".to_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CorporateDocument {
    pub id: Uuid,
    pub document_type: String,
    pub file_path: String,
    /// Short-lived link; None if signing failed.
    pub url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CorporateRow {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub company_name: Option<String>,
    pub phone: Option<String>,
    pub corporate_status: Option<String>,
    pub documents: Vec<CorporateDocument>,
    pub created_at: DateTime<Utc>,
}

impl CorporateRow {
    pub fn matches(&self, search: &str) -> bool {
        match needle(search) {
            Some(n) => any_contains(
                &n,
                [
                    Some(self.email.as_str()),
                    self.full_name.as_deref(),
                    self.company_name.as_deref(),
                    self.phone.as_deref(),
                ],
            ),
            None => true,
        }
    }
}

pub fn topics() -> Vec<TableTopic> {
    vec![
        TableTopic::table("users"),
        TableTopic::table("corporate_documents"),
    ]
}

async fn sign(storage: &dyn StorageBackend, path: &str, ttl: Duration) -> Option<String> {
    match storage.signed_url(path, ttl).await {
        Ok(url) => Some(url),
        Err(e) => {
            log::warn!("Failed to sign corporate document {}: {}", path, e);
            None
        }
    }
}

pub async fn load(
    db: &DatabaseConnection,
    storage: &dyn StorageBackend,
    ttl: Duration,
    filter: &CorporateFilter,
    limit: u64,
) -> Result<ViewListing<CorporateRow>, ActionError> {
    let mut query = users::Entity::find().filter(users::Column::UserType.eq("corporate"));
    if let Some(status) = super::status_filter(&filter.status) {
        query = query.filter(users::Column::CorporateStatus.eq(status));
    }

    let found = query
        .order_by_desc(users::Column::CreatedAt)
        .limit(limit)
        .all(db)
        .await?;

    let mut documents: HashMap<Uuid, Vec<corporate_documents::Model>> = HashMap::new();
    if !found.is_empty() {
        let docs = corporate_documents::Entity::find()
            .filter(corporate_documents::Column::UserId.is_in(found.iter().map(|u| u.id)))
            .order_by_asc(corporate_documents::Column::CreatedAt)
            .all(db)
            .await?;
        for doc in docs {
            documents.entry(doc.user_id).or_default().push(doc);
        }
    }

    let mut rows = Vec::with_capacity(found.len());
    for user in found {
        let mut signed = Vec::new();
        for doc in documents.remove(&user.id).unwrap_or_default() {
            signed.push(CorporateDocument {
                url: sign(storage, &doc.file_path, ttl).await,
                id: doc.id,
                document_type: doc.document_type,
                file_path: doc.file_path,
            });
        }
        rows.push(CorporateRow {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            company_name: user.company_name,
            phone: user.phone,
            corporate_status: user.corporate_status,
            documents: signed,
            created_at: user.created_at.with_timezone(&Utc),
        });
    }

    Ok(ViewListing::filtered(rows, |r| r.matches(&filter.search)))
}
