//! Report rows as the moderation views see them.

use crate::processing::ProcessingMarker;
use crate::rpc::Procedure;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a report was filed against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    Listing,
    Message,
    /// Filed by an admin. Always targets a listing.
    Admin,
}

impl ReportKind {
    pub fn table(&self) -> &'static str {
        match self {
            ReportKind::Listing => "listing_reports",
            ReportKind::Message => "message_reports",
            ReportKind::Admin => "admin_reports",
        }
    }

    /// Procedure that records the resolution of this kind of report.
    pub fn process_procedure(&self) -> Procedure {
        match self {
            ReportKind::Listing => Procedure::ProcessListingReport,
            ReportKind::Message => Procedure::ProcessMessageReport,
            ReportKind::Admin => Procedure::ProcessAdminReport,
        }
    }

    pub fn targets_listing(&self) -> bool {
        !matches!(self, ReportKind::Message)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Pending,
    Approved,
    Rejected,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "pending",
            ReportStatus::Approved => "approved",
            ReportStatus::Rejected => "rejected",
        }
    }

    /// Badge text.
    pub fn label(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "Pending",
            ReportStatus::Approved => "Approved",
            ReportStatus::Rejected => "Rejected",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(ReportStatus::Pending),
            "approved" => Some(ReportStatus::Approved),
            "rejected" => Some(ReportStatus::Rejected),
            _ => None,
        }
    }
}

/// Who resolved a report, when, and why.
///
/// Only built when both resolver and timestamp are present, so a row is
/// either fully resolved or not resolved at all.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub resolver: Uuid,
    pub resolved_at: DateTime<Utc>,
    pub notes: Option<String>,
}

impl Resolution {
    pub fn from_parts(
        resolver: Option<Uuid>,
        resolved_at: Option<DateTime<Utc>>,
        notes: Option<String>,
    ) -> Option<Self> {
        match (resolver, resolved_at) {
            (Some(resolver), Some(resolved_at)) => Some(Resolution {
                resolver,
                resolved_at,
                notes,
            }),
            (None, None) => None,
            _ => {
                log::warn!("Report carries a partial resolution; treating it as unresolved");
                None
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Person {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ListingSummary {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub brand: String,
    pub model: String,
    pub year: i32,
    pub status: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageSummary {
    pub id: Uuid,
    pub sender: Person,
    pub receiver: Person,
    pub content: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ReportTarget {
    Listing(ListingSummary),
    Message(MessageSummary),
    /// The referenced content no longer exists.
    Missing { id: Uuid },
}

/// Per-row controls offered to the admin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportAction {
    Approve,
    Reject,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReportRow {
    pub id: Uuid,
    pub kind: ReportKind,
    pub reporter: Option<Person>,
    pub reason: String,
    pub details: Option<String>,
    pub status: ReportStatus,
    pub resolution: Option<Resolution>,
    pub target: ReportTarget,
    pub created_at: DateTime<Utc>,
}

impl ReportRow {
    pub fn is_pending(&self) -> bool {
        self.status == ReportStatus::Pending
    }

    /// Resolve controls exist only while the report is pending.
    pub fn available_actions(&self) -> Vec<ReportAction> {
        if self.is_pending() {
            vec![ReportAction::Approve, ReportAction::Reject]
        } else {
            Vec::new()
        }
    }

    pub fn marker_key(&self) -> String {
        ProcessingMarker::key("report", self.id)
    }

    pub fn target_id(&self) -> Uuid {
        match &self.target {
            ReportTarget::Listing(l) => l.id,
            ReportTarget::Message(m) => m.id,
            ReportTarget::Missing { id } => *id,
        }
    }

    /// Owner of the reported content: the listing owner or the message sender.
    pub fn content_owner(&self) -> Option<Uuid> {
        match &self.target {
            ReportTarget::Listing(l) => Some(l.owner_id),
            ReportTarget::Message(m) => Some(m.sender.id),
            ReportTarget::Missing { .. } => None,
        }
    }

    /// Case-insensitive substring match over reason, details, reporter and
    /// target fields. A blank search matches everything.
    pub fn matches(&self, search: &str) -> bool {
        let needle = search.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }

        let hit = |s: &str| s.to_lowercase().contains(&needle);
        let hit_opt = |s: &Option<String>| s.as_deref().map(hit).unwrap_or(false);
        let hit_person = |p: &Person| hit_opt(&p.name) || hit_opt(&p.email);

        if hit(&self.reason) || hit_opt(&self.details) {
            return true;
        }
        if self.reporter.as_ref().map(hit_person).unwrap_or(false) {
            return true;
        }

        match &self.target {
            ReportTarget::Listing(l) => hit(&l.brand) || hit(&l.model),
            ReportTarget::Message(m) => {
                hit(&m.content) || hit_person(&m.sender) || hit_person(&m.receiver)
            }
            ReportTarget::Missing { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: ReportStatus) -> ReportRow {
        ReportRow {
            id: Uuid::new_v4(),
            kind: ReportKind::Message,
            reporter: Some(Person {
                id: Uuid::new_v4(),
                name: Some("Ayşe Yılmaz".to_string()),
                email: Some("ayse@example.com".to_string()),
            }),
            reason: "Harassment".to_string(),
            details: Some("Repeated insults".to_string()),
            status,
            resolution: None,
            target: ReportTarget::Message(MessageSummary {
                id: Uuid::new_v4(),
                sender: Person {
                    id: Uuid::new_v4(),
                    name: Some("Spam Sender".to_string()),
                    email: None,
                },
                receiver: Person {
                    id: Uuid::new_v4(),
                    name: None,
                    email: Some("buyer@example.com".to_string()),
                },
                content: "Cheap parts at example dot com".to_string(),
            }),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_resolved_reports_offer_no_actions() {
        assert_eq!(row(ReportStatus::Pending).available_actions().len(), 2);
        assert!(row(ReportStatus::Approved).available_actions().is_empty());
        assert!(row(ReportStatus::Rejected).available_actions().is_empty());
    }

    #[test]
    fn test_search_covers_reporter_and_message_fields() {
        let r = row(ReportStatus::Pending);
        assert!(r.matches(""));
        assert!(r.matches("harass"));
        assert!(r.matches("INSULTS"));
        assert!(r.matches("ayse@"));
        assert!(r.matches("spam sender"));
        assert!(r.matches("buyer@example"));
        assert!(r.matches("cheap parts"));
        assert!(!r.matches("toyota"));
    }

    #[test]
    fn test_partial_resolution_is_discarded() {
        assert!(Resolution::from_parts(Some(Uuid::new_v4()), None, Some("x".into())).is_none());
        assert!(Resolution::from_parts(None, Some(Utc::now()), None).is_none());
        assert!(Resolution::from_parts(Some(Uuid::new_v4()), Some(Utc::now()), None).is_some());
    }

    #[test]
    fn test_message_owner_is_sender() {
        let r = row(ReportStatus::Pending);
        let sender = match &r.target {
            ReportTarget::Message(m) => m.sender.id,
            _ => unreachable!(),
        };
        assert_eq!(r.content_owner(), Some(sender));
    }

    #[test]
    fn test_status_round_trip_through_text() {
        for s in [
            ReportStatus::Pending,
            ReportStatus::Approved,
            ReportStatus::Rejected,
        ] {
            assert_eq!(ReportStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(ReportStatus::parse("open"), None);
    }
}
