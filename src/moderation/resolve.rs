//! Report resolution.
//!
//! Approving runs the kind-specific process procedure first. Only if that
//! succeeds are the optional side effects attempted, block owner and then
//! delete content, each reported on its own. A failed side effect never undoes
//! the resolution and never fails the approve.

use super::list::{load_reports, ReportFilter, ReportListing, ReportStore};
use super::report::{ReportKind, ReportRow, ReportStatus, ReportTarget};
use crate::dispatch::{ActionDispatcher, AdminAction};
use crate::error::ActionError;
use crate::notice::Notice;
use crate::processing::ProcessingMarker;
use crate::rpc::Params;
use crate::session::AdminContext;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ApproveOptions {
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub delete_target: bool,
    #[serde(default)]
    pub block_owner: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SideEffectKind {
    BlockOwner,
    DeleteTarget,
}

impl SideEffectKind {
    fn failure_message(&self) -> &'static str {
        match self {
            SideEffectKind::BlockOwner => "The report was approved, but blocking the user failed.",
            SideEffectKind::DeleteTarget => {
                "The report was approved, but deleting the content failed."
            }
        }
    }
}

#[derive(Debug)]
pub struct SideEffect {
    pub kind: SideEffectKind,
    pub result: Result<Notice, ActionError>,
}

impl SideEffect {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    pub fn notice(&self) -> Notice {
        match &self.result {
            Ok(notice) => notice.clone(),
            Err(e) => {
                log::error!("Report side effect {:?} failed: {}", self.kind, e);
                Notice::error(self.kind.failure_message())
            }
        }
    }
}

#[derive(Debug)]
pub struct ResolveOutcome {
    pub report_id: Uuid,
    pub status: ReportStatus,
    pub side_effects: Vec<SideEffect>,
    /// The list re-fetched after the resolution. None when that fetch failed.
    pub refreshed: Option<ReportListing>,
}

impl ResolveOutcome {
    /// One notice for the resolution and one per side effect.
    pub fn notices(&self) -> Vec<Notice> {
        let mut notices = vec![Notice::success(match self.status {
            ReportStatus::Approved => "Report approved.",
            ReportStatus::Rejected => "Report rejected.",
            ReportStatus::Pending => "Report updated.",
        })];
        notices.extend(self.side_effects.iter().map(SideEffect::notice));
        if self.refreshed.is_none() {
            notices.push(Notice::warning("The report list could not be refreshed."));
        }
        notices
    }

    pub fn side_effect(&self, kind: SideEffectKind) -> Option<&SideEffect> {
        self.side_effects.iter().find(|s| s.kind == kind)
    }
}

/// Reason recorded when a report approval blocks the content owner.
pub fn block_reason(notes: Option<&str>, report_reason: &str) -> String {
    format!("Report approved: {}", notes.unwrap_or(report_reason))
}

fn clean_notes(notes: Option<String>) -> Option<String> {
    notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
}

/// Resolves reports and files admin reports.
#[derive(Clone)]
pub struct ReportDesk {
    dispatcher: ActionDispatcher,
    store: Arc<dyn ReportStore>,
    max_rows: u64,
}

impl ReportDesk {
    pub fn new(dispatcher: ActionDispatcher, store: Arc<dyn ReportStore>, max_rows: u64) -> Self {
        Self {
            dispatcher,
            store,
            max_rows,
        }
    }

    pub fn store(&self) -> &Arc<dyn ReportStore> {
        &self.store
    }

    pub async fn list(&self, filter: &ReportFilter) -> Result<ReportListing, ActionError> {
        load_reports(self.store.as_ref(), filter, self.max_rows).await
    }

    pub async fn approve(
        &self,
        admin: &AdminContext,
        report: &ReportRow,
        options: ApproveOptions,
        filter: &ReportFilter,
    ) -> Result<ResolveOutcome, ActionError> {
        if !report.is_pending() {
            return Err(ActionError::NotPending);
        }

        let _guard = self
            .processing()
            .try_begin(report.marker_key())
            .ok_or(ActionError::InProgress)?;

        let notes = clean_notes(options.notes);
        self.process(admin, report, ReportStatus::Approved, notes.clone())
            .await?;

        let mut side_effects = Vec::new();
        if options.block_owner {
            side_effects.push(SideEffect {
                kind: SideEffectKind::BlockOwner,
                result: self.block_owner(admin, report, notes.as_deref()).await,
            });
        }
        if options.delete_target {
            side_effects.push(SideEffect {
                kind: SideEffectKind::DeleteTarget,
                result: self.delete_target(admin, report).await,
            });
        }

        Ok(ResolveOutcome {
            report_id: report.id,
            status: ReportStatus::Approved,
            side_effects,
            refreshed: self.refresh(filter).await,
        })
    }

    /// Notes are required; a blank rejection never leaves this server.
    pub async fn reject(
        &self,
        admin: &AdminContext,
        report: &ReportRow,
        notes: &str,
        filter: &ReportFilter,
    ) -> Result<ResolveOutcome, ActionError> {
        let notes = notes.trim();
        if notes.is_empty() {
            return Err(ActionError::validation(
                "Please explain why the report is rejected.",
            ));
        }
        if !report.is_pending() {
            return Err(ActionError::NotPending);
        }

        let _guard = self
            .processing()
            .try_begin(report.marker_key())
            .ok_or(ActionError::InProgress)?;

        self.process(
            admin,
            report,
            ReportStatus::Rejected,
            Some(notes.to_string()),
        )
        .await?;

        Ok(ResolveOutcome {
            report_id: report.id,
            status: ReportStatus::Rejected,
            side_effects: Vec::new(),
            refreshed: self.refresh(filter).await,
        })
    }

    /// Files an admin report against a listing. It enters the queue as pending.
    pub async fn report_listing(
        &self,
        admin: &AdminContext,
        listing_id: Uuid,
        reason: &str,
        details: Option<&str>,
    ) -> Result<Notice, ActionError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ActionError::validation("A report reason is required."));
        }
        let details = details.map(str::trim).filter(|d| !d.is_empty());

        let _guard = self
            .processing()
            .try_begin(ProcessingMarker::key("listing-report", listing_id))
            .ok_or(ActionError::InProgress)?;

        let id = self
            .store
            .create_admin_report(admin.admin_id, listing_id, reason, details)
            .await?;

        log::info!(
            "Admin {} reported listing {} (report {})",
            admin.username,
            listing_id,
            id
        );
        Ok(Notice::success("Listing reported."))
    }

    fn processing(&self) -> &ProcessingMarker {
        self.dispatcher.processing()
    }

    /// The transition of record.
    async fn process(
        &self,
        admin: &AdminContext,
        report: &ReportRow,
        status: ReportStatus,
        notes: Option<String>,
    ) -> Result<(), ActionError> {
        let procedure = report.kind.process_procedure();
        let params = Params::new()
            .uuid("p_report_id", report.id)
            .uuid("p_admin_id", admin.admin_id)
            .text("p_status", status.as_str())
            .opt_text("p_notes", notes);

        self.dispatcher
            .rpc()
            .call(procedure, params)
            .await
            .map_err(|e| {
                log::error!("{} for report {} failed: {}", procedure, report.id, e);
                ActionError::from(e)
            })?;

        log::info!(
            "Admin {} marked {} report {} as {}",
            admin.username,
            report.kind.table(),
            report.id,
            status.as_str()
        );
        Ok(())
    }

    async fn block_owner(
        &self,
        admin: &AdminContext,
        report: &ReportRow,
        notes: Option<&str>,
    ) -> Result<Notice, ActionError> {
        let user_id = report
            .content_owner()
            .ok_or(ActionError::NotFound("Content owner"))?;

        self.dispatcher
            .dispatch(
                admin,
                AdminAction::BlockUser {
                    user_id,
                    reason: block_reason(notes, &report.reason),
                    until: None,
                },
            )
            .await
    }

    async fn delete_target(
        &self,
        admin: &AdminContext,
        report: &ReportRow,
    ) -> Result<Notice, ActionError> {
        let action = match (&report.target, report.kind) {
            (ReportTarget::Message(m), ReportKind::Message) => {
                AdminAction::DeleteMessage { message_id: m.id }
            }
            (ReportTarget::Listing(l), _) => AdminAction::DeleteListing { listing_id: l.id },
            _ => return Err(ActionError::NotFound("Reported content")),
        };

        self.dispatcher.dispatch(admin, action).await
    }

    async fn refresh(&self, filter: &ReportFilter) -> Option<ReportListing> {
        match self.list(filter).await {
            Ok(listing) => Some(listing),
            Err(e) => {
                log::error!("Failed to refresh reports after resolution: {}", e);
                None
            }
        }
    }
}
