//! Moderation queue: listing, message and admin reports.

pub mod list;
pub mod report;
pub mod resolve;

pub use list::{
    load_reports, DbReportStore, EmptyState, KindFilter, ReportFilter, ReportListing,
    ReportStore, StatusFilter,
};
pub use report::{ReportAction, ReportKind, ReportRow, ReportStatus, ReportTarget, Resolution};
pub use resolve::{ApproveOptions, ReportDesk, ResolveOutcome, SideEffect, SideEffectKind};
