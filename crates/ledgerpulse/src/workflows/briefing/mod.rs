//! The briefing pipeline: capture a financial snapshot per connected
//! client, diff it against the previous capture, draft an update when the
//! changes warrant one, and move the schedule forward.

pub mod compose;
pub mod diff;
pub mod domain;
pub mod extract;
pub mod ledger;
pub mod mailbox;
pub mod policy;
pub mod router;
pub mod schedule;
pub mod service;
pub mod snapshot;
pub mod store;

pub use compose::{
    ComposePayload, ComposerError, ComposerGateway, DraftComposer, DraftContent,
    HttpComposerClient, COMPOSER_SYSTEM_INSTRUCTION,
};
pub use diff::{diff, ChangeRecord, DiffOutcome};
pub use domain::{
    Client, ClientId, ClientUpdate, ComposerMode, Draft, DraftId, DraftStatus, Frequency,
    Schedule, ScheduleError, TenantId, TenantSettings,
};
pub use extract::{find_value, sum_last_column, Cell, DataRow, ReportNode, ReportTree, SectionNode};
pub use ledger::{
    AccessTokenProvider, HttpLedgerClient, LedgerError, LedgerGateway, OpenItem, OpenItemKind,
    ReportKind,
};
pub use mailbox::{HttpMailboxClient, MailboxError, MailboxGateway};
pub use policy::should_use_composer;
pub use router::briefing_router;
pub use schedule::{is_due, next_run};
pub use service::{BriefingError, BriefingService, ClientRunOutcome, SkipReason};
pub use snapshot::{CollectionError, OpenItemSummary, Snapshot, SnapshotBuilder};
pub use store::{
    ClientDirectory, DraftApproval, DraftStore, NewDraft, SnapshotStore, StoreError,
};
