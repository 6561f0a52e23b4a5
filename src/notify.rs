use tracing::info;

use crate::models::{Inspection, Machine};

/// Seam for the delegated mail/notification channel. Sends are best-effort;
/// callers never fail a request because a notification could not go out.
pub trait Notifier: Send + Sync + 'static {
    fn inspection_requested(&self, inspection: &Inspection, machine: &Machine, note: Option<&str>);
}

/// Default channel: structured log lines an operator can route elsewhere.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn inspection_requested(&self, inspection: &Inspection, machine: &Machine, note: Option<&str>) {
        info!(
            inspection_id = %inspection.id,
            reference = %inspection.reference,
            machine = %machine.name,
            has_note = note.is_some(),
            "inspection requested from portal"
        );
    }
}
