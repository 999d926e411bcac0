use std::fmt::Display;

use storedesk_client::{Notification, NotificationKind, Notifier};

/// Write a message to stderr.
///
/// This is a wrapper around `eprintln!` that can be further extended
/// to include logging, word wrapping, ANSI filtering etc.
fn print_message(v: impl Display) {
    eprintln!("{v}");
}

/// alias for [print_message]
pub(crate) fn plain(v: impl Display) {
    print_message(v);
}
pub(crate) fn error(v: impl Display) {
    print_message(std::format_args!("❌ ERROR: {v}"));
}
pub(crate) fn updated(v: impl Display) {
    print_message(std::format_args!("✅ {v}"));
}
/// double width character, add an additional space for alignment
pub(crate) fn warning(v: impl Display) {
    print_message(std::format_args!("⚠️  {v}"));
}

/// Prints notifications produced by request outcomes.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn notify(&self, notification: Notification) {
        if notification.message.is_empty() {
            return;
        }
        match notification.kind {
            NotificationKind::Success => updated(notification.message),
            NotificationKind::Warning => warning(notification.message),
            NotificationKind::Error => error(notification.message),
        }
    }
}
