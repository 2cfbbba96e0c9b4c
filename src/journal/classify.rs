//! Mapping of raw notifications to event types.

use super::records::EventType;
use crate::watcher::{RawEvent, RawEventKind};

/// Classify a raw notification.
///
/// Returns `None` for notifications that are never logged, which today is
/// only modification of a directory.
#[must_use]
pub fn classify(event: &RawEvent) -> Option<EventType> {
    let event_type = match (&event.kind, event.is_directory) {
        (RawEventKind::Created, false) => EventType::FileCreated,
        (RawEventKind::Created, true) => EventType::FolderCreated,
        (RawEventKind::Deleted, false) => EventType::FileDeleted,
        (RawEventKind::Deleted, true) => EventType::FolderDeleted,
        (RawEventKind::Modified, false) => EventType::FileModified,
        (RawEventKind::Modified, true) => return None,
        (RawEventKind::Moved { .. }, false) => EventType::FileMoved,
        (RawEventKind::Moved { .. }, true) => EventType::FolderMoved,
    };
    Some(event_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_table() {
        let cases = [
            (RawEvent::created("/p", false), Some(EventType::FileCreated)),
            (RawEvent::created("/p", true), Some(EventType::FolderCreated)),
            (RawEvent::deleted("/p", false), Some(EventType::FileDeleted)),
            (RawEvent::deleted("/p", true), Some(EventType::FolderDeleted)),
            (RawEvent::modified("/p", false), Some(EventType::FileModified)),
            (RawEvent::modified("/p", true), None),
            (RawEvent::moved("/p", "/q", false), Some(EventType::FileMoved)),
            (RawEvent::moved("/p", "/q", true), Some(EventType::FolderMoved)),
        ];

        for (event, expected) in cases {
            assert_eq!(classify(&event), expected, "{event:?}");
        }
    }
}
