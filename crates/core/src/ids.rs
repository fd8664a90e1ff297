//! Reference id generation for tickets, labels, and threads.
//!
//! Ids are derived from uuid v4, so they are collision-resistant and carry
//! no wall-clock ordering. The database UNIQUE constraints remain the
//! authoritative uniqueness check; generation here only makes collisions
//! vanishingly unlikely, it does not prove their absence.

use uuid::Uuid;

pub const TICKET_PREFIX: &str = "TKT-";
pub const LABEL_PREFIX: &str = "LBL-";

fn short_token() -> String {
    Uuid::new_v4().simple().to_string()[..10].to_ascii_uppercase()
}

/// `TKT-` prefixed support-case reference, e.g. `TKT-9F2C41A07B`.
pub fn new_ticket_id() -> String {
    format!("{TICKET_PREFIX}{}", short_token())
}

/// `LBL-` prefixed return-label reference. Prefixed distinctly from ticket
/// ids so the two are never confusable in user-facing text.
pub fn new_label_id() -> String {
    format!("{LABEL_PREFIX}{}", short_token())
}

/// Opaque thread id for newly created conversations.
pub fn new_thread_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::{new_label_id, new_thread_id, new_ticket_id};

    #[test]
    fn ticket_and_label_prefixes_are_distinct() {
        let ticket = new_ticket_id();
        let label = new_label_id();
        assert!(ticket.starts_with("TKT-"));
        assert!(label.starts_with("LBL-"));
        assert_eq!(ticket.len(), 14);
        assert_eq!(label.len(), 14);
    }

    #[test]
    fn generated_ids_do_not_repeat_over_a_small_sample() {
        let mut seen = HashSet::new();
        for _ in 0..1000 {
            assert!(seen.insert(new_ticket_id()));
        }
    }

    #[test]
    fn thread_ids_are_valid_uuids() {
        let id = new_thread_id();
        assert!(uuid::Uuid::parse_str(&id).is_ok());
    }
}
