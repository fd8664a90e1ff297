//! Persistence layer: the Domain Store (users, catalog, orders, tickets,
//! return labels) and the Conversation Store (threads, turns).
//!
//! The two stores share a pool but are never transactionally coupled: a
//! turn can be recorded even if the action it describes later fails, and
//! vice versa. Consistency between "what was said" and "what happened" is
//! eventual, not atomic.

pub mod connection;
pub mod conversation;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_settings, DbPool};
pub use conversation::{ConversationStore, SqlConversationStore};
pub use fixtures::{DemoDataset, SeedSummary, VerificationResult};
