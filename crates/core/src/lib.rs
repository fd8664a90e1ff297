//! Domain model and shared plumbing for the omnisupport workspace.
//!
//! This crate is I/O-free. It holds the entity types and their status
//! machines (`domain`), collision-resistant reference id generation
//! (`ids`), the layered error taxonomy (`errors`), and application
//! configuration with file/env/override precedence (`config`).
//!
//! Everything that touches a database, a socket, or a retry loop lives in
//! the sibling crates and depends on this one.

pub mod config;
pub mod domain;
pub mod errors;
pub mod ids;

pub use domain::catalog::{Item, ItemId};
pub use domain::conversation::{Thread, ThreadId, Turn, TurnRole};
pub use domain::label::{LabelStatus, ReturnLabel};
pub use domain::order::{Order, OrderId, OrderLine, OrderStatus};
pub use domain::ticket::{Ticket, TicketStatus};
pub use domain::user::{User, UserId};
pub use errors::{ApplicationError, DomainError};
pub use ids::{new_label_id, new_thread_id, new_ticket_id};
