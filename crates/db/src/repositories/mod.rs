use async_trait::async_trait;
use thiserror::Error;

use omnisupport_core::domain::catalog::Item;
use omnisupport_core::domain::label::ReturnLabel;
use omnisupport_core::domain::order::{Order, OrderId, OrderStatus};
use omnisupport_core::domain::ticket::Ticket;
use omnisupport_core::domain::user::{User, UserId};

pub mod catalog;
pub mod labels;
pub mod orders;
pub mod tickets;
pub mod users;

pub use catalog::SqlCatalogRepository;
pub use labels::SqlReturnLabelRepository;
pub use orders::SqlOrderRepository;
pub use tickets::SqlTicketRepository;
pub use users::SqlUserRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl RepositoryError {
    /// Pool saturation is the one failure class the caller retries.
    pub fn is_pool_exhausted(&self) -> bool {
        matches!(self, Self::Database(sqlx::Error::PoolTimedOut))
    }
}

/// Outcome of a ticket insert attempt. The partial unique index on open
/// tickets is the authoritative dedup check; a violation surfaces here as
/// `DuplicateOpen` carrying the surviving ticket.
#[derive(Debug)]
pub enum TicketInsert {
    Created,
    DuplicateOpen(Ticket),
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// All orders of `user_id`, newest purchase first, lines joined in.
    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError>;

    /// The order `order_id` if and only if it is owned by `user_id`.
    /// Absent and not-owned are indistinguishable by design.
    async fn find_owned(
        &self,
        order_id: &OrderId,
        user_id: UserId,
    ) -> Result<Option<Order>, RepositoryError>;

    /// Guarded status update: applies only when the current status matches
    /// `from`. Returns false when another writer got there first.
    async fn set_status(
        &self,
        order_id: &OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Case-insensitive partial match on item name, capped at `limit`.
    /// The catalog is public; there is no ownership check.
    async fn search_by_name(
        &self,
        name_query: &str,
        limit: u32,
    ) -> Result<Vec<Item>, RepositoryError>;
}

#[async_trait]
pub trait TicketRepository: Send + Sync {
    async fn find_open_for_order(
        &self,
        order_id: &OrderId,
    ) -> Result<Option<Ticket>, RepositoryError>;

    async fn create(&self, ticket: Ticket) -> Result<TicketInsert, RepositoryError>;
}

#[async_trait]
pub trait ReturnLabelRepository: Send + Sync {
    async fn create(&self, label: ReturnLabel) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, label_id: &str) -> Result<Option<ReturnLabel>, RepositoryError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Principals are created lazily on first successful authentication;
    /// email is the stable lookup key.
    async fn find_or_create_by_email(&self, email: &str) -> Result<User, RepositoryError>;
}
