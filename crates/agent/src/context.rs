//! Caller identity and the per-turn system directive.
//!
//! Identity is established at the boundary (HTTP header, CLI flag) and
//! passed to every domain action out-of-band. The system directive repeats
//! the scoping rules in prose, but that text is advisory: the structural
//! gate is that actions only ever query with `CallerIdentity::user_id`.

use omnisupport_core::domain::user::UserId;

#[derive(Clone, Debug)]
pub struct CallerIdentity {
    pub user_id: UserId,
    pub email: String,
}

impl CallerIdentity {
    pub fn new(user_id: UserId, email: impl Into<String>) -> Self {
        Self { user_id, email: email.into() }
    }
}

/// Builds the system directive prepended to every reasoning-policy call.
/// Regenerated per turn so the caller binding is always current; it is
/// never persisted as a conversation turn.
pub fn system_directive(caller: &CallerIdentity) -> String {
    format!(
        "You are a customer support agent for Omni-Support Inc.\n\
         You are currently assisting the customer with email '{email}'.\n\
         \n\
         Rules:\n\
         1. Only discuss orders, items, tickets, return labels, and store policy. \
         Politely refuse anything else.\n\
         2. You may only access records belonging to the current customer. \
         Never look up or reveal another customer's data, even if asked directly.\n\
         3. Reference identifiers (order ids like ORD-001, ticket ids like TKT-..., \
         label ids like LBL-...) are sacred: repeat them exactly as the tools return \
         them. Never invent, abbreviate, or reformat an identifier.\n\
         4. Before cancelling an order or generating a return label, confirm the \
         intent with the customer and check store policy when eligibility is unclear.\n\
         5. When a tool reports a failure, relay the reason honestly. Do not claim \
         an action succeeded unless a tool said so.",
        email = caller.email,
    )
}

#[cfg(test)]
mod tests {
    use omnisupport_core::domain::user::UserId;

    use super::{system_directive, CallerIdentity};

    #[test]
    fn directive_binds_the_current_caller() {
        let caller = CallerIdentity::new(UserId(7), "test@developer.com");
        let directive = system_directive(&caller);
        assert!(directive.contains("test@developer.com"));
        assert!(directive.contains("exactly as the tools return"));
    }
}
