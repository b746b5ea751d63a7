//! Cache key layout.
//!
//! `<kind>:<id>` for one entity, `<kind>:all` for the collection view and
//! `<kind>:owner:<owner_id>` for owner-scoped lists.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    User,
    Instrument,
    Cart,
    Order,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::User => "user",
            EntityKind::Instrument => "instrument",
            EntityKind::Cart => "cart",
            EntityKind::Order => "order",
        }
    }

    pub fn key(&self, id: &str) -> String {
        format!("{}:{id}", self.as_str())
    }

    pub fn all_key(&self) -> String {
        format!("{}:all", self.as_str())
    }

    pub fn owner_key(&self, owner_id: &str) -> String {
        format!("{}:owner:{owner_id}", self.as_str())
    }

    /// Prefix matching every key of this kind.
    pub fn prefix(&self) -> String {
        format!("{}:", self.as_str())
    }

    /// Keys a mutation of entity `id` must invalidate.
    pub fn mutation_keys(&self, id: &str) -> Vec<String> {
        vec![self.key(id), self.all_key()]
    }

    /// Like [`mutation_keys`](Self::mutation_keys), plus the owner's list.
    pub fn owned_mutation_keys(&self, id: &str, owner_id: &str) -> Vec<String> {
        vec![self.key(id), self.all_key(), self.owner_key(owner_id)]
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn confirmation_code_key(email: &str) -> String {
    format!("confirm_code:{email}")
}
