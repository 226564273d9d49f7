//! Users seen by the robot.

use std::collections::HashMap;

use courier_core::UserIdentity;
use parking_lot::RwLock;
use tracing::trace;

/// In-memory record of every user the robot received a message from, keyed
/// by user id (or by name when the adapter supplies no id).
#[derive(Debug, Default)]
pub struct UserDirectory {
    users: RwLock<HashMap<String, UserIdentity>>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `user`, replacing any previous entry with the same key.
    /// Anonymous users are ignored.
    pub fn register(&self, user: &UserIdentity) {
        let key = if user.id.is_empty() { &user.name } else { &user.id };
        if key.is_empty() {
            return;
        }
        let previous = self.users.write().insert(key.clone(), user.clone());
        if previous.is_none() {
            trace!(user = %key, "New user registered");
        }
    }

    /// Looks a user up by id or name.
    pub fn get(&self, key: &str) -> Option<UserIdentity> {
        self.users.read().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_by_id_then_name() {
        let users = UserDirectory::new();
        users.register(&UserIdentity::named("ann").with_id("u1"));
        users.register(&UserIdentity::named("bob"));
        users.register(&UserIdentity::default());

        assert_eq!(users.len(), 2);
        assert_eq!(users.get("u1").unwrap().name, "ann");
        assert!(users.get("bob").is_some());
    }
}
