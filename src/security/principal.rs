use std::collections::{HashMap, HashSet};
use parking_lot::RwLock;
use crate::security::acl::Principal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Bypasses every ACL check
    Root,
    /// May read every resource regardless of its ACL
    ReadEverything,
}

/// Role and group membership lookups used by authorization and search filtering.
pub trait PrincipalStore: Send + Sync {
    fn has_role(&self, principal: &Principal, role: Role) -> bool;

    fn is_member(&self, principal: &Principal, group: &Principal) -> bool;

    /// Every group the principal belongs to, directly or through nested groups.
    fn groups_of(&self, principal: &Principal) -> Vec<Principal>;
}

/// In-memory principal store.
#[derive(Default)]
pub struct StaticPrincipalStore {
    roles: RwLock<HashMap<Role, HashSet<Principal>>>,
    members: RwLock<HashMap<Principal, HashSet<Principal>>>, // group -> direct members
}

impl StaticPrincipalStore {
    pub fn new() -> Self {
        StaticPrincipalStore::default()
    }

    pub fn grant_role(&self, principal: Principal, role: Role) {
        self.roles.write().entry(role).or_default().insert(principal);
    }

    pub fn add_member(&self, group: Principal, member: Principal) {
        self.members.write().entry(group).or_default().insert(member);
    }

    pub fn remove_member(&self, group: &Principal, member: &Principal) {
        if let Some(members) = self.members.write().get_mut(group) {
            members.remove(member);
        }
    }
}

impl PrincipalStore for StaticPrincipalStore {
    fn has_role(&self, principal: &Principal, role: Role) -> bool {
        self.roles
            .read()
            .get(&role)
            .is_some_and(|holders| holders.contains(principal))
    }

    fn is_member(&self, principal: &Principal, group: &Principal) -> bool {
        self.groups_of(principal).contains(group)
    }

    fn groups_of(&self, principal: &Principal) -> Vec<Principal> {
        let members = self.members.read();
        let mut found: Vec<Principal> = Vec::new();
        let mut seen: HashSet<&Principal> = HashSet::new();
        let mut frontier = vec![principal];

        // Walk upwards through nested groups; `seen` guards against cycles
        while let Some(current) = frontier.pop() {
            for (group, direct) in members.iter() {
                if direct.contains(current) && seen.insert(group) {
                    found.push(group.clone());
                    frontier.push(group);
                }
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_groups_are_resolved() {
        let store = StaticPrincipalStore::new();
        store.add_member(Principal::group("staff"), Principal::user("dave"));
        store.add_member(Principal::group("everyone"), Principal::group("staff"));
        store.add_member(Principal::group("staff"), Principal::group("everyone"));

        let dave = Principal::user("dave");
        assert!(store.is_member(&dave, &Principal::group("staff")));
        assert!(store.is_member(&dave, &Principal::group("everyone")));
        assert_eq!(store.groups_of(&dave).len(), 2);
        assert!(!store.is_member(&Principal::user("erin"), &Principal::group("staff")));
    }

    #[test]
    fn roles_are_per_principal() {
        let store = StaticPrincipalStore::new();
        store.grant_role(Principal::user("bob"), Role::Root);
        assert!(store.has_role(&Principal::user("bob"), Role::Root));
        assert!(!store.has_role(&Principal::user("bob"), Role::ReadEverything));
        assert!(!store.has_role(&Principal::user("carol"), Role::Root));
    }
}
