use std::collections::{BTreeMap, BTreeSet};
use serde::{Deserialize, Serialize};
use crate::core::error::{Error, ErrorKind, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Action {
    Read,
    /// Read of processed/derived content; implied by `Read`
    ReadProcessed,
    Write,
    WriteAcl,
    All,
}

impl Action {
    /// Read-class grants are the only ones honored for unauthenticated callers.
    pub fn is_read_class(&self) -> bool {
        matches!(self, Action::Read | Action::ReadProcessed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Principal {
    User(String),
    Group(String),
    /// Everyone, including unauthenticated callers
    PseudoAll,
    /// Any authenticated caller
    PseudoAuthenticated,
    /// Whoever owns the resource
    PseudoOwner,
}

impl Principal {
    pub fn user(id: &str) -> Self {
        Principal::User(id.to_string())
    }

    pub fn group(id: &str) -> Self {
        Principal::Group(id.to_string())
    }

    pub fn is_user(&self) -> bool {
        matches!(self, Principal::User(_))
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Principal::User(id) => Some(id),
            _ => None,
        }
    }

    /// Stable textual form, used as the indexed ACL term.
    pub fn qualified_name(&self) -> String {
        match self {
            Principal::User(id) => format!("u:{}", id),
            Principal::Group(id) => format!("g:{}", id),
            Principal::PseudoAll => "pseudo:all".to_string(),
            Principal::PseudoAuthenticated => "pseudo:authenticated".to_string(),
            Principal::PseudoOwner => "pseudo:owner".to_string(),
        }
    }
}

/// Access control list: action → principals granted that action.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Acl {
    entries: BTreeMap<Action, BTreeSet<Principal>>,
    inherited: bool,
    #[serde(skip)]
    dirty: bool,
}

impl Acl {
    pub fn new() -> Self {
        Acl::default()
    }

    /// ACL where the owner holds every privilege, the usual starting point.
    pub fn owner_default() -> Self {
        let mut acl = Acl::new();
        for action in [Action::Read, Action::Write, Action::All] {
            acl.grant(action, Principal::PseudoOwner);
        }
        acl.dirty = false;
        acl
    }

    pub fn with_grant(mut self, action: Action, principal: Principal) -> Self {
        self.grant(action, principal);
        self
    }

    pub fn grant(&mut self, action: Action, principal: Principal) {
        if self.entries.entry(action).or_default().insert(principal) {
            self.dirty = true;
        }
    }

    pub fn revoke(&mut self, action: Action, principal: &Principal) {
        if let Some(principals) = self.entries.get_mut(&action) {
            if principals.remove(principal) {
                self.dirty = true;
            }
            if principals.is_empty() {
                self.entries.remove(&action);
            }
        }
    }

    pub fn has_privilege(&self, action: Action, principal: &Principal) -> bool {
        self.entries
            .get(&action)
            .is_some_and(|principals| principals.contains(principal))
    }

    pub fn principals(&self, action: Action) -> impl Iterator<Item = &Principal> {
        self.entries.get(&action).into_iter().flatten()
    }

    pub fn actions(&self) -> impl Iterator<Item = &Action> {
        self.entries.keys()
    }

    pub fn is_inherited(&self) -> bool {
        self.inherited
    }

    pub fn set_inherited(&mut self, inherited: bool) {
        if self.inherited != inherited {
            self.inherited = inherited;
            self.dirty = true;
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Write-time validity check. The owner (directly or via the owner
    /// pseudo-principal) must hold read, write and all; the "all" pseudo-principal
    /// must hold neither write nor all.
    pub fn validate(&self, owner: &str) -> Result<()> {
        let owner_principal = Principal::user(owner);
        for action in [Action::Read, Action::Write, Action::All] {
            if !self.has_privilege(action, &owner_principal)
                && !self.has_privilege(action, &Principal::PseudoOwner)
            {
                return Err(Error::new(
                    ErrorKind::IllegalOperation,
                    format!("owner '{}' must hold the {:?} privilege", owner, action),
                ));
            }
        }
        for action in [Action::Write, Action::All] {
            if self.has_privilege(action, &Principal::PseudoAll) {
                return Err(Error::new(
                    ErrorKind::IllegalOperation,
                    format!("the {:?} privilege cannot be granted to all users", action),
                ));
            }
        }
        Ok(())
    }
}

// The dirty marker is load-state, not content.
impl PartialEq for Acl {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries && self.inherited == other.inherited
    }
}

impl Eq for Acl {}
