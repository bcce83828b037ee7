use std::sync::Arc;
use crate::core::error::{Error, ErrorKind, Result};
use crate::security::acl::{Acl, Action, Principal};
use crate::security::principal::{PrincipalStore, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    /// No principal was supplied; retrying with credentials may succeed
    AuthenticationRequired,
    Deny,
}

/// ACL decision procedure shared by the write path and search filtering.
pub struct Authorization {
    principals: Arc<dyn PrincipalStore>,
}

impl Authorization {
    pub fn new(principals: Arc<dyn PrincipalStore>) -> Self {
        Authorization { principals }
    }

    pub fn decide(&self, acl: &Acl, principal: Option<&Principal>, action: Action, owner: &str) -> Decision {
        // Read access implies read-processed access
        if action == Action::ReadProcessed {
            let decision = self.decide_action(acl, principal, Action::Read, owner);
            if decision == Decision::Allow {
                return decision;
            }
        }
        self.decide_action(acl, principal, action, owner)
    }

    pub fn authorize(&self, acl: &Acl, principal: Option<&Principal>, action: Action, owner: &str) -> Result<()> {
        match self.decide(acl, principal, action, owner) {
            Decision::Allow => Ok(()),
            Decision::AuthenticationRequired => Err(Error::new(
                ErrorKind::AuthenticationRequired,
                format!("authentication required for {:?}", action),
            )),
            Decision::Deny => Err(Error::new(
                ErrorKind::AuthorizationDenied,
                format!(
                    "{} is not permitted to {:?}",
                    principal.map(Principal::qualified_name).unwrap_or_default(),
                    action
                ),
            )),
        }
    }

    pub fn is_allowed(&self, acl: &Acl, principal: Option<&Principal>, action: Action, owner: &str) -> bool {
        self.decide(acl, principal, action, owner) == Decision::Allow
    }

    fn decide_action(&self, acl: &Acl, principal: Option<&Principal>, action: Action, owner: &str) -> Decision {
        if action.is_read_class() && acl.has_privilege(action, &Principal::PseudoAll) {
            return Decision::Allow;
        }

        let Some(principal) = principal else {
            return Decision::AuthenticationRequired;
        };

        if acl.has_privilege(action, &Principal::PseudoAuthenticated) {
            return Decision::Allow;
        }
        if self.principals.has_role(principal, Role::Root) {
            return Decision::Allow;
        }
        if action == Action::Read && self.principals.has_role(principal, Role::ReadEverything) {
            return Decision::Allow;
        }
        if principal.user_id() == Some(owner) && acl.has_privilege(action, &Principal::PseudoOwner) {
            return Decision::Allow;
        }
        if acl.has_privilege(action, principal) {
            return Decision::Allow;
        }

        let granted_groups = acl
            .principals(action)
            .filter(|p| matches!(p, Principal::Group(_)));
        for group in granted_groups {
            if self.principals.is_member(principal, group) {
                return Decision::Allow;
            }
        }

        Decision::Deny
    }
}
