use std::collections::HashMap;
use std::fmt;
use parking_lot::RwLock;
use uuid::Uuid;
use crate::security::acl::Principal;

/// Opaque credential identifying the acting principal.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SecurityToken(String);

impl SecurityToken {
    pub fn new(value: &str) -> Self {
        SecurityToken(value.to_string())
    }

    pub fn generate() -> Self {
        SecurityToken(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Tokens are credentials; keep them out of logs.
impl fmt::Debug for SecurityToken {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("SecurityToken(..)")
    }
}

pub trait TokenResolver: Send + Sync {
    /// Principal behind the token, `None` for unknown or expired tokens.
    fn principal(&self, token: &SecurityToken) -> Option<Principal>;
}

#[derive(Default)]
pub struct TokenRegistry {
    tokens: RwLock<HashMap<SecurityToken, Principal>>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        TokenRegistry::default()
    }

    /// Issue a fresh token for a user principal.
    pub fn issue(&self, principal: Principal) -> SecurityToken {
        let token = SecurityToken::generate();
        self.tokens.write().insert(token.clone(), principal);
        token
    }

    pub fn register(&self, token: SecurityToken, principal: Principal) {
        self.tokens.write().insert(token, principal);
    }

    pub fn revoke(&self, token: &SecurityToken) {
        self.tokens.write().remove(token);
    }
}

impl TokenResolver for TokenRegistry {
    fn principal(&self, token: &SecurityToken) -> Option<Principal> {
        self.tokens.read().get(token).cloned()
    }
}
