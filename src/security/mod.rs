pub mod acl;
pub mod principal;
pub mod authorization;
pub mod token;
