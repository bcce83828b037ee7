pub mod ast;
pub mod sort;
pub mod native;
pub mod builder;
pub mod cache;
