pub mod term;
pub mod document;
pub mod segment;
pub mod generation;
pub mod manager;
