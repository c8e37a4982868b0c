//! The virtual content tree collaborators consumed by the browse API.

pub mod mime;
pub mod node;
pub mod renderer;
pub mod scanner;
pub mod tree;
