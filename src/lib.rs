pub mod actions;
pub mod image;
pub mod part;
pub mod scheme;
