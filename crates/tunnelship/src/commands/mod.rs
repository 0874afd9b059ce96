pub mod build;
pub mod push;
