pub mod blob;
pub mod choose;
pub mod error;
pub mod repo;
pub mod service;
