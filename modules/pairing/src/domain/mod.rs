pub mod error;
pub mod guard;
pub mod repo;
pub mod service;
