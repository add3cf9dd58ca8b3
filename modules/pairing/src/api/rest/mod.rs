//! JSON shapes for an HTTP surface. Routing lives with the host application.

pub mod dto;
pub mod error;
