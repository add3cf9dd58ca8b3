pub mod client;
pub mod context;
pub mod couple_id;
pub mod error;
pub mod lock;
pub mod model;

pub use client::*;
pub use context::*;
pub use couple_id::*;
pub use error::*;
pub use lock::*;
pub use model::*;
