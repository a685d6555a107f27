pub mod client;
pub mod error;
pub mod filters;
pub mod models;
pub mod pagination;
pub mod ratelimit;
pub mod retry;
pub mod session;

pub use client::VectraClient;
pub use error::{ErrorKind, VectraApiError};
pub use pagination::{Cursor, Paginated};
pub use session::{SessionManager, SessionToken};
