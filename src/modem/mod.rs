pub mod client;
pub mod fields;
pub mod html;
pub mod session;
pub mod transport;

pub use client::{Client, ScrapeTarget};
pub use session::SessionManager;
