// Conversation state shared across requests. The store is the only
// cross-request mutable state in the service and is passed explicitly.

pub mod models;
pub mod store;

pub use models::{Message, Role, Session};
pub use store::SessionStore;
