//! Database bootstrap, migrations and the JSON document store

pub mod init;
pub mod migrations;
pub mod retry;
pub mod store;

pub use init::*;
pub use migrations::*;
pub use retry::retry_on_lock;
pub use store::*;
