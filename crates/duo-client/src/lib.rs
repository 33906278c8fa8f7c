//! Client core for the couple app: the identity session, one live-synced
//! resource per couple-scoped table, and the pure helpers views derive
//! their numbers from.

pub mod app;
pub mod backend;
pub mod bucket;
pub mod config;
pub mod dates;
pub mod derive;
pub mod error;
pub mod messages;
pub mod moods;
pub mod photos;
pub mod resource;
pub mod session;
pub mod storage;
pub mod tasks;
pub mod theme;
pub mod ticker;

pub use app::App;
pub use backend::{Backend, LocalBackend, RemoteBackend, Subscription};
pub use config::ClientConfig;
pub use error::{BackendError, ClientError, ConfigError};
pub use resource::Resource;
pub use session::{CoupleContext, Session, SessionState};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
