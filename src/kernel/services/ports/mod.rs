//! Service ports: traits + data contracts.

pub mod frontend;
pub mod host;
pub mod settings;

pub use frontend::{CursorKind, FrontendToken, SyntaxFrontend, Token, TokenKind, TypeKind};
pub use host::{HostError, HostTransport};
pub use settings::{FiletypeSettings, Settings, WorkerSettings};
