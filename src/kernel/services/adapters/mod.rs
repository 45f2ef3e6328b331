//! Service adapters: OS/runtime specific implementations (processes, pipes, files, async).

pub mod host;
pub mod runtime;
pub mod settings;
pub mod worker;

pub use host::{StdoutHost, WriterHost};
pub use runtime::{HighlightMessage, HighlightRuntime};
pub use settings::{
    ensure_log_dir, ensure_settings_file, get_log_dir, get_settings_path, load_settings,
    SettingsError,
};
pub use worker::{WorkerConfig, WorkerError, WorkerManager, WorkerState, WorkerTarget};
