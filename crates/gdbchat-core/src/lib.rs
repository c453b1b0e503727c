//! GDB Chat Core - shared configuration for all GDB Chat crates.
//!
//! - **config**: state, log, upload and settings locations, `.env` loading

pub mod config;

pub use config::{
    ensure_all_dirs, expand_path, load_env_files, logs_dir, settings_file, state_dir, uploads_dir,
};
