//! Domain managers: one business capability each, built on the resource clients.

// Declare the modules that make up this crate.
pub mod chat_bot_manager;
pub mod error;
pub mod s3_command;
pub mod s3_manager;
pub mod stat_manager;
pub mod user_account_manager;

// Re-export the core types to provide a clean public API.
pub use chat_bot_manager::ChatBotManager;
pub use error::ManagerError;
pub use s3_command::{ADMIN_S3_COMMAND, S3AdminCommand};
pub use s3_manager::{ListObjectsInput, S3Manager};
pub use stat_manager::{APPLICATION_STATS_TABLE, ApplicationStats, StatManager};
pub use user_account_manager::{USER_ACCOUNTS_TABLE, UserAccount, UserAccountManager};
