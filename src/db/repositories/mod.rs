pub mod files;
pub mod history;
pub mod password_reset;
pub mod token_blacklist;
pub mod user;
