pub mod prelude;

pub mod blacklisted_tokens;
pub mod password_resets;
pub mod prediction_history;
pub mod stored_files;
pub mod users;
