pub use super::blacklisted_tokens::Entity as BlacklistedTokens;
pub use super::password_resets::Entity as PasswordResets;
pub use super::prediction_history::Entity as PredictionHistory;
pub use super::stored_files::Entity as StoredFiles;
pub use super::users::Entity as Users;
