pub mod auth_service;
pub use auth_service::{AuthError, AuthService, LoginResult, UserInfo};

pub mod auth_service_impl;
pub use auth_service_impl::SeaOrmAuthService;

pub mod verification_service;
pub use verification_service::{VerificationError, VerificationService};

pub mod verification_service_impl;
pub use verification_service_impl::SeaOrmVerificationService;

pub mod mailer;
pub use mailer::{CodePurpose, LogMailer, Mailer, SendGridMailer};

pub mod oauth;
pub use oauth::{GoogleOAuthProvider, OAuthProfile, OAuthProvider};

pub mod otp;
pub use otp::{CodeGenerator, OtpPolicy, RandomCodeGenerator};

pub mod prediction;
pub use prediction::{
    HttpPredictionClient, PredictionClient, PredictionError, PredictionOutcome,
    PredictionResult, PredictionService,
};

pub mod profile;
pub use profile::{ProfileError, ProfileService};

pub mod sweeper;
pub use sweeper::{ExpirySweeper, SweepReport, sweep_once};

pub mod token;
pub use token::{Claims, TokenCodec, TokenError, TokenIssuer};

pub mod uploads;
pub use uploads::{ImageUpload, UploadError, validate_image};
