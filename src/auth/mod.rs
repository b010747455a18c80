pub mod flow;
pub mod prompt;
pub mod signer;

pub use flow::{OAuthEndpoints, OAuthSession, CACHE_NAMES};
pub use prompt::StdinPrompt;
pub use signer::Credentials;
