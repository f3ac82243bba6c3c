use anyhow::anyhow;
use shuttle_runtime::SecretStore;

/// Character budget for attachment text handed to the model as context.
pub const MAX_ATTACHMENT_CONTEXT_CHARS: usize = 4000;

/// Chat model used for replies and titles, reached through Google's
/// OpenAI-compatible endpoint.
pub const GENERATION_MODEL: &str = "gemini-2.0-flash";

pub const OPENAI_COMPAT_API_BASE: &str =
    "https://generativelanguage.googleapis.com/v1beta/openai";

/// Multimodal models tried in order when describing an image, most capable
/// first.
pub const IMAGE_DESCRIPTION_MODEL_CANDIDATES: &[&str] =
    &["gemini-1.5-pro", "gemini-1.5-flash", "gemini-2.0-flash"];

/// Validity window for signed attachment URLs.
pub const SIGNED_URL_TTL_SECS: u64 = 60 * 60 * 24;

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: String,
    /// Key for both the chat completions endpoint and the vision endpoint.
    /// Absence is not fatal: image description becomes a no-op and replies
    /// degrade to the canned fallback sentence.
    pub google_api_key: Option<String>,
    pub aws_region: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub attachment_bucket: String,
}

impl AppConfig {
    pub fn new(secret_store: &SecretStore) -> Result<Self, anyhow::Error> {
        let database_url = secret_store
            .get("DATABASE_URL")
            .ok_or_else(|| anyhow!("DATABASE_URL not found"))?;

        let jwt_secret = secret_store
            .get("JWT_SECRET")
            .ok_or_else(|| anyhow!("JWT_SECRET not found"))?;

        let google_api_key = secret_store.get("GOOGLE_API_KEY");

        let aws_region = secret_store
            .get("AWS_REGION")
            .ok_or_else(|| anyhow!("AWS_REGION not found"))?;

        let aws_access_key_id = secret_store
            .get("AWS_ACCESS_KEY_ID")
            .ok_or_else(|| anyhow!("AWS_ACCESS_KEY_ID not found"))?;

        let aws_secret_access_key = secret_store
            .get("AWS_SECRET_ACCESS_KEY")
            .ok_or_else(|| anyhow!("AWS_SECRET_ACCESS_KEY not found"))?;

        let attachment_bucket = secret_store
            .get("ATTACHMENT_BUCKET")
            .ok_or_else(|| anyhow!("ATTACHMENT_BUCKET not found"))?;

        Ok(AppConfig {
            database_url,
            jwt_secret,
            google_api_key,
            aws_region,
            aws_access_key_id,
            aws_secret_access_key,
            attachment_bucket,
        })
    }
}
