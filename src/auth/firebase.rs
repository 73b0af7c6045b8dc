use serde::{Deserialize, Serialize};

use crate::auth::User;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The provider refused the credentials; carries its error code.
    #[error("identity provider rejected the request: {0}")]
    Rejected(String),

    #[error("identity provider unreachable: {0}")]
    Network(#[from] reqwest::Error),
}

impl AuthError {
    /// Text that can be shown to the person typing the credentials.
    pub fn user_message(&self) -> &'static str {
        match self {
            AuthError::Rejected(code) => describe_code(code),
            AuthError::Network(_) => "The sign-in service is not answering right now, try again later.",
        }
    }
}

fn describe_code(code: &str) -> &'static str {
    // Firebase sometimes appends details: "WEAK_PASSWORD : Password should be ..."
    let code = code.split(':').next().unwrap_or(code).trim();
    match code {
        "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => {
            "Wrong email or password."
        }
        "USER_DISABLED" => "This account has been disabled.",
        "EMAIL_EXISTS" => "An account with this email already exists.",
        "INVALID_EMAIL" | "MISSING_EMAIL" => "That does not look like an email address.",
        "WEAK_PASSWORD" => "The password must be at least 6 characters long.",
        "MISSING_PASSWORD" => "Please type a password.",
        "TOO_MANY_ATTEMPTS_TRY_LATER" => "Too many attempts, try again later.",
        _ => "Could not sign you in.",
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    local_id: String,
    email: String,
    id_token: String,
    refresh_token: String,
}

impl From<TokenResponse> for User {
    fn from(response: TokenResponse) -> Self {
        User {
            uid: response.local_id,
            email: response.email,
            id_token: response.id_token,
            refresh_token: response.refresh_token,
        }
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Email/password accounts on Firebase Authentication (Identity Toolkit REST).
///
/// Signing out is local: the caller forgets the [`User`] and its tokens.
#[derive(Debug, Clone)]
pub struct FirebaseAuth {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl FirebaseAuth {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    fn url(&self, method: &str) -> String {
        format!("{}/accounts:{}", self.endpoint, method)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<User, AuthError> {
        self.password_call("signInWithPassword", email, password).await
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<User, AuthError> {
        self.password_call("signUp", email, password).await
    }

    async fn password_call(
        &self,
        method: &str,
        email: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        let response = self
            .client
            .post(self.url(method))
            .query(&[("key", self.api_key.as_str())])
            .json(&PasswordRequest {
                email: email.trim(),
                password,
                return_secure_token: true,
            })
            .send()
            .await?;

        if response.status().is_success() {
            let tokens: TokenResponse = response.json().await?;
            return Ok(tokens.into());
        }

        let status = response.status();
        let body = response.text().await?;
        Err(AuthError::Rejected(rejection_code(&body).unwrap_or_else(|| {
            log::warn!("Unexpected {status} from identity provider ({method})");
            status.to_string()
        })))
    }
}

fn rejection_code(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .map(|envelope| envelope.error.message)
}
