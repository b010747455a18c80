use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use super::prompt::AuthCodePrompt;
use super::signer::{self, Credentials, RequestStamp, TokenPair};
use crate::error::{ExportError, Result};
use crate::http::{FormParams, HttpResponse, ResilientClient, Sleeper};
use crate::storage::CredentialStore;

pub const REQUEST_TOKEN_CACHE: &str = "request_token";
pub const AUTH_CODE_CACHE: &str = "auth_code";
pub const ACCESS_TOKEN_CACHE: &str = "access_token";

pub const CACHE_NAMES: &[&str] = &[REQUEST_TOKEN_CACHE, AUTH_CODE_CACHE, ACCESS_TOKEN_CACHE];

#[derive(Debug, Clone)]
pub struct OAuthEndpoints {
    pub request_token: String,
    pub authorize: String,
    pub access_token: String,
}

impl OAuthEndpoints {
    pub fn fatsecret() -> Self {
        Self {
            request_token: "https://www.fatsecret.com/oauth/request_token".into(),
            authorize: "https://www.fatsecret.com/oauth/authorize".into(),
            access_token: "https://www.fatsecret.com/oauth/access_token".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AuthState {
    Init,
    HasRequestToken,
    HasAuthCode,
    HasAccessToken,
}

/// Three-legged OAuth1 session. Every step is backed by the credential
/// store, so an interrupted authorization resumes where it stopped.
pub struct OAuthSession {
    credentials: Credentials,
    store: CredentialStore,
    http: ResilientClient,
    endpoints: OAuthEndpoints,
    request_token: Option<TokenPair>,
    auth_code: Option<String>,
    access_token: Option<TokenPair>,
}

impl OAuthSession {
    pub fn new(
        credentials: Credentials,
        store: CredentialStore,
        http: ResilientClient,
        endpoints: OAuthEndpoints,
    ) -> Self {
        Self {
            credentials,
            store,
            http,
            endpoints,
            request_token: None,
            auth_code: None,
            access_token: None,
        }
    }

    pub fn state(&self) -> AuthState {
        if self.access_token.is_some() {
            AuthState::HasAccessToken
        } else if self.auth_code.is_some() {
            AuthState::HasAuthCode
        } else if self.request_token.is_some() {
            AuthState::HasRequestToken
        } else {
            AuthState::Init
        }
    }

    pub fn sleeper(&self) -> Arc<dyn Sleeper> {
        self.http.sleeper()
    }

    /// Drives the session to `HasAccessToken`. A cached access token
    /// short-circuits the whole flow.
    pub fn authorize(&mut self, prompt: &mut dyn AuthCodePrompt) -> Result<AuthState> {
        if self.access_token.is_none() {
            self.access_token = self.cached_pair(ACCESS_TOKEN_CACHE)?;
        }
        if self.access_token.is_some() {
            info!("Using cached access token");
            return Ok(self.state());
        }

        self.obtain_request_token()?;
        self.obtain_auth_code(prompt)?;
        self.obtain_access_token()?;

        info!("Authorization complete");
        Ok(self.state())
    }

    /// Signs `params` and sends them. The access token wins when present;
    /// otherwise an `oauth_token` already in `params` is signed as the token.
    pub fn send_signed(&self, method: &str, url: &str, mut params: FormParams) -> Result<HttpResponse> {
        let explicit = take_param(&mut params, "oauth_token");
        let token = self
            .access_token
            .as_ref()
            .map(|pair| pair.token.clone())
            .or(explicit);
        let token_secret = self.token_secret_for(token.as_deref());

        let signed = signer::sign_request(
            &self.credentials,
            method,
            url,
            params,
            token.as_deref(),
            token_secret,
            &RequestStamp::generate(),
        )?;
        self.http.send(method, url, &signed)
    }

    fn token_secret_for(&self, token: Option<&str>) -> &str {
        if let Some(access) = &self.access_token {
            return &access.token_secret;
        }
        match (&self.request_token, token) {
            (Some(request), Some(token)) if request.token == token => &request.token_secret,
            _ => "",
        }
    }

    // -- Steps ----------------------------------------------------------------

    fn obtain_request_token(&mut self) -> Result<()> {
        if self.request_token.is_none() {
            self.request_token = self.cached_pair(REQUEST_TOKEN_CACHE)?;
        }
        if self.request_token.is_some() {
            return Ok(());
        }

        info!("Requesting OAuth request token");
        let params = vec![("oauth_callback".to_string(), "oob".to_string())];
        let url = self.endpoints.request_token.clone();
        let fields = self.token_request(&url, params, "request token")?;

        let confirmed = fields.get("oauth_callback_confirmed").map(String::as_str);
        if confirmed != Some("true") {
            return Err(ExportError::Protocol(format!(
                "OAuth callback not confirmed: {:?} != \"true\"",
                confirmed.unwrap_or_default()
            )));
        }

        let pair = token_pair(&fields)?;
        self.store.set(REQUEST_TOKEN_CACHE, &pair.token, &pair.token_secret)?;
        self.request_token = Some(pair);
        Ok(())
    }

    fn obtain_auth_code(&mut self, prompt: &mut dyn AuthCodePrompt) -> Result<()> {
        if self.auth_code.is_none() {
            self.auth_code = self
                .store
                .get(AUTH_CODE_CACHE)?
                .map(|secret| secret.value)
                .filter(|code| is_auth_code(code));
        }
        if self.auth_code.is_some() {
            return Ok(());
        }

        let request = self.require_request_token()?;
        let authorize_url = format!("{}?oauth_token={}", self.endpoints.authorize, request.token);

        let code = prompt.request_code(&authorize_url)?;
        let code = code.trim();
        if !is_auth_code(code) {
            return Err(ExportError::Protocol(format!("invalid authorization code: {:?}", code)));
        }

        self.store.set(AUTH_CODE_CACHE, code, "")?;
        self.auth_code = Some(code.to_string());
        Ok(())
    }

    fn obtain_access_token(&mut self) -> Result<()> {
        let request = self.require_request_token()?;
        let code = self
            .auth_code
            .clone()
            .ok_or_else(|| ExportError::Protocol("no authorization code".into()))?;

        info!("Exchanging authorization code for access token");
        let params = vec![
            ("oauth_token".to_string(), request.token),
            ("oauth_verifier".to_string(), code),
        ];
        let url = self.endpoints.access_token.clone();
        let fields = self.token_request(&url, params, "access token")?;

        let pair = token_pair(&fields)?;
        self.store.set(ACCESS_TOKEN_CACHE, &pair.token, &pair.token_secret)?;
        self.access_token = Some(pair);
        Ok(())
    }

    // -- Helpers --------------------------------------------------------------

    fn token_request(&self, url: &str, params: FormParams, what: &str) -> Result<HashMap<String, String>> {
        let response = self.send_signed("POST", url, params)?;
        if response.status > 201 {
            return Err(ExportError::HttpStatus {
                status: response.status,
                context: format!("OAuth {} request", what),
                body: response.body,
            });
        }

        Ok(url::form_urlencoded::parse(response.body.trim().as_bytes())
            .into_owned()
            .collect())
    }

    fn cached_pair(&self, name: &str) -> Result<Option<TokenPair>> {
        Ok(self
            .store
            .get(name)?
            .filter(|secret| !secret.value.is_empty() && !secret.value2.is_empty())
            .map(|secret| TokenPair {
                token: secret.value,
                token_secret: secret.value2,
            }))
    }

    fn require_request_token(&self) -> Result<TokenPair> {
        self.request_token
            .clone()
            .ok_or_else(|| ExportError::Protocol("no request token".into()))
    }
}

fn take_param(params: &mut FormParams, name: &str) -> Option<String> {
    let idx = params.iter().position(|(k, _)| k == name)?;
    Some(params.remove(idx).1)
}

fn token_pair(fields: &HashMap<String, String>) -> Result<TokenPair> {
    let field = |name: &str| {
        fields
            .get(name)
            .filter(|v| !v.is_empty())
            .cloned()
            .ok_or_else(|| ExportError::Protocol(format!("there is no {} in response", name)))
    };

    Ok(TokenPair {
        token: field("oauth_token")?,
        token_secret: field("oauth_token_secret")?,
    })
}

fn is_auth_code(code: &str) -> bool {
    !code.is_empty() && code.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::{RecordedRequest, RecordingSleeper, ScriptedTransport};
    use crate::http::RetryPolicy;
    use crate::storage::StorageConfig;

    struct ScriptedPrompt {
        code: String,
        asked: Vec<String>,
    }

    impl ScriptedPrompt {
        fn new(code: &str) -> Self {
            Self {
                code: code.to_string(),
                asked: Vec::new(),
            }
        }
    }

    impl AuthCodePrompt for ScriptedPrompt {
        fn request_code(&mut self, authorize_url: &str) -> Result<String> {
            self.asked.push(authorize_url.to_string());
            Ok(self.code.clone())
        }
    }

    fn credentials() -> Credentials {
        Credentials {
            consumer_key: "ck".into(),
            consumer_secret: "cs".into(),
        }
    }

    fn session(dir: &std::path::Path, transport: Arc<ScriptedTransport>) -> OAuthSession {
        let store = CredentialStore::new(&StorageConfig::new(dir, "fatsecret_oauth"));
        let http = ResilientClient::new(
            transport,
            Arc::new(RecordingSleeper::default()),
            RetryPolicy::transport_default(),
        );
        OAuthSession::new(credentials(), store, http, OAuthEndpoints::fatsecret())
    }

    fn verify_signature(request: &RecordedRequest, token_secret: &str) {
        let mut params = request.form.clone();
        let sent = take_param(&mut params, "oauth_signature").unwrap();
        let base = signer::base_string(&request.method, &request.url, &params).unwrap();
        let expected = signer::signature(&signer::signing_key("cs", token_secret), &base);
        assert_eq!(sent, expected);
    }

    #[test]
    fn full_flow_then_resume_from_cache() {
        let tmp = tempfile::tempdir().unwrap();
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(200, "oauth_token=rt&oauth_token_secret=rts&oauth_callback_confirmed=true");
        transport.push(200, "oauth_token=at&oauth_token_secret=ats");

        let mut s = session(tmp.path(), transport.clone());
        let mut prompt = ScriptedPrompt::new(" 424242\n");
        assert_eq!(s.state(), AuthState::Init);
        assert_eq!(s.authorize(&mut prompt).unwrap(), AuthState::HasAccessToken);

        assert_eq!(
            prompt.asked,
            vec!["https://www.fatsecret.com/oauth/authorize?oauth_token=rt".to_string()]
        );

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);

        let first = &requests[0];
        assert_eq!(first.url, "https://www.fatsecret.com/oauth/request_token");
        assert_eq!(first.param("oauth_callback"), Some("oob"));
        assert_eq!(first.param("oauth_token"), None);
        assert_eq!(first.param("oauth_signature_method"), Some("HMAC-SHA1"));
        assert_eq!(first.param("oauth_version"), Some("1.0"));
        verify_signature(first, "");

        let second = &requests[1];
        assert_eq!(second.url, "https://www.fatsecret.com/oauth/access_token");
        assert_eq!(second.param("oauth_token"), Some("rt"));
        assert_eq!(second.param("oauth_verifier"), Some("424242"));
        assert_eq!(second.param("oauth_callback"), None);
        verify_signature(second, "rts");

        // A fresh session over the same store needs neither network nor prompt.
        let transport2 = Arc::new(ScriptedTransport::new());
        let mut resumed = session(tmp.path(), transport2.clone());
        let mut prompt2 = ScriptedPrompt::new("1");
        assert_eq!(resumed.authorize(&mut prompt2).unwrap(), AuthState::HasAccessToken);
        assert!(transport2.requests().is_empty());
        assert!(prompt2.asked.is_empty());
    }

    #[test]
    fn request_token_secret_only_signs_its_own_token() {
        let tmp = tempfile::tempdir().unwrap();
        let mut s = session(tmp.path(), Arc::new(ScriptedTransport::new()));
        s.request_token = Some(TokenPair {
            token: "rt".into(),
            token_secret: "rts".into(),
        });

        assert_eq!(s.token_secret_for(Some("rt")), "rts");
        assert_eq!(s.token_secret_for(Some("other")), "");
        assert_eq!(s.token_secret_for(None), "");
    }

    #[test]
    fn signed_api_requests_use_access_token() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(&StorageConfig::new(tmp.path(), "fatsecret_oauth"));
        store.set(ACCESS_TOKEN_CACHE, "at", "ats").unwrap();

        let transport = Arc::new(ScriptedTransport::new());
        transport.push(200, "{}");
        let mut s = session(tmp.path(), transport.clone());
        s.authorize(&mut ScriptedPrompt::new("1")).unwrap();

        s.send_signed("POST", "https://platform.fatsecret.com/rest/server.api", vec![("method".into(), "x".into())])
            .unwrap();

        let request = &transport.requests()[0];
        assert_eq!(request.param("oauth_token"), Some("at"));
        assert_eq!(request.param("method"), Some("x"));
        verify_signature(request, "ats");
    }

    #[test]
    fn resumes_after_cached_code() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(&StorageConfig::new(tmp.path(), "fatsecret_oauth"));
        store.set(REQUEST_TOKEN_CACHE, "rt", "rts").unwrap();
        store.set(AUTH_CODE_CACHE, "777", "").unwrap();

        let transport = Arc::new(ScriptedTransport::new());
        transport.push(200, "oauth_token=at&oauth_token_secret=ats");
        let mut s = session(tmp.path(), transport.clone());
        let mut prompt = ScriptedPrompt::new("1");

        s.authorize(&mut prompt).unwrap();

        assert!(prompt.asked.is_empty());
        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].param("oauth_verifier"), Some("777"));

        let cached = store.get(ACCESS_TOKEN_CACHE).unwrap().unwrap();
        assert_eq!((cached.value.as_str(), cached.value2.as_str()), ("at", "ats"));
    }

    #[test]
    fn unconfirmed_callback_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(200, "oauth_token=rt&oauth_token_secret=rts&oauth_callback_confirmed=false");
        let mut s = session(tmp.path(), transport);

        let err = s.authorize(&mut ScriptedPrompt::new("1")).unwrap_err();
        assert!(matches!(err, ExportError::Protocol(_)));
        assert_eq!(s.state(), AuthState::Init);
    }

    #[test]
    fn missing_token_secret_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(200, "oauth_token=rt&oauth_callback_confirmed=true");
        let mut s = session(tmp.path(), transport);

        let err = s.authorize(&mut ScriptedPrompt::new("1")).unwrap_err();
        assert!(err.to_string().contains("oauth_token_secret"));
    }

    #[test]
    fn non_digit_code_is_rejected_and_not_cached() {
        let tmp = tempfile::tempdir().unwrap();
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(200, "oauth_token=rt&oauth_token_secret=rts&oauth_callback_confirmed=true");
        let mut s = session(tmp.path(), transport.clone());

        let err = s.authorize(&mut ScriptedPrompt::new("12a4")).unwrap_err();
        assert!(matches!(err, ExportError::Protocol(_)));
        assert_eq!(s.state(), AuthState::HasRequestToken);
        assert_eq!(transport.requests().len(), 1);

        let store = CredentialStore::new(&StorageConfig::new(tmp.path(), "fatsecret_oauth"));
        assert!(store.get(AUTH_CODE_CACHE).unwrap().is_none());
        assert!(store.get(REQUEST_TOKEN_CACHE).unwrap().is_some());
    }

    #[test]
    fn http_error_on_token_endpoint_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(401, "invalid consumer key");
        let mut s = session(tmp.path(), transport);

        let err = s.authorize(&mut ScriptedPrompt::new("1")).unwrap_err();
        assert!(matches!(err, ExportError::HttpStatus { status: 401, .. }));
    }
}
