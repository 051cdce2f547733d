/// Cookie sessions
///
/// The `sessionid` cookie carries an HS256 token naming the user and a
/// fingerprint of their password hash, so a password change signs out every
/// other session. Handlers never read the cookie themselves; they take one
/// of two extractors:
///
/// - `CurrentUser`: the signed-in user, or `None` for anonymous visitors
/// - `AuthenticatedUser`: the signed-in user, otherwise `LoginRequired`
///   which answers with a redirect to the login page
///
/// Password reset links are signed with the same keys under their own
/// audience.
use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use actix_web::dev::Payload;
use actix_web::{web, FromRequest, HttpRequest};
use chrono::Utc;
use futures::future::LocalBoxFuture;
use hmac::{Hmac, Mac};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;

use crate::config::SessionConfig;
use crate::error::{AppError, Result};
use crate::models::User;
use crate::AppState;

pub const SESSION_COOKIE: &str = "sessionid";

const SESSION_ALGORITHM: Algorithm = Algorithm::HS256;
const SESSION_AUDIENCE: &str = "session";
const RESET_AUDIENCE: &str = "password_reset";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Serialize, Deserialize, Clone)]
struct SessionClaims {
    /// User id
    sub: String,
    username: String,
    aud: String,
    /// Password hash fingerprint at issue time
    pwd: String,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct ResetClaims {
    sub: String,
    aud: String,
    pwd: String,
    iat: i64,
    exp: i64,
}

/// A verified token: who it names and which password it was issued against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSubject {
    pub user_id: i64,
    pub fingerprint: String,
}

/// Signing material and cookie attributes for sessions
#[derive(Clone)]
pub struct SessionKeys {
    encoding: Arc<EncodingKey>,
    decoding: Arc<DecodingKey>,
    secret: Arc<Vec<u8>>,
    ttl_secs: u64,
    reset_ttl_secs: u64,
    secure: bool,
}

impl SessionKeys {
    pub fn new(config: &SessionConfig) -> Self {
        let secret = config.secret.as_bytes();
        Self {
            encoding: Arc::new(EncodingKey::from_secret(secret)),
            decoding: Arc::new(DecodingKey::from_secret(secret)),
            secret: Arc::new(secret.to_vec()),
            ttl_secs: config.ttl_secs,
            reset_ttl_secs: config.reset_ttl_secs,
            secure: config.secure_cookie,
        }
    }

    /// Keyed digest of a stored password hash; changes whenever the password does
    pub fn fingerprint(&self, password_hash: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| AppError::Internal(format!("Invalid session secret: {}", e)))?;
        mac.update(password_hash.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Whether a token still matches `user`'s current password
    pub fn matches(&self, subject: &TokenSubject, user: &User) -> bool {
        subject.user_id == user.id
            && self
                .fingerprint(&user.password_hash)
                .is_ok_and(|current| current == subject.fingerprint)
    }

    /// Sign a session token for `user`
    pub fn issue(&self, user: &User) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = SessionClaims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            aud: SESSION_AUDIENCE.to_string(),
            pwd: self.fingerprint(&user.password_hash)?,
            iat: now,
            exp: now + self.ttl_secs as i64,
        };

        encode(&Header::new(SESSION_ALGORITHM), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("Failed to sign session: {}", e)))
    }

    /// Subject of a valid, unexpired session token
    pub fn verify(&self, token: &str) -> Option<TokenSubject> {
        let claims: SessionClaims = self.decode(token, SESSION_AUDIENCE)?;
        Some(TokenSubject {
            user_id: claims.sub.parse().ok()?,
            fingerprint: claims.pwd,
        })
    }

    /// Sign a single-use password reset token for `user`.
    ///
    /// It stops verifying once the password changes.
    pub fn issue_reset(&self, user: &User) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = ResetClaims {
            sub: user.id.to_string(),
            aud: RESET_AUDIENCE.to_string(),
            pwd: self.fingerprint(&user.password_hash)?,
            iat: now,
            exp: now + self.reset_ttl_secs as i64,
        };

        encode(&Header::new(SESSION_ALGORITHM), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("Failed to sign reset token: {}", e)))
    }

    pub fn verify_reset(&self, token: &str) -> Option<TokenSubject> {
        let claims: ResetClaims = self.decode(token, RESET_AUDIENCE)?;
        Some(TokenSubject {
            user_id: claims.sub.parse().ok()?,
            fingerprint: claims.pwd,
        })
    }

    fn decode<T: DeserializeOwned>(&self, token: &str, audience: &str) -> Option<T> {
        let mut validation = Validation::new(SESSION_ALGORITHM);
        validation.leeway = 0;
        validation.set_audience(&[audience]);

        match decode::<T>(token, &self.decoding, &validation) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                tracing::debug!(error = %e, audience, "token rejected");
                None
            }
        }
    }

    /// Cookie carrying a freshly issued session
    pub fn cookie(&self, token: String) -> Cookie<'static> {
        Cookie::build(SESSION_COOKIE, token)
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .max_age(CookieDuration::seconds(self.ttl_secs as i64))
            .finish()
    }

    /// Cookie that clears the session in the browser
    pub fn removal_cookie(&self) -> Cookie<'static> {
        let mut cookie = Cookie::build(SESSION_COOKIE, "")
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .finish();
        cookie.make_removal();
        cookie
    }
}

/// Resolve the session cookie to a stored user
async fn session_user(req: &HttpRequest) -> Result<Option<User>> {
    let Some(state) = req.app_data::<web::Data<AppState>>() else {
        return Err(AppError::Internal("application state not configured".into()));
    };
    let Some(cookie) = req.cookie(SESSION_COOKIE) else {
        return Ok(None);
    };
    let Some(subject) = state.sessions.verify(cookie.value()) else {
        return Ok(None);
    };

    let user = state.repo.find_user_by_id(subject.user_id).await?;
    Ok(user.filter(|user| {
        let current = state.sessions.matches(&subject, user);
        if !current {
            tracing::debug!(user_id = user.id, "session predates a password change");
        }
        current
    }))
}

/// Full path plus query, used as the post-login `next`
pub fn full_path(req: &HttpRequest) -> String {
    match req.query_string() {
        "" => req.path().to_string(),
        query => format!("{}?{}", req.path(), query),
    }
}

/// The signed-in user, if any
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Option<User>);

impl CurrentUser {
    pub fn user(&self) -> Option<&User> {
        self.0.as_ref()
    }

    pub fn id(&self) -> Option<i64> {
        self.0.as_ref().map(|u| u.id)
    }
}

impl FromRequest for CurrentUser {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, std::result::Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let req = req.clone();
        Box::pin(async move { Ok(CurrentUser(session_user(&req).await?)) })
    }
}

/// The signed-in user; anonymous requests are redirected to login
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl FromRequest for AuthenticatedUser {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, std::result::Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let req = req.clone();
        Box::pin(async move {
            match session_user(&req).await? {
                Some(user) => Ok(AuthenticatedUser(user)),
                None => Err(AppError::LoginRequired {
                    next: full_path(&req),
                }),
            }
        })
    }
}
