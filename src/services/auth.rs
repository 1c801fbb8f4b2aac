use anyhow::Result;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

pub const SESSION_COOKIE: &str = "session";
pub const SESSION_MAX_AGE_SECS: i64 = 60 * 60 * 24 * 30; // 30 days
pub const MIN_USERNAME_LEN: usize = 3;
pub const MIN_PASSWORD_LEN: usize = 6;
const BCRYPT_COST: u32 = 10;

/// Usernames are stored trimmed and lowercased.
pub fn normalize_username(username: &str) -> String {
    username.trim().to_lowercase()
}

pub async fn hash_password(password: &str) -> Result<String> {
    let password = password.to_string();
    let hashed = tokio::task::spawn_blocking(move || bcrypt::hash(password, BCRYPT_COST)).await??;
    Ok(hashed)
}

pub async fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let password = password.to_string();
    let hash = hash.to_string();
    let valid = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await??;
    Ok(valid)
}

/// Signs and checks session tokens of the form `<user id>.<hex hmac>`.
#[derive(Clone)]
pub struct SessionSigner {
    secret: Vec<u8>,
    secure_cookie: bool,
}

impl SessionSigner {
    pub fn new(secret: impl Into<Vec<u8>>, secure_cookie: bool) -> Self {
        Self {
            secret: secret.into(),
            secure_cookie,
        }
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts keys of any length")
    }

    pub fn sign(&self, user_id: Uuid) -> String {
        let id = user_id.to_string();
        let mut mac = self.mac();
        mac.update(id.as_bytes());
        format!("{}.{}", id, hex::encode(mac.finalize().into_bytes()))
    }

    /// Returns the user id if the token carries a valid signature.
    pub fn verify(&self, token: &str) -> Option<Uuid> {
        let (id, signature) = token.split_once('.')?;
        let signature = hex::decode(signature).ok()?;

        let mut mac = self.mac();
        mac.update(id.as_bytes());
        mac.verify_slice(&signature).ok()?;

        Uuid::parse_str(id).ok()
    }

    pub fn session_cookie(&self, user_id: Uuid) -> String {
        self.cookie(&self.sign(user_id), SESSION_MAX_AGE_SECS)
    }

    pub fn clear_cookie(&self) -> String {
        self.cookie("", 0)
    }

    fn cookie(&self, value: &str, max_age: i64) -> String {
        let mut cookie = format!(
            "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
            SESSION_COOKIE, value, max_age
        );
        if self.secure_cookie {
            cookie.push_str("; Secure");
        }
        cookie
    }
}
