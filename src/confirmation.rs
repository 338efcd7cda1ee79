//! Stateless, single-use confirmation codes.
//!
//! A code is `"<issued-at base36>-<hex HMAC>"`. The HMAC covers the issue
//! timestamp and the parts of the user record that change once the code has
//! been used (`last_login`) or the account has changed hands (`email`), so no
//! code table is needed: the expected code is regenerated at verification time.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{config::AppConfig, models::User};

type HmacSha256 = Hmac<Sha256>;

/// Number of HMAC bytes kept in a code (20 hex characters).
const CODE_MAC_BYTES: usize = 10;
const KEY_SALT: &str = "yamdb.confirmation-code";

/// ConfirmationCodes
///
/// Generator and checker for confirmation codes keyed by the server secret.
#[derive(Clone)]
pub struct ConfirmationCodes {
    secret: String,
    ttl_secs: i64,
}

impl ConfirmationCodes {
    pub fn new(secret: impl Into<String>, ttl_secs: i64) -> Self {
        Self {
            secret: secret.into(),
            ttl_secs,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.secret_key.clone(), config.confirmation_code_ttl_secs)
    }

    /// Issues a code for the user's current state.
    pub fn make_code(&self, user: &User) -> String {
        self.make_code_at(user, Utc::now())
    }

    pub fn make_code_at(&self, user: &User, now: DateTime<Utc>) -> String {
        let timestamp = now.timestamp().max(0) as u64;
        let mac = self.mac(user, timestamp).finalize().into_bytes();
        format!(
            "{}-{}",
            to_base36(timestamp),
            hex::encode(&mac[..CODE_MAC_BYTES])
        )
    }

    /// Checks a submitted code against the user's current state.
    pub fn check_code(&self, user: &User, code: &str) -> bool {
        self.check_code_at(user, code, Utc::now())
    }

    pub fn check_code_at(&self, user: &User, code: &str, now: DateTime<Utc>) -> bool {
        let Some((ts_part, mac_part)) = code.split_once('-') else {
            return false;
        };
        let Some(timestamp) = from_base36(ts_part) else {
            return false;
        };
        let Some(submitted) = hex::decode(mac_part) else {
            return false;
        };
        if submitted.len() != CODE_MAC_BYTES {
            return false;
        }
        let Some(age) = i64::try_from(timestamp)
            .ok()
            .and_then(|issued| now.timestamp().checked_sub(issued))
        else {
            return false;
        };
        if age < 0 || age > self.ttl_secs {
            return false;
        }
        // Constant-time comparison of the truncated MAC.
        self.mac(user, timestamp)
            .verify_truncated_left(&submitted)
            .is_ok()
    }

    fn mac(&self, user: &User, timestamp: u64) -> HmacSha256 {
        let mut mac = HmacSha256::new_from_slice(format!("{KEY_SALT}{}", self.secret).as_bytes())
            .expect("HMAC accepts any key length");
        let last_login = user
            .last_login
            .map(|t| t.timestamp_micros().to_string())
            .unwrap_or_default();
        mac.update(user.id.to_string().as_bytes());
        mac.update(b"|");
        mac.update(last_login.as_bytes());
        mac.update(b"|");
        mac.update(user.email.as_bytes());
        mac.update(b"|");
        mac.update(timestamp.to_string().as_bytes());
        mac
    }
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

fn from_base36(value: &str) -> Option<u64> {
    if value.is_empty() || value.len() > 13 {
        return None;
    }
    u64::from_str_radix(value, 36).ok()
}

// ---------------------------------------------------------------------------
// hex encoding helper (no extra dep)
// ---------------------------------------------------------------------------

mod hex {
    /// Encode bytes as a lowercase hex string.
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Decode a hex string; `None` on odd length or non-hex characters.
    pub fn decode(value: &str) -> Option<Vec<u8>> {
        if value.len() % 2 != 0 || !value.is_ascii() {
            return None;
        }
        (0..value.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&value[i..i + 2], 16).ok())
            .collect()
    }
}
