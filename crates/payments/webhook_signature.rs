use std::collections::{BTreeMap, HashMap};

use anyhow::{Result, anyhow};
use hmac::{Hmac, Mac, digest::InvalidLength};
use sha1::Sha1;
use tracing::{error, warn};

type HmacSha1 = Hmac<Sha1>;

const SHA1_HEX_LEN: usize = 40;

/// Form field carrying the processor's signature; never part of the signed message.
pub const MAC_FIELD: &str = "mac";

/// `|`-joined values of every field except `mac`, ordered by field name.
pub fn canonical_message(fields: &HashMap<String, String>) -> String {
    let ordered: BTreeMap<&str, &str> = fields
        .iter()
        .filter(|(name, _)| name.as_str() != MAC_FIELD)
        .map(|(name, value)| (name.as_str(), value.as_str()))
        .collect();

    ordered.into_values().collect::<Vec<_>>().join("|")
}

fn keyed_mac(fields: &HashMap<String, String>, salt: &str) -> Result<HmacSha1, InvalidLength> {
    let mut mac = HmacSha1::new_from_slice(salt.as_bytes())?;
    mac.update(canonical_message(fields).as_bytes());
    Ok(mac)
}

/// Lowercase hex HMAC-SHA1 of the canonical message.
pub fn compute_mac(fields: &HashMap<String, String>, salt: &str) -> Result<String> {
    let mac = keyed_mac(fields, salt).map_err(|err| anyhow!("invalid hmac key: {err}"))?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn is_lowercase_hex_digest(value: &str) -> bool {
    value.len() == SHA1_HEX_LEN
        && value
            .bytes()
            .all(|byte| matches!(byte, b'0'..=b'9' | b'a'..=b'f'))
}

/// Checks a webhook delivery against the server-held salt.
///
/// A mismatch is an ordinary rejection. A missing salt is a deployment problem and
/// is logged at error level, but the caller sees the same `false`.
pub fn verify_webhook_mac(
    fields: &HashMap<String, String>,
    claimed_mac: &str,
    salt: Option<&str>,
) -> bool {
    let Some(salt) = salt.filter(|salt| !salt.is_empty()) else {
        error!(
            "payment_webhook: private salt is not configured; rejecting webhook (deployment misconfiguration)"
        );
        return false;
    };

    // Digests are compared as lowercase hex text; the byte comparison below stays
    // constant time.
    if !is_lowercase_hex_digest(claimed_mac) {
        warn!("payment_webhook: mac is not a lowercase hex sha1 digest");
        return false;
    }

    let Ok(provided) = hex::decode(claimed_mac) else {
        warn!("payment_webhook: mac is not valid hex");
        return false;
    };

    let mac = match keyed_mac(fields, salt) {
        Ok(mac) => mac,
        Err(err) => {
            error!(error = %err, "payment_webhook: private salt rejected by hmac");
            return false;
        }
    };

    if mac.verify_slice(&provided).is_err() {
        warn!("payment_webhook: mac mismatch");
        return false;
    }

    true
}
