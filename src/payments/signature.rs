use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

fn mac_for(secret: &SecretString, order_id: &str, payment_id: &str) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes()).ok()?;
    mac.update(order_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_bytes());
    Some(mac)
}

/// Hex HMAC-SHA256 of `"<order_id>|<payment_id>"`, as the gateway computes it.
pub fn sign(secret: &SecretString, order_id: &str, payment_id: &str) -> String {
    mac_for(secret, order_id, payment_id)
        .map(|mac| hex::encode(mac.finalize().into_bytes()))
        .unwrap_or_default()
}

/// Byte-for-byte, constant-time check of the signature supplied by the client.
pub fn verify(secret: &SecretString, order_id: &str, payment_id: &str, signature: &str) -> bool {
    let expected = sign(secret, order_id, payment_id);
    !expected.is_empty() && constant_time_compare(&expected, signature)
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}
