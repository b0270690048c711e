//! Webhook clients and their signing secrets.

use rand::RngCore;
use serde::Serialize;

use crate::queue::Provider;

/// Bytes of randomness in a generated client UID.
const CLIENT_UID_BYTES: usize = 8;

/// Bytes of randomness in a generated signing secret.
const CLIENT_SECRET_BYTES: usize = 32;

/// A registered webhook sender.
///
/// The secret is only ever returned once, at creation time, so it is never serialized.
#[derive(Debug, Clone, Serialize)]
pub struct Client {
    pub id: i64,
    #[serde(rename = "client_uid")]
    pub uid: String,
    #[serde(skip_serializing)]
    pub secret: String,
    pub provider: Provider,
}

/// A client about to be registered.
#[derive(Debug, Clone)]
pub struct NewClient {
    pub uid: String,
    pub secret: String,
    pub provider: Provider,
}

impl NewClient {
    /// Build a client with a fresh secret, generating the UID when none is supplied.
    pub fn generate(uid: Option<String>, provider: Provider) -> Self {
        let uid = uid
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| random_hex(CLIENT_UID_BYTES));

        Self {
            uid,
            secret: random_hex(CLIENT_SECRET_BYTES),
            provider,
        }
    }
}

fn random_hex(n_bytes: usize) -> String {
    let mut bytes = vec![0u8; n_bytes];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
