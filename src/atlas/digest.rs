//! HTTP Digest access authentication (RFC 2617, MD5 with `qop=auth`).

use crate::error::{ExporterError, Result};
use md5::{Digest, Md5};
use std::collections::HashMap;

/// Server challenge taken from a `WWW-Authenticate: Digest ...` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestChallenge {
    pub realm: String,
    pub nonce: String,
    pub qop: Option<String>,
    pub opaque: Option<String>,
    pub algorithm: Option<String>,
}

impl DigestChallenge {
    /// Parse a `WWW-Authenticate` header value.
    pub fn parse(header: &str) -> Result<Self> {
        let params = header
            .trim()
            .strip_prefix("Digest")
            .ok_or_else(|| ExporterError::http_error(Some(401), format!("unsupported challenge: {}", header)))?;
        let mut fields = parse_params(params);

        let mut take = |key: &str| fields.remove(key);
        let realm = take("realm");
        let nonce = take("nonce");
        let (Some(realm), Some(nonce)) = (realm, nonce) else {
            return Err(ExporterError::http_error(
                Some(401),
                "digest challenge is missing realm or nonce",
            ));
        };

        Ok(Self {
            realm,
            nonce,
            qop: take("qop"),
            opaque: take("opaque"),
            algorithm: take("algorithm"),
        })
    }

    fn supports_auth_qop(&self) -> bool {
        self.qop
            .as_deref()
            .map(|qop| qop.split(',').any(|q| q.trim() == "auth"))
            .unwrap_or(false)
    }

    /// Build the `Authorization` header answering this challenge.
    pub fn authorization(
        &self,
        username: &str,
        password: &str,
        method: &str,
        uri: &str,
        nonce_count: u32,
        cnonce: &str,
    ) -> String {
        let ha1 = md5_hex(&format!("{}:{}:{}", username, self.realm, password));
        let ha2 = md5_hex(&format!("{}:{}", method, uri));

        let mut header = format!(
            "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{}\", algorithm=MD5",
            username, self.realm, self.nonce, uri
        );

        if self.supports_auth_qop() {
            let nc = format!("{:08x}", nonce_count);
            let response = md5_hex(&format!(
                "{}:{}:{}:{}:auth:{}",
                ha1, self.nonce, nc, cnonce, ha2
            ));
            header.push_str(&format!(
                ", qop=auth, nc={}, cnonce=\"{}\", response=\"{}\"",
                nc, cnonce, response
            ));
        } else {
            let response = md5_hex(&format!("{}:{}:{}", ha1, self.nonce, ha2));
            header.push_str(&format!(", response=\"{}\"", response));
        }

        if let Some(opaque) = &self.opaque {
            header.push_str(&format!(", opaque=\"{}\"", opaque));
        }

        header
    }
}

fn md5_hex(input: &str) -> String {
    hex::encode(Md5::digest(input.as_bytes()))
}

/// Split `key=value, key="quoted, value"` pairs; keys are lowercased.
fn parse_params(input: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    let mut rest = input.trim();

    while !rest.is_empty() {
        let Some(eq) = rest.find('=') else { break };
        let key = rest[..eq].trim().trim_start_matches(',').trim().to_lowercase();
        rest = rest[eq + 1..].trim_start();

        let value;
        if let Some(quoted) = rest.strip_prefix('"') {
            let end = quoted.find('"').unwrap_or(quoted.len());
            value = quoted[..end].to_string();
            rest = quoted.get(end + 1..).unwrap_or("");
        } else {
            let end = rest.find(',').unwrap_or(rest.len());
            value = rest[..end].trim().to_string();
            rest = &rest[end..];
        }

        params.insert(key, value);
        rest = rest.trim_start().trim_start_matches(',').trim_start();
    }

    params
}
