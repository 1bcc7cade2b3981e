//! SigV4 POST policy signing.
//! Mission: Build the browser-submittable form fields for a bounded upload
//! (spec §4.1). `rust-s3`'s `presign_post` takes an already-built, already
//! base64-encoded policy document rather than generating one from scratch,
//! so the policy document and its signature are hand-rolled here against
//! the same algorithm AWS documents for SigV4 POST uploads, using the
//! hashing/encoding crates already in the dependency stack.

use anyhow::Result;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use s3::Bucket;
use serde_json::json;
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Constraints for a single presigned upload grant.
pub struct PostPolicy {
    pub key: String,
    pub content_type: String,
    pub min_size_bytes: u64,
    pub max_size_bytes: u64,
    pub expiry: Duration,
}

/// What a caller must send back as `formFields`, verbatim, with the file as
/// the last multipart field (spec §4.1).
pub struct UploadGrant {
    pub upload_url: String,
    pub form_fields: Vec<(String, String)>,
    pub key: String,
}

/// Build and sign a POST policy for `policy.key` against `bucket`.
pub fn sign(bucket: &Bucket, bucket_name: &str, policy: PostPolicy) -> Result<UploadGrant> {
    let now = Utc::now();
    let expiration = now + policy.expiry;

    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date_stamp = now.format("%Y%m%d").to_string();
    let region = bucket.region.to_string();
    let credentials = bucket.credentials();
    let credentials = credentials.read().map_err(|_| anyhow::anyhow!("credentials lock poisoned"))?;
    let access_key = credentials.access_key.clone().unwrap_or_default();
    let secret_key = credentials.secret_key.clone().unwrap_or_default();
    drop(credentials);
    let credential = format!("{access_key}/{date_stamp}/{region}/s3/aws4_request");

    let policy_document = json!({
        "expiration": expiration.to_rfc3339(),
        "conditions": [
            { "bucket": bucket_name },
            ["eq", "$key", policy.key],
            ["eq", "$Content-Type", policy.content_type],
            ["content-length-range", policy.min_size_bytes, policy.max_size_bytes],
            { "x-amz-algorithm": "AWS4-HMAC-SHA256" },
            { "x-amz-credential": credential },
            { "x-amz-date": amz_date },
        ],
    });

    let policy_base64 = STANDARD.encode(policy_document.to_string());
    let signature = sign_policy(&secret_key, &date_stamp, &region, &policy_base64)?;

    let form_fields = vec![
        ("key".to_string(), policy.key.clone()),
        ("Content-Type".to_string(), policy.content_type),
        ("x-amz-algorithm".to_string(), "AWS4-HMAC-SHA256".to_string()),
        ("x-amz-credential".to_string(), credential),
        ("x-amz-date".to_string(), amz_date),
        ("policy".to_string(), policy_base64),
        ("x-amz-signature".to_string(), signature),
    ];

    Ok(UploadGrant {
        upload_url: format!("https://{bucket_name}.{}", bucket.host()),
        form_fields,
        key: policy.key,
    })
}

/// AWS SigV4 signing-key derivation: `HMAC(HMAC(HMAC(HMAC("AWS4"+secret, date), region), "s3"), "aws4_request")`,
/// then sign the policy document with the resulting key.
fn sign_policy(secret_key: &str, date_stamp: &str, region: &str, string_to_sign: &str) -> Result<String> {
    let k_date = hmac_sha256(format!("AWS4{secret_key}").as_bytes(), date_stamp.as_bytes())?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, b"s3")?;
    let k_signing = hmac_sha256(&k_service, b"aws4_request")?;
    let signature = hmac_sha256(&k_signing, string_to_sign.as_bytes())?;
    Ok(hex::encode(signature))
}

fn hmac_sha256(key: &[u8], message: &[u8]) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|e| anyhow::anyhow!("invalid hmac key length: {e}"))?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Hash a filename into the deterministic, collision-resistant path segment
/// used by the upload key format (spec §4.1).
pub fn hash_filename(filename: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(filename.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_filename_is_deterministic() {
        assert_eq!(hash_filename("dragon.stl"), hash_filename("dragon.stl"));
        assert_ne!(hash_filename("dragon.stl"), hash_filename("dragon.3mf"));
    }

    #[test]
    fn hmac_sha256_produces_32_bytes() {
        let mac = hmac_sha256(b"secret", b"message").unwrap();
        assert_eq!(mac.len(), 32);
    }
}
