//! Object storage.
//! Mission: Presigned POST grants, presigned GET, server-side copy, delete,
//! and streamed get against an S3-compatible store (spec §4.7).

pub mod presign_post;

use anyhow::Context;
use async_trait::async_trait;
use s3::request::ResponseDataStream;
use s3::{creds::Credentials, Bucket, Region};

pub use presign_post::{PostPolicy, UploadGrant};

const SIGNED_GET_TTL_SECS: u32 = 15 * 60;

/// Storage failures classified into the two domain categories the rest of
/// the crate cares about, plus a generic fallback (spec §4.7).
#[derive(Debug)]
pub enum StorageError {
    NotFound(String),
    AccessDenied(String),
    Other(anyhow::Error),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::NotFound(key) => write!(f, "object not found: {key}"),
            StorageError::AccessDenied(key) => write!(f, "access denied: {key}"),
            StorageError::Other(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<anyhow::Error> for StorageError {
    fn from(err: anyhow::Error) -> Self {
        StorageError::Other(err)
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// `NOT_FOUND` for a 404, `ACCESS_DENIED` for a 403, `None` for anything
/// else (caller treats that as a generic failure).
fn classify_status(status: u16, key: &str) -> Option<StorageError> {
    match status {
        404 => Some(StorageError::NotFound(key.to_string())),
        403 => Some(StorageError::AccessDenied(key.to_string())),
        _ => None,
    }
}

/// The object-store operations the rest of the crate depends on. A trait so
/// handlers and the indexer never touch `s3::Bucket` directly, the same
/// separation the teacher drew around its HTTP clients.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    fn build_upload_grant(&self, policy: PostPolicy) -> Result<UploadGrant>;
    fn presign_get(&self, bucket: StorageBucket, key: &str) -> Result<String>;
    async fn copy(&self, bucket: StorageBucket, from: &str, to: &str) -> Result<()>;
    async fn delete(&self, bucket: StorageBucket, key: &str) -> Result<()>;
    /// Streaming read so large files are scanned without being buffered
    /// into memory (spec §4.7).
    async fn get_stream(&self, bucket: StorageBucket, key: &str) -> Result<ResponseDataStream>;
}

/// Which configured bucket an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBucket {
    /// Ephemeral landing zone for client uploads, scanned by validation workers.
    Incoming,
    /// Serves `MODEL` files — never public, always via a signed GET.
    Private,
    /// Serves `IMAGE` files — public URL composition, no signing.
    Public,
}

pub struct S3Storage {
    incoming: Bucket,
    private: Bucket,
    public_base_url: String,
    incoming_bucket_name: String,
}

impl S3Storage {
    pub fn new(
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        incoming_bucket_name: &str,
        private_bucket_name: &str,
        public_base_url: &str,
    ) -> Result<Self> {
        let region = Region::Custom { region: region.to_string(), endpoint: endpoint.to_string() };
        let credentials = Credentials::new(Some(access_key), Some(secret_key), None, None, None)
            .context("invalid storage credentials")?;

        let incoming = Bucket::new(incoming_bucket_name, region.clone(), credentials.clone())
            .context("failed to construct incoming bucket handle")?
            .with_path_style();
        let private = Bucket::new(private_bucket_name, region, credentials)
            .context("failed to construct private bucket handle")?
            .with_path_style();

        Ok(Self {
            incoming,
            private,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            incoming_bucket_name: incoming_bucket_name.to_string(),
        })
    }

    /// `{publicBaseURL}/{path}` with exactly one slash (spec §4.6).
    pub fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.public_base_url, path.trim_start_matches('/'))
    }

    fn bucket_for(&self, bucket: StorageBucket) -> Option<&Bucket> {
        match bucket {
            StorageBucket::Incoming => Some(&self.incoming),
            StorageBucket::Private => Some(&self.private),
            StorageBucket::Public => None,
        }
    }
}

#[async_trait]
impl StorageAdapter for S3Storage {
    fn build_upload_grant(&self, policy: PostPolicy) -> Result<UploadGrant> {
        presign_post::sign(&self.incoming, &self.incoming_bucket_name, policy).map_err(StorageError::from)
    }

    fn presign_get(&self, bucket: StorageBucket, key: &str) -> Result<String> {
        let bucket = self
            .bucket_for(bucket)
            .context("public bucket has no signed URL, use public_url")
            .map_err(StorageError::from)?;
        bucket
            .presign_get(key, SIGNED_GET_TTL_SECS, None)
            .context("failed to presign GET url")
            .map_err(StorageError::from)
    }

    async fn copy(&self, bucket: StorageBucket, from: &str, to: &str) -> Result<()> {
        let bucket = self
            .bucket_for(bucket)
            .context("cannot copy into the public virtual bucket")
            .map_err(StorageError::from)?;
        let status = bucket
            .copy_object_internal(from, to)
            .await
            .context("copy_object_internal failed")
            .map_err(StorageError::from)?;
        if let Some(err) = classify_status(status, to) {
            return Err(err);
        }
        if !(200..300).contains(&status) {
            return Err(StorageError::from(anyhow::anyhow!("copy returned status {status}")));
        }
        Ok(())
    }

    async fn delete(&self, bucket: StorageBucket, key: &str) -> Result<()> {
        let bucket = self
            .bucket_for(bucket)
            .context("cannot delete from the public virtual bucket")
            .map_err(StorageError::from)?;
        let response = bucket.delete_object(key).await.context("delete_object failed").map_err(StorageError::from)?;
        let status = response.status_code();
        if let Some(err) = classify_status(status, key) {
            return Err(err);
        }
        if !(200..300).contains(&status) {
            return Err(StorageError::from(anyhow::anyhow!("delete returned status {status}")));
        }
        Ok(())
    }

    async fn get_stream(&self, bucket: StorageBucket, key: &str) -> Result<ResponseDataStream> {
        let bucket = self
            .bucket_for(bucket)
            .context("cannot stream from the public virtual bucket")
            .map_err(StorageError::from)?;
        let stream = bucket
            .get_object_stream(key)
            .await
            .context("get_object_stream failed")
            .map_err(StorageError::from)?;
        if let Some(err) = classify_status(stream.status_code, key) {
            return Err(err);
        }
        if !(200..300).contains(&stream.status_code) {
            return Err(StorageError::from(anyhow::anyhow!("get returned status {}", stream.status_code)));
        }
        Ok(stream)
    }
}

/// Minimal in-memory stand-ins for [`StorageAdapter`], used by unit tests
/// elsewhere in the crate that need a storage dependency but never touch it.
#[cfg(test)]
pub mod tests_support {
    use super::*;

    pub struct NullStorage;

    #[async_trait]
    impl StorageAdapter for NullStorage {
        fn build_upload_grant(&self, policy: PostPolicy) -> Result<UploadGrant> {
            Ok(UploadGrant {
                upload_url: "https://incoming.example.test".to_string(),
                form_fields: vec![("key".to_string(), policy.key.clone())],
                key: policy.key,
            })
        }

        fn presign_get(&self, _bucket: StorageBucket, key: &str) -> Result<String> {
            Ok(format!("https://signed.example.test/{key}"))
        }

        async fn copy(&self, _bucket: StorageBucket, _from: &str, _to: &str) -> Result<()> {
            Ok(())
        }

        async fn delete(&self, _bucket: StorageBucket, _key: &str) -> Result<()> {
            Ok(())
        }

        async fn get_stream(&self, _bucket: StorageBucket, _key: &str) -> Result<ResponseDataStream> {
            let empty: s3::request::DataStream = Box::pin(futures::stream::empty());
            Ok(ResponseDataStream { bytes: empty, status_code: 200 })
        }
    }
}
