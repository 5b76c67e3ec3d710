use crate::core::error::DetectorError;
use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct ObjectInfo {
    pub name: String,
    pub size: u64,
    pub last_modified: Option<chrono::DateTime<chrono::Utc>>,
    pub is_dir: bool,
}

/// Opaque blob fetch against a bucket/path namespace. No retries performed
/// inside this layer — callers decide whether and how to retry.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn exists(&self, bucket: &str, path: &str) -> Result<bool, DetectorError>;
    async fn stat(&self, bucket: &str, path: &str) -> Result<ObjectInfo, DetectorError>;
    async fn get_bytes(&self, bucket: &str, path: &str) -> Result<Vec<u8>, DetectorError>;

    /// Downloads to a caller-owned temp file; the caller is responsible for
    /// deleting it on every exit path, success or failure.
    async fn get_to_temp_file(
        &self,
        bucket: &str,
        path: &str,
    ) -> Result<std::path::PathBuf, DetectorError>;

    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        recursive: bool,
    ) -> Result<Vec<ObjectInfo>, DetectorError>;
}

/// Speaks a MinIO/S3-compatible path-style HTTP API with basic header auth.
/// Full AWS SigV4 request signing is not implemented — see DESIGN.md.
pub struct MinioObjectStore {
    http: reqwest::Client,
    base_url: String,
    access_key: String,
    secret_key: String,
}

impl MinioObjectStore {
    pub fn new(http: reqwest::Client, base_url: String, access_key: String, secret_key: String) -> Self {
        Self {
            http,
            base_url,
            access_key,
            secret_key,
        }
    }

    fn object_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/{}/{}", self.base_url, bucket, path)
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .basic_auth(&self.access_key, Some(&self.secret_key))
    }
}

#[async_trait]
impl ObjectStore for MinioObjectStore {
    async fn exists(&self, bucket: &str, path: &str) -> Result<bool, DetectorError> {
        let resp = self
            .request(reqwest::Method::HEAD, self.object_url(bucket, path))
            .send()
            .await?;
        Ok(resp.status().is_success())
    }

    async fn stat(&self, bucket: &str, path: &str) -> Result<ObjectInfo, DetectorError> {
        let resp = self
            .request(reqwest::Method::HEAD, self.object_url(bucket, path))
            .send()
            .await?
            .error_for_status()?;
        let size = resp
            .headers()
            .get(reqwest::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0);
        let last_modified = resp
            .headers()
            .get(reqwest::header::LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| chrono::DateTime::parse_from_rfc2822(v).ok())
            .map(|dt| dt.with_timezone(&chrono::Utc));
        Ok(ObjectInfo {
            name: path.to_string(),
            size,
            last_modified,
            is_dir: false,
        })
    }

    async fn get_bytes(&self, bucket: &str, path: &str) -> Result<Vec<u8>, DetectorError> {
        let resp = self
            .request(reqwest::Method::GET, self.object_url(bucket, path))
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.bytes().await?.to_vec())
    }

    async fn get_to_temp_file(
        &self,
        bucket: &str,
        path: &str,
    ) -> Result<std::path::PathBuf, DetectorError> {
        let bytes = self.get_bytes(bucket, path).await?;
        let extension = std::path::Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin");
        let file_name = format!("plagiscope-{}.{}", uuid::Uuid::new_v4(), extension);
        let dest = std::env::temp_dir().join(file_name);
        tokio::fs::write(&dest, bytes).await?;
        Ok(dest)
    }

    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        _recursive: bool,
    ) -> Result<Vec<ObjectInfo>, DetectorError> {
        let url = format!("{}/{}?prefix={}&list-type=2", self.base_url, bucket, prefix);
        let body = self
            .request(reqwest::Method::GET, url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(parse_list_bucket_xml(&body))
    }
}

/// Minimal `ListBucketResult` XML scraper — enough to recover `Key`/`Size`
/// pairs without pulling in a full XML/SAX dependency for one endpoint.
fn parse_list_bucket_xml(body: &str) -> Vec<ObjectInfo> {
    let mut out = Vec::new();
    for contents in body.split("<Contents>").skip(1) {
        let end = contents.find("</Contents>").unwrap_or(contents.len());
        let block = &contents[..end];
        let key = extract_tag(block, "Key").unwrap_or_default();
        if key.is_empty() {
            continue;
        }
        let size = extract_tag(block, "Size")
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0);
        let last_modified = extract_tag(block, "LastModified")
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&chrono::Utc));
        out.push(ObjectInfo {
            name: key,
            size,
            last_modified,
            is_dir: false,
        });
    }
    out
}

fn extract_tag(block: &str, tag: &str) -> Option<String> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let start = block.find(&open)? + open.len();
    let end = block[start..].find(&close)? + start;
    Some(block[start..end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_key_and_size_from_list_bucket_xml() {
        let xml = r#"<ListBucketResult><Contents><Key>a/b.pdf</Key><Size>1024</Size><LastModified>2024-01-01T00:00:00.000Z</LastModified></Contents></ListBucketResult>"#;
        let objects = parse_list_bucket_xml(xml);
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].name, "a/b.pdf");
        assert_eq!(objects[0].size, 1024);
    }
}
