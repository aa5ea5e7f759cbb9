//! Azure Blob Storage over its REST API.

use async_trait::async_trait;
use reqwest::Method;
use url::Url;

use super::{BlobStore, CopyStatus};
use crate::error::{PipelineError, Result};
use crate::http_client::{ApiClient, Credential};

const STORAGE_API_VERSION: &str = "2023-11-03";

pub struct AzureBlobStore {
    http: ApiClient,
    account_url: Url,
    credential: Credential,
}

impl AzureBlobStore {
    pub fn new(http: ApiClient, account_url: &str, bearer: Option<&str>) -> Result<Self> {
        let account_url = Url::parse(account_url.trim_end_matches('/')).map_err(|e| {
            PipelineError::Config(format!("invalid storage account url {}: {}", account_url, e))
        })?;
        Ok(Self {
            http,
            account_url,
            credential: match bearer {
                Some(token) if !token.is_empty() => Credential::Bearer {
                    token: token.to_string(),
                },
                _ => Credential::None,
            },
        })
    }

    /// URL of a blob with each name segment percent-encoded.
    fn blob_url(&self, container: &str, name: &str) -> Result<Url> {
        let mut url = self.account_url.clone();
        url.path_segments_mut()
            .map_err(|_| PipelineError::Config("storage account url cannot be a base".into()))?
            .pop_if_empty()
            .push(container)
            .extend(name.split('/'));
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        self.http
            .request(method, url.as_str(), &self.credential)
            .header("x-ms-version", STORAGE_API_VERSION)
    }
}

fn parse_copy_status(operation: &str, value: Option<&str>) -> Result<CopyStatus> {
    match value {
        // A blob without copy metadata is complete.
        None => Ok(CopyStatus::Success),
        Some(raw) => CopyStatus::from_str(raw).ok_or_else(|| {
            PipelineError::protocol(operation, format!("unknown copy status '{}'", raw))
        }),
    }
}

#[async_trait]
impl BlobStore for AzureBlobStore {
    async fn write(
        &self,
        container: &str,
        name: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        let url = self.blob_url(container, name)?;
        let request = self
            .request(Method::PUT, url)
            .header("x-ms-blob-type", "BlockBlob")
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(data);
        self.http.send("storage.write", request).await?;
        Ok(())
    }

    async fn copy(&self, container: &str, name: &str, source_url: &str) -> Result<CopyStatus> {
        let url = self.blob_url(container, name)?;
        let request = self
            .request(Method::PUT, url)
            .header("x-ms-copy-source", source_url)
            .header(reqwest::header::CONTENT_LENGTH, 0);
        let response = self.http.send("storage.copy", request).await?;
        parse_copy_status("storage.copy", response.header("x-ms-copy-status"))
    }

    async fn copy_status(&self, container: &str, name: &str) -> Result<CopyStatus> {
        let url = self.blob_url(container, name)?;
        let response = self
            .http
            .send("storage.copy_status", self.request(Method::HEAD, url))
            .await?;
        parse_copy_status("storage.copy_status", response.header("x-ms-copy-status"))
    }

    async fn delete(&self, container: &str, name: &str) -> Result<()> {
        let url = self.blob_url(container, name)?;
        match self
            .http
            .send("storage.delete", self.request(Method::DELETE, url))
            .await
        {
            Ok(_) => Ok(()),
            Err(PipelineError::Http { status: 404, .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn container_url(&self, container: &str) -> String {
        format!(
            "{}/{}",
            self.account_url.as_str().trim_end_matches('/'),
            container
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::DEFAULT_TIMEOUT;

    fn store() -> AzureBlobStore {
        AzureBlobStore::new(
            ApiClient::new(DEFAULT_TIMEOUT).unwrap(),
            "https://acct.blob.core.windows.net/",
            Some("token"),
        )
        .unwrap()
    }

    #[test]
    fn test_blob_url_encodes_segments() {
        let url = store().blob_url("final", "reports/q3 summary.json").unwrap();
        assert_eq!(
            url.as_str(),
            "https://acct.blob.core.windows.net/final/reports/q3%20summary.json"
        );
    }

    #[test]
    fn test_container_url() {
        assert_eq!(
            store().container_url("silver"),
            "https://acct.blob.core.windows.net/silver"
        );
    }

    #[test]
    fn test_parse_copy_status() {
        assert_eq!(parse_copy_status("op", None).unwrap(), CopyStatus::Success);
        assert_eq!(
            parse_copy_status("op", Some("pending")).unwrap(),
            CopyStatus::Pending
        );
        assert!(parse_copy_status("op", Some("??")).is_err());
    }

    #[test]
    fn test_rejects_bad_account_url() {
        assert!(AzureBlobStore::new(ApiClient::new(DEFAULT_TIMEOUT).unwrap(), "not a url", None).is_err());
    }
}
