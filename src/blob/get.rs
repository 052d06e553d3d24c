use std::collections::HashMap;

use futures::future::try_join_all;
use tokio_util::sync::CancellationToken;

use super::{blob_error, validate_name, BlobService};
use crate::{
    error::{Result, StorageError},
    return_option::{BlobContent, ReturnOption},
};

impl BlobService {
    #[tracing::instrument(skip_all, fields(container = %container, blob = %blob))]
    pub async fn get_one(
        &self,
        container: &str,
        blob: &str,
        option: &ReturnOption,
        cancel: &CancellationToken,
    ) -> Result<BlobContent> {
        self.run("blob_get", cancel, async {
            validate_name("container", container)?;
            validate_name("blob", blob)?;
            self.containers.check(container, true).await?;
            self.fetch(container, blob, option).await
        })
        .await
    }

    /// Fetch several blobs concurrently. Fails on the first missing blob.
    #[tracing::instrument(skip_all, fields(container = %container, count = blobs.len()))]
    pub async fn get_many(
        &self,
        container: &str,
        blobs: &[String],
        option: &ReturnOption,
        cancel: &CancellationToken,
    ) -> Result<HashMap<String, BlobContent>> {
        self.run("blob_get_many", cancel, async {
            validate_name("container", container)?;
            self.containers.check(container, true).await?;
            self.fetch_many(container, blobs, option).await
        })
        .await
    }

    /// Fetch every blob of a container.
    #[tracing::instrument(skip_all, fields(container = %container))]
    pub async fn get_all(
        &self,
        container: &str,
        option: &ReturnOption,
        cancel: &CancellationToken,
    ) -> Result<HashMap<String, BlobContent>> {
        self.run("blob_get_all", cancel, async {
            validate_name("container", container)?;
            self.containers.check(container, true).await?;
            let blobs = self.backend.list_blobs(container).await?;
            self.fetch_many(container, &blobs, option).await
        })
        .await
    }

    async fn fetch_many(
        &self,
        container: &str,
        blobs: &[String],
        option: &ReturnOption,
    ) -> Result<HashMap<String, BlobContent>> {
        let fetched = try_join_all(blobs.iter().map(|blob| async move {
            validate_name("blob", blob)?;
            let content = self.fetch(container, blob, option).await?;
            Ok::<_, StorageError>((blob.clone(), content))
        }))
        .await?;
        Ok(fetched.into_iter().collect())
    }

    async fn fetch(&self, container: &str, blob: &str, option: &ReturnOption) -> Result<BlobContent> {
        let bytes = if option.needs_content() {
            let bytes = self
                .backend
                .download(container, blob)
                .await
                .map_err(|e| blob_error(e, container, blob))?;
            Some(bytes)
        } else {
            if !self.backend.blob_exists(container, blob).await? {
                return Err(StorageError::BlobDoesNotExist {
                    container: container.to_string(),
                    blob: blob.to_string(),
                });
            }
            None
        };

        let source_url = match option {
            ReturnOption::SignedUrl(access) => {
                self.backend
                    .signed_url(container, blob, access.clone())
                    .await
                    .map_err(|e| blob_error(e, container, blob))?
                    .url
            }
            _ => self.backend.blob_url(container, blob)?,
        };
        option.parse(blob, bytes, source_url)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use blob_store::{SignedAccess, MAX_PRESIGN_EXPIRY};
    use tokio_util::sync::CancellationToken;

    use crate::{
        error::StorageError,
        return_option::{BlobContent, ReturnOption},
        testing::TestStorage,
    };

    #[tokio::test]
    async fn test_get_one_in_every_shape() {
        let test = TestStorage::new();
        test.put_blob("photos", "cat.png", b"meow").await;
        let blobs = test.client.blobs();

        let content = blobs
            .get_one("photos", "cat.png", &ReturnOption::Bytes, &test.cancel)
            .await
            .unwrap();
        assert_eq!(content.as_bytes().unwrap().as_ref(), b"meow");

        let content = blobs
            .get_one("photos", "cat.png", &ReturnOption::Base64DataUri, &test.cancel)
            .await
            .unwrap();
        assert_eq!(content.as_data_uri(), Some("data:image/png;base64,bWVvdw=="));

        let content = blobs
            .get_one("photos", "cat.png", &ReturnOption::Url, &test.cancel)
            .await
            .unwrap();
        assert_eq!(
            content.as_url().map(|u| u.as_str()),
            Some("memory:///photos/cat.png")
        );
    }

    #[tokio::test]
    async fn test_get_missing() {
        let test = TestStorage::new();
        let blobs = test.client.blobs();

        let err = blobs
            .get_one("photos", "cat.png", &ReturnOption::Bytes, &test.cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::ContainerDoesNotExist(_)));

        test.create_container("photos").await;
        for option in [ReturnOption::Bytes, ReturnOption::Url] {
            let err = blobs
                .get_one("photos", "cat.png", &option, &test.cancel)
                .await
                .unwrap_err();
            assert!(matches!(err, StorageError::BlobDoesNotExist { .. }));
        }
    }

    #[tokio::test]
    async fn test_signed_url_without_signing_credentials() {
        let test = TestStorage::new();
        test.put_blob("photos", "cat.png", b"meow").await;

        let option = ReturnOption::SignedUrl(SignedAccess::Expiry(Duration::from_secs(60)));
        let err = test
            .client
            .blobs()
            .get_one("photos", "cat.png", &option, &test.cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Unauthorized { .. }));

        let option = ReturnOption::SignedUrl(SignedAccess::Expiry(
            MAX_PRESIGN_EXPIRY + Duration::from_secs(1),
        ));
        let err = test
            .client
            .blobs()
            .get_one("photos", "cat.png", &option, &test.cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Unauthorized { .. }));
    }

    #[tokio::test]
    async fn test_get_many_and_all() {
        let test = TestStorage::new();
        for name in ["a.txt", "b.txt", "c.txt"] {
            test.put_blob("docs", name, name.as_bytes()).await;
        }
        let blobs = test.client.blobs();

        let names = vec!["a.txt".to_string(), "c.txt".to_string()];
        let many = blobs
            .get_many("docs", &names, &ReturnOption::Bytes, &test.cancel)
            .await
            .unwrap();
        assert_eq!(many.len(), 2);
        assert_eq!(
            many.get("c.txt"),
            Some(&BlobContent::Bytes(bytes::Bytes::from_static(b"c.txt")))
        );

        let none = blobs
            .get_many("docs", &[], &ReturnOption::Bytes, &test.cancel)
            .await
            .unwrap();
        assert!(none.is_empty());

        let all = blobs
            .get_all("docs", &ReturnOption::Url, &test.cancel)
            .await
            .unwrap();
        let mut keys: Vec<_> = all.keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["a.txt", "b.txt", "c.txt"]);

        let names = vec!["a.txt".to_string(), "zzz.txt".to_string()];
        let err = blobs
            .get_many("docs", &names, &ReturnOption::Bytes, &test.cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::BlobDoesNotExist { ref blob, .. } if blob == "zzz.txt"));
    }

    #[tokio::test]
    async fn test_get_all_with_reserved_characters_in_names() {
        let test = TestStorage::new();
        for name in ["100%#1 x.txt", "q?a*b.txt", "dir/{x}.txt"] {
            test.put_blob("docs", name, name.as_bytes()).await;
        }

        let all = test
            .client
            .blobs()
            .get_all("docs", &ReturnOption::Bytes, &test.cancel)
            .await
            .unwrap();
        assert_eq!(all.len(), 3);
        for (name, content) in &all {
            assert_eq!(content.as_bytes().unwrap().as_ref(), name.as_bytes());
        }
        assert!(all.contains_key("100%#1 x.txt"));

        let listed = test
            .client
            .blobs()
            .list_blobs("docs", &test.cancel)
            .await
            .unwrap();
        assert_eq!(listed, vec!["100%#1 x.txt", "dir/{x}.txt", "q?a*b.txt"]);
    }

    #[tokio::test]
    async fn test_cancelled_get() {
        let test = TestStorage::new();
        test.put_blob("photos", "cat.png", b"meow").await;

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = test
            .client
            .blobs()
            .get_one("photos", "cat.png", &ReturnOption::Bytes, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Cancelled));
    }
}
