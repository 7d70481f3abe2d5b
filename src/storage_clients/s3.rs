use crate::storage_clients::{
    BlobNames, BlobReader, ObjectStore, StorageDefinition, StorageField, StorageFields,
};
use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3 as s3;
use aws_types::region::Region;
use futures::stream::{self, StreamExt, TryStreamExt};
use s3::error::DisplayErrorContext;
use s3::primitives::ByteStream;
use s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use std::path::Path;
use std::sync::Arc;

const DEFAULT_REGION: &str = "us-east-1";

pub struct S3ClientStorage {
    client: s3::Client,
    region: String,
    endpoint: String,
    path_style: bool,
}

pub struct S3ClientStorageConfig {
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    pub endpoint: String,
    pub path_style: bool,
}

/// Keeps the whole `source()` chain; the SDK's own message is only "dispatch failure" or
/// "service error".
fn to_io_error(e: impl std::error::Error) -> std::io::Error {
    std::io::Error::new(
        std::io::ErrorKind::Other,
        DisplayErrorContext(&e).to_string(),
    )
}

impl S3ClientStorage {
    pub fn new(config: S3ClientStorageConfig) -> Self {
        let creds = Credentials::new(config.access_key, config.secret_key, None, None, "custom");

        let shared_config = aws_config::SdkConfig::builder()
            .credentials_provider(s3::config::SharedCredentialsProvider::new(creds))
            .region(Region::new(config.region.clone()))
            .build();

        let s3_config = s3::config::Builder::from(&shared_config)
            .endpoint_url(&config.endpoint)
            .force_path_style(config.path_style)
            .build();

        let client = s3::Client::from_conf(s3_config);

        Self {
            client,
            region: config.region,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            path_style: config.path_style,
        }
    }

    async fn delete_all_blobs(&self, container: &str) -> Result<(), std::io::Error> {
        let blobs: Vec<String> = self.list_blobs(container).try_collect().await?;

        for blob in blobs {
            self.client
                .delete_object()
                .bucket(container)
                .key(&blob)
                .send()
                .await
                .map_err(to_io_error)?;
        }

        Ok(())
    }
}

#[async_trait]
impl ObjectStore for S3ClientStorage {
    async fn create_container(&self, container: &str) -> Result<(), std::io::Error> {
        let mut req = self.client.create_bucket().bucket(container);

        // us-east-1 rejects an explicit location constraint.
        if self.region != DEFAULT_REGION {
            req = req.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }

        req.send().await.map_err(to_io_error)?;

        Ok(())
    }

    async fn container_exists(&self, container: &str) -> Result<bool, std::io::Error> {
        match self.client.head_bucket().bucket(container).send().await {
            Ok(_) => Ok(true),
            Err(e) => {
                let e = e.into_service_error();
                if e.is_not_found() {
                    Ok(false)
                } else {
                    Err(to_io_error(e))
                }
            }
        }
    }

    async fn upload_blob(
        &self,
        container: &str,
        blob: &str,
        source: &Path,
    ) -> Result<u64, std::io::Error> {
        let size = tokio::fs::metadata(source).await?.len();
        let body = ByteStream::from_path(source).await.map_err(to_io_error)?;

        self.client
            .put_object()
            .bucket(container)
            .key(blob)
            .body(body)
            .send()
            .await
            .map_err(to_io_error)?;

        Ok(size)
    }

    fn list_blobs<'a>(&'a self, container: &'a str) -> BlobNames<'a> {
        // `None` ends the listing, `Some(None)` asks for the first page.
        let pages = stream::try_unfold(Some(None::<String>), move |state| async move {
            let Some(continuation_token) = state else {
                return Ok(None);
            };

            let mut req = self.client.list_objects_v2().bucket(container);
            if let Some(token) = continuation_token {
                req = req.continuation_token(token);
            }

            let resp = req.send().await.map_err(to_io_error)?;

            let keys: Vec<Result<String, std::io::Error>> = resp
                .contents()
                .iter()
                .filter_map(|obj| obj.key())
                .map(|key| Ok(key.to_string()))
                .collect();

            let next_state = resp
                .next_continuation_token()
                .map(|token| Some(token.to_string()));

            Ok::<_, std::io::Error>(Some((stream::iter(keys), next_state)))
        });

        pages.try_flatten().boxed()
    }

    async fn open_blob(&self, container: &str, blob: &str) -> Result<BlobReader, std::io::Error> {
        let resp = self
            .client
            .get_object()
            .bucket(container)
            .key(blob)
            .send()
            .await
            .map_err(to_io_error)?;

        Ok(Box::pin(resp.body.into_async_read()))
    }

    async fn delete_container(&self, container: &str) -> Result<(), std::io::Error> {
        self.delete_all_blobs(container).await?;

        self.client
            .delete_bucket()
            .bucket(container)
            .send()
            .await
            .map_err(to_io_error)?;

        Ok(())
    }

    fn blob_url(&self, container: &str, blob: &str) -> String {
        object_url(&self.endpoint, self.path_style, container, blob)
    }
}

fn object_url(endpoint: &str, path_style: bool, container: &str, blob: &str) -> String {
    if path_style {
        return format!("{}/{}/{}", endpoint, container, blob);
    }

    match endpoint.split_once("://") {
        Some((scheme, host)) => format!("{}://{}.{}/{}", scheme, container, host, blob),
        None => format!("{}.{}/{}", container, endpoint, blob),
    }
}

fn build_client(fields: &StorageFields) -> Result<Arc<dyn ObjectStore>, String> {
    let region = fields
        .get("region")
        .ok_or_else(|| "Missing required field: region".to_string())?
        .clone();
    let access_key = fields
        .get("access_key")
        .ok_or_else(|| "Missing required field: access_key".to_string())?
        .clone();
    let secret_key = fields
        .get("secret_key")
        .ok_or_else(|| "Missing required field: secret_key".to_string())?
        .clone();
    let endpoint = fields
        .get("endpoint")
        .cloned()
        .unwrap_or_else(|| default_s3_endpoint(fields));
    let path_style = match fields.get("path_style").map(|value| value.trim()) {
        None | Some("") => false,
        Some(value) => parse_flag(value)
            .ok_or_else(|| format!("Invalid value for path_style: '{}'", value))?,
    };

    Ok(Arc::new(S3ClientStorage::new(S3ClientStorageConfig {
        region,
        access_key,
        secret_key,
        endpoint,
        path_style,
    })))
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" => Some(true),
        "false" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

fn default_s3_endpoint(fields: &StorageFields) -> String {
    let region = fields
        .get("region")
        .cloned()
        .unwrap_or_else(|| DEFAULT_REGION.to_string());
    format!("https://s3.{}.amazonaws.com", region)
}

fn default_path_style(_fields: &StorageFields) -> String {
    "false".to_string()
}

const S3_FIELDS: &[StorageField] = &[
    StorageField {
        key: "region",
        arg_name: "region",
        value_name: "REGION",
        short: Some('r'),
        help: "The region for the S3 storage (only for S3 storage)",
        prompt: "Enter the S3 region",
        required: true,
        secret: false,
        default_value: None,
    },
    StorageField {
        key: "access_key",
        arg_name: "access-key",
        value_name: "ACCESS_KEY",
        short: Some('a'),
        help: "The access key for the S3 storage (only for S3 storage)",
        prompt: "Enter the S3 access key",
        required: true,
        secret: true,
        default_value: None,
    },
    StorageField {
        key: "secret_key",
        arg_name: "secret-key",
        value_name: "SECRET_KEY",
        short: Some('s'),
        help: "The secret key for the S3 storage (only for S3 storage)",
        prompt: "Enter the S3 secret key",
        required: true,
        secret: true,
        default_value: None,
    },
    StorageField {
        key: "endpoint",
        arg_name: "endpoint",
        value_name: "ENDPOINT",
        short: Some('e'),
        help: "The endpoint for the S3 storage (only for S3 storage)",
        prompt: "Enter the S3 endpoint",
        required: false,
        secret: false,
        default_value: Some(default_s3_endpoint),
    },
    StorageField {
        key: "path_style",
        arg_name: "path-style",
        value_name: "PATH_STYLE",
        short: None,
        help: "Use path-style bucket addressing, needed by most S3-compatible services (only for S3 storage)",
        prompt: "Use path-style addressing? (true/false)",
        required: false,
        secret: false,
        default_value: Some(default_path_style),
    },
];

pub const DEFINITION: StorageDefinition = StorageDefinition {
    id: "s3",
    label: "s3",
    fields: S3_FIELDS,
    build_client,
    prepare: None,
};

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> StorageFields {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn virtual_hosted_url_prefixes_bucket() {
        assert_eq!(
            object_url("https://s3.eu-west-1.amazonaws.com", false, "box", "a.txt"),
            "https://box.s3.eu-west-1.amazonaws.com/a.txt"
        );
    }

    #[test]
    fn path_style_url_appends_bucket() {
        assert_eq!(
            object_url("http://localhost:9000", true, "box", "a.txt"),
            "http://localhost:9000/box/a.txt"
        );
    }

    #[test]
    fn endpoint_defaults_to_region() {
        assert_eq!(
            default_s3_endpoint(&fields(&[("region", "sa-east-1")])),
            "https://s3.sa-east-1.amazonaws.com"
        );
        assert_eq!(
            default_s3_endpoint(&StorageFields::new()),
            "https://s3.us-east-1.amazonaws.com"
        );
    }

    #[test]
    fn build_client_requires_credentials() {
        let err = build_client(&fields(&[("region", "us-east-1"), ("access_key", "id")]))
            .err()
            .unwrap();

        assert_eq!(err, "Missing required field: secret_key");
    }

    #[test]
    fn build_client_rejects_bad_path_style() {
        let err = build_client(&fields(&[
            ("region", "us-east-1"),
            ("access_key", "id"),
            ("secret_key", "secret"),
            ("path_style", "maybe"),
        ]))
        .err()
        .unwrap();

        assert_eq!(err, "Invalid value for path_style: 'maybe'");
    }

    #[derive(Debug)]
    struct Outer(std::io::Error);

    impl std::fmt::Display for Outer {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "dispatch failure")
        }
    }

    impl std::error::Error for Outer {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn io_errors_carry_the_cause() {
        let err = to_io_error(Outer(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "connection refused",
        )));

        let message = err.to_string();
        assert!(message.starts_with("dispatch failure"));
        assert!(message.contains("connection refused"));
    }

    #[tokio::test]
    async fn unreachable_endpoint_reports_connection_cause() {
        let store = S3ClientStorage::new(S3ClientStorageConfig {
            region: DEFAULT_REGION.to_string(),
            access_key: "id".to_string(),
            secret_key: "secret".to_string(),
            endpoint: "http://127.0.0.1:1".to_string(),
            path_style: true,
        });

        let err = store.create_container("closed-port").await.unwrap_err();

        let message = err.to_string();
        assert!(message.starts_with("dispatch failure"));
        assert_ne!(message, "dispatch failure");
        assert!(message.to_lowercase().contains("connect"), "{message}");
    }

    #[test]
    fn flags_accept_common_spellings() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag("n"), Some(false));
        assert_eq!(parse_flag("sometimes"), None);
    }
}
