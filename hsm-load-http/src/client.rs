//! HTTP client implementation

use crate::config::{ClientConfig, ClientTls};
use crate::errors::HttpError;
use crate::types::{
    ApiResponse, DecryptRequest, DecryptResponse, EncryptRequest, EncryptResponse, Endpoint,
    HealthResponse,
};
use reqwest::{Certificate, Client, Identity};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

/// Client for the encryption service
///
/// `Err` means the request never produced a response (timeout, refused
/// connection, TLS failure). Every response that did arrive is returned as
/// an [`ApiResponse`] regardless of status.
#[async_trait::async_trait]
pub trait HsmClient: Send + Sync {
    async fn encrypt(&self, request: &EncryptRequest) -> Result<ApiResponse<EncryptResponse>, HttpError>;

    async fn decrypt(&self, request: &DecryptRequest) -> Result<ApiResponse<DecryptResponse>, HttpError>;

    async fn health(&self) -> Result<ApiResponse<HealthResponse>, HttpError>;
}

/// reqwest client with a rustls mutual-TLS identity
#[derive(Debug, Clone)]
pub struct ReqwestHsmClient {
    client: Client,
    encrypt_url: Url,
    decrypt_url: Url,
    health_url: Url,
    timeout: Duration,
}

impl ReqwestHsmClient {
    /// Build a client; fails if the TLS material cannot be loaded
    pub fn new(config: &ClientConfig) -> Result<Self, HttpError> {
        debug!(
            "Creating HSM client for {} with {:?} timeout",
            config.base_url, config.timeout
        );

        let mut builder = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(config.pool_idle_timeout)
            .danger_accept_invalid_certs(config.tls.insecure_skip_verify)
            .use_rustls_tls();

        if let Some(identity) = load_identity(&config.tls)? {
            builder = builder.identity(identity);
        }
        if let Some(ca) = load_ca(&config.tls)? {
            builder = builder.add_root_certificate(ca);
        }
        if config.tls.insecure_skip_verify {
            warn!("Server certificate verification is disabled");
        }

        let client = builder
            .build()
            .map_err(|e| HttpError::ConfigError(format!("failed to build HTTP client: {}", e)))?;

        info!("HSM client ready for {}", config.base_url);
        Ok(Self {
            client,
            encrypt_url: config.endpoint_url(Endpoint::Encrypt.path())?,
            decrypt_url: config.endpoint_url(Endpoint::Decrypt.path())?,
            health_url: config.endpoint_url(Endpoint::Health.path())?,
            timeout: config.timeout,
        })
    }

    fn url(&self, endpoint: Endpoint) -> &Url {
        match endpoint {
            Endpoint::Encrypt => &self.encrypt_url,
            Endpoint::Decrypt => &self.decrypt_url,
            Endpoint::Health => &self.health_url,
        }
    }

    async fn send<B, T>(&self, endpoint: Endpoint, body: Option<&B>) -> Result<ApiResponse<T>, HttpError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let mut request = self
            .client
            .request(endpoint.method(), self.url(endpoint).clone());
        if let Some(body) = body {
            request = request.json(body);
        }

        let started = Instant::now();
        let response = request
            .send()
            .await
            .map_err(|e| HttpError::from_transport(e, self.timeout))?;
        let status = response.status().as_u16();
        let raw = response
            .text()
            .await
            .map_err(|e| HttpError::from_transport(e, self.timeout))?;
        let elapsed = started.elapsed();

        debug!("{} -> {} in {:?}", endpoint, status, elapsed);
        Ok(ApiResponse::parse(status, raw, elapsed))
    }
}

#[async_trait::async_trait]
impl HsmClient for ReqwestHsmClient {
    async fn encrypt(&self, request: &EncryptRequest) -> Result<ApiResponse<EncryptResponse>, HttpError> {
        self.send(Endpoint::Encrypt, Some(request)).await
    }

    async fn decrypt(&self, request: &DecryptRequest) -> Result<ApiResponse<DecryptResponse>, HttpError> {
        self.send(Endpoint::Decrypt, Some(request)).await
    }

    async fn health(&self) -> Result<ApiResponse<HealthResponse>, HttpError> {
        self.send::<(), _>(Endpoint::Health, None).await
    }
}

/// PEM identity from a certificate and key file
fn load_identity(tls: &ClientTls) -> Result<Option<Identity>, HttpError> {
    let (cert_path, key_path) = match (&tls.client_cert, &tls.client_key) {
        (Some(cert), Some(key)) => (cert, key),
        (None, None) => return Ok(None),
        _ => {
            return Err(HttpError::Tls(
                "client certificate and key must be configured together".to_string(),
            ))
        }
    };

    let mut pem = std::fs::read(cert_path)
        .map_err(|e| HttpError::Tls(format!("cannot read {}: {}", cert_path.display(), e)))?;
    let key = std::fs::read(key_path)
        .map_err(|e| HttpError::Tls(format!("cannot read {}: {}", key_path.display(), e)))?;
    if !pem.ends_with(b"\n") {
        pem.push(b'\n');
    }
    pem.extend_from_slice(&key);

    let identity = Identity::from_pem(&pem).map_err(|e| {
        HttpError::Tls(format!(
            "invalid client identity {} / {}: {}",
            cert_path.display(),
            key_path.display(),
            e
        ))
    })?;
    debug!("Loaded client identity from {}", cert_path.display());
    Ok(Some(identity))
}

fn load_ca(tls: &ClientTls) -> Result<Option<Certificate>, HttpError> {
    let Some(path) = &tls.ca_cert else {
        return Ok(None);
    };
    let pem = std::fs::read(path)
        .map_err(|e| HttpError::Tls(format!("cannot read {}: {}", path.display(), e)))?;
    Certificate::from_pem(&pem)
        .map(Some)
        .map_err(|e| HttpError::Tls(format!("invalid CA certificate {}: {}", path.display(), e)))
}
