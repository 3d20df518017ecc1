use crate::{BlobStream, ClientConfig, FetchedManifest, RegistryError, RegistrySource};
use std::io::Read;
use std::time::Duration;
use tarpull_schema::{Digest, MANIFEST_ACCEPT};
use ureq::http::Response;
use ureq::Body;

/// Registry backend speaking the distribution `/v2/` API.
///
/// - `GET /v2/<name>/manifests/<reference>`: manifest or manifest list
/// - `GET /v2/<name>/blobs/<digest>`: raw blob
///
/// One keep-alive pool is shared by every request made through this value.
pub struct HttpRegistry {
    config: ClientConfig,
    base_url: String,
    agent: ureq::Agent,
}

impl HttpRegistry {
    pub fn new(config: ClientConfig) -> Self {
        let agent_config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .max_idle_connections(config.max_idle_connections)
            .max_idle_connections_per_host(config.max_idle_connections_per_host)
            .max_idle_age(Duration::from_secs(config.idle_timeout_secs))
            .timeout_global(config.timeout_secs.map(Duration::from_secs))
            .user_agent(config.user_agent.as_str())
            .build();
        let agent: ureq::Agent = agent_config.into();
        let base_url = config.base_url();
        Self {
            config,
            base_url,
            agent,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn manifest_url(&self, repository: &str, reference: &str) -> String {
        format!("{}/v2/{repository}/manifests/{reference}", self.base_url)
    }

    fn blob_url(&self, repository: &str, digest: &Digest) -> String {
        format!("{}/v2/{repository}/blobs/{digest}", self.base_url)
    }

    fn do_get(&self, url: &str, accept: Option<&str>) -> Result<Response<Body>, RegistryError> {
        let mut req = self.agent.get(url);
        if let Some(accept) = accept {
            req = req.header("Accept", accept);
        }
        if let Some(ref token) = self.config.auth_token {
            req = req.header("Authorization", &format!("Bearer {token}"));
        }
        let resp = req.call().map_err(|e| RegistryError::Transport {
            url: url.to_owned(),
            reason: e.to_string(),
        })?;

        let status = resp.status();
        if status == 404 {
            return Err(RegistryError::NotFound(url.to_owned()));
        }
        if !status.is_success() {
            return Err(RegistryError::Status {
                url: url.to_owned(),
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("unknown status").to_owned(),
            });
        }
        Ok(resp)
    }
}

fn header_str<'a>(resp: &'a Response<Body>, name: &str) -> Option<&'a str> {
    resp.headers().get(name).and_then(|v| v.to_str().ok())
}

impl RegistrySource for HttpRegistry {
    fn fetch_manifest(
        &self,
        repository: &str,
        reference: &str,
    ) -> Result<FetchedManifest, RegistryError> {
        let url = self.manifest_url(repository, reference);
        tracing::debug!("GET {url}");
        let resp = self.do_get(&url, Some(MANIFEST_ACCEPT))?;
        let media_type = header_str(&resp, "content-type").map(str::to_owned);

        let mut body = Vec::new();
        resp.into_body()
            .into_reader()
            .read_to_end(&mut body)
            .map_err(|e| RegistryError::Transport {
                url: url.clone(),
                reason: e.to_string(),
            })?;
        tracing::debug!(
            "manifest {repository}:{reference}: {} bytes, {}",
            body.len(),
            media_type.as_deref().unwrap_or("no content type")
        );
        Ok(FetchedManifest { media_type, body })
    }

    fn fetch_blob(&self, repository: &str, digest: &Digest) -> Result<BlobStream, RegistryError> {
        let url = self.blob_url(repository, digest);
        tracing::debug!("GET {url}");
        let resp = self.do_get(&url, None)?;
        let content_length =
            header_str(&resp, "content-length").and_then(|v| v.trim().parse::<u64>().ok());
        Ok(BlobStream {
            content_length,
            reader: Box::new(resp.into_body().into_reader()),
        })
    }
}
