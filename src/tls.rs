use crate::config::{ KeyPair, TlsConfig };
use crate::error::{ Error, Result };

use std::net::IpAddr;
use std::path::Path;
use isahc::{
    config::{ ClientCertificate, Configurable, PrivateKey, ResolveMap },
    http::header::HOST,
    HttpClientBuilder,
};
use url::Url;

/// Apply the TLS material to the client builder. Returns the URL requests
/// should be sent to, which differs from `url` when a server name override
/// is configured.
pub fn configure(
    mut builder: HttpClientBuilder,
    tls: &TlsConfig,
    url: &Url
) -> Result<(HttpClientBuilder, Url)> {
    if let Some(key_pair) = &tls.key_pair {
        builder = builder.ssl_client_certificate(load_client_certificate(key_pair)?);
    }

    match &tls.server_name {
        Some(server_name) if url.scheme() == "https" => {
            let server = ServerNameOverride::new(url, server_name)?;
            tracing::debug!(
                "Sending requests for {} to {} ({}), Host: {}",
                server.server_name,
                server.addr,
                server.url,
                server.host_header
            );
            let builder = builder
                .dns_resolve(server.resolve_map())
                .default_header(HOST, server.host_header.as_str());
            Ok((builder, server.url))
        }
        Some(server_name) => {
            tracing::debug!("Ignoring server name {} for plain HTTP URL {}", server_name, url);
            Ok((builder, url.clone()))
        }
        None => Ok((builder, url.clone())),
    }
}

/// Read the certificate and key up front so a bad path fails the run before
/// any request goes out.
pub fn load_client_certificate(key_pair: &KeyPair) -> Result<ClientCertificate> {
    let cert = read_pem(&key_pair.cert_path, "certificate", "CERTIFICATE")?;
    let key = read_pem(&key_pair.key_path, "private key", "PRIVATE KEY")?;
    Ok(ClientCertificate::pem(cert, PrivateKey::pem(key, None::<String>)))
}

fn read_pem(path: &Path, kind: &'static str, label: &str) -> Result<Vec<u8>> {
    let bytes = std::fs::read(path).map_err(|source| Error::TlsMaterial {
        kind,
        path: path.to_path_buf(),
        source,
    })?;

    let has_block = String::from_utf8_lossy(&bytes)
        .lines()
        .any(|line| line.starts_with("-----BEGIN ") && line.contains(label));
    if !has_block {
        return Err(Error::InvalidPem {
            kind,
            path: path.to_path_buf(),
        });
    }
    Ok(bytes)
}

/// Connect to the original host while presenting `server_name` for SNI and
/// certificate verification. The Host header keeps the original authority.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerNameOverride {
    pub url: Url,
    pub server_name: String,
    pub port: u16,
    pub addr: IpAddr,
    pub host_header: String,
}

impl ServerNameOverride {
    pub fn new(url: &Url, server_name: &str) -> Result<Self> {
        let host = url.host_str().unwrap_or_default().to_string();
        let port = url.port_or_known_default().unwrap_or(443);

        let addr = url
            .socket_addrs(|| None)
            .map_err(|e| Error::Resolve {
                host: host.clone(),
                reason: e.to_string(),
            })?
            .first()
            .map(|socket| socket.ip())
            .ok_or_else(|| Error::Resolve {
                host: host.clone(),
                reason: "no addresses returned".to_string(),
            })?;

        let mut rewritten = url.clone();
        rewritten.set_host(Some(server_name)).map_err(|source| Error::InvalidUrl {
            url: server_name.to_string(),
            source,
        })?;

        Ok(Self {
            url: rewritten,
            server_name: server_name.to_string(),
            port,
            addr,
            host_header: host_header(url),
        })
    }

    pub fn resolve_map(&self) -> ResolveMap {
        ResolveMap::new().add(&self.server_name, self.port, self.addr)
    }
}

/// Host header value for `url`: the host, plus the port when it is not the
/// scheme default.
pub fn host_header(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}
