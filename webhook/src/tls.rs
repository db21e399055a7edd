//! TLS material loading for the admission server. API servers require HTTPS
//! for webhook callbacks; certificate and key are mounted from a Secret, the
//! same layout the teacher used for its apiserver
//! (`TLS_KEY_MOUNT_PATH`/`CA_NAME`/`PUBLIC_KEY_NAME`/`PRIVATE_KEY_NAME`),
//! adapted from openssl to the workspace's pinned rustls 0.23.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ServerConfig;
use snafu::{OptionExt, ResultExt};

use crate::error::{self, Result};

pub fn load_server_config(cert_path: impl AsRef<Path>, key_path: impl AsRef<Path>) -> Result<ServerConfig> {
    let cert_path = cert_path.as_ref();
    let key_path = key_path.as_ref();

    let cert_file = File::open(cert_path).context(error::TlsConfigSnafu)?;
    let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut BufReader::new(cert_file))
        .collect::<std::result::Result<_, _>>()
        .context(error::TlsConfigSnafu)?;

    let key_file = File::open(key_path).context(error::TlsConfigSnafu)?;
    let key: PrivateKeyDer<'static> = rustls_pemfile::private_key(&mut BufReader::new(key_file))
        .context(error::TlsConfigSnafu)?
        .context(error::TlsMissingKeySnafu {
            path: key_path.display().to_string(),
        })?;

    ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .context(error::TlsMaterialSnafu)
}
