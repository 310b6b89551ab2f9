//! Node identity: certificate load-or-generate and device ID derivation.
//!
//! Layout under the base directory:
//! ```text
//! cert.pem   (PEM certificate chain, leaf first, mode 0644)
//! key.pem    (PEM PKCS#8 private key, mode 0600)
//! ```
//!
//! The device ID is `SHA-256(leaf certificate DER)`; see [`DeviceId`].
//! An existing private key is never overwritten: generation only happens when
//! both files are absent, and each file is written to a temporary sibling
//! before being moved into place without clobbering.

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::Path;

use rcgen::{
    CertificateParams, DistinguishedName, DnType, ExtendedKeyUsagePurpose, KeyPair,
    KeyUsagePurpose, PKCS_ECDSA_P384_SHA384,
};
use time::{Duration, OffsetDateTime};
use tracing::{debug, info, warn};

use crate::device_id::DeviceId;
use crate::error::AppError;
use crate::locations::Locations;

/// Common name and DNS SAN of generated certificates.
pub const CERT_COMMON_NAME: &str = "nodegen";

const CERT_VALIDITY_DAYS: i64 = 20 * 365;

/// Loaded node identity.
#[derive(Clone)]
pub struct NodeIdentity {
    pub device_id: DeviceId,
    /// DER certificates, leaf first.
    chain: Vec<Vec<u8>>,
    private_key_der: Vec<u8>,
}

impl NodeIdentity {
    /// DER bytes of the leaf certificate, the input to the device ID.
    pub fn certificate_der(&self) -> &[u8] {
        &self.chain[0]
    }

    pub fn certificate_chain(&self) -> &[Vec<u8>] {
        &self.chain
    }

    pub fn private_key_der(&self) -> &[u8] {
        &self.private_key_der
    }
}

impl fmt::Debug for NodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeIdentity")
            .field("device_id", &self.device_id)
            .field("chain_len", &self.chain.len())
            .finish_non_exhaustive()
    }
}

/// Load the identity under `locations`, generating one if none exists.
pub fn setup(locations: &Locations) -> Result<NodeIdentity, AppError> {
    let cert_path = locations.cert_file();
    let key_path = locations.key_file();

    let identity = match load_certificate(&cert_path, &key_path)? {
        Some(identity) => {
            warn!(cert = %cert_path.display(), "key exists; will not overwrite");
            identity
        }
        None => {
            let identity = generate_certificate(&cert_path, &key_path)?;
            info!(cert = %cert_path.display(), key = %key_path.display(), "generated new certificate");
            identity
        }
    };

    info!(device_id = %identity.device_id, "identity ready");
    Ok(identity)
}

/// Load a certificate chain and its private key.
///
/// Returns `Ok(None)` only when **both** files are absent. One file without
/// the other, unreadable files, malformed PEM, or a key that does not match
/// the certificate are errors.
pub fn load_certificate(cert_path: &Path, key_path: &Path) -> Result<Option<NodeIdentity>, AppError> {
    let cert_exists = exists(cert_path)?;
    let key_exists = exists(key_path)?;

    match (cert_exists, key_exists) {
        (false, false) => return Ok(None),
        (true, false) => {
            return Err(AppError::Identity(format!(
                "certificate {} exists but private key {} is missing",
                cert_path.display(),
                key_path.display()
            )));
        }
        (false, true) => {
            return Err(AppError::Identity(format!(
                "private key {} exists but certificate {} is missing",
                key_path.display(),
                cert_path.display()
            )));
        }
        (true, true) => {}
    }

    let cert_bytes = fs::read(cert_path)
        .map_err(|e| AppError::Identity(format!("cannot read {}: {e}", cert_path.display())))?;
    let key_pem = fs::read_to_string(key_path)
        .map_err(|e| AppError::Identity(format!("cannot read {}: {e}", key_path.display())))?;

    let chain: Vec<Vec<u8>> = pem::parse_many(&cert_bytes)
        .map_err(|e| AppError::Identity(format!("malformed PEM in {}: {e}", cert_path.display())))?
        .into_iter()
        .filter(|p| p.tag() == "CERTIFICATE")
        .map(pem::Pem::into_contents)
        .collect();
    if chain.is_empty() {
        return Err(AppError::Identity(format!(
            "no certificate found in {}",
            cert_path.display()
        )));
    }

    let key_pair = KeyPair::from_pem(&key_pem)
        .map_err(|e| AppError::Identity(format!("malformed private key in {}: {e}", key_path.display())))?;

    let (_, leaf) = x509_parser::parse_x509_certificate(&chain[0])
        .map_err(|e| AppError::Identity(format!("malformed certificate in {}: {e}", cert_path.display())))?;
    if leaf.public_key().subject_public_key.data.as_ref() != key_pair.public_key_raw() {
        return Err(AppError::Identity(
            "keypair mismatch: private key does not match certificate".into(),
        ));
    }
    debug!(subject = %leaf.subject(), chain_len = chain.len(), "loaded certificate");

    let device_id = DeviceId::from_certificate(&chain[0]);
    Ok(Some(NodeIdentity {
        device_id,
        chain,
        private_key_der: key_pair.serialize_der(),
    }))
}

/// Generate a self-signed certificate and write it to the given paths.
///
/// Fails without touching anything if either path already exists.
pub fn generate_certificate(cert_path: &Path, key_path: &Path) -> Result<NodeIdentity, AppError> {
    let key_pair = KeyPair::generate_for(&PKCS_ECDSA_P384_SHA384)
        .map_err(|e| AppError::Identity(format!("key generation failed: {e}")))?;

    let mut params = CertificateParams::new(vec![CERT_COMMON_NAME.to_string()])
        .map_err(|e| AppError::Identity(format!("invalid cert params: {e}")))?;
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, CERT_COMMON_NAME);
    params.distinguished_name = dn;
    let now = OffsetDateTime::now_utc();
    params.not_before = now - Duration::days(1);
    params.not_after = now + Duration::days(CERT_VALIDITY_DAYS);
    params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyEncipherment,
    ];
    params.extended_key_usages = vec![
        ExtendedKeyUsagePurpose::ServerAuth,
        ExtendedKeyUsagePurpose::ClientAuth,
    ];

    let cert = params
        .self_signed(&key_pair)
        .map_err(|e| AppError::Identity(format!("certificate signing failed: {e}")))?;

    write_new(cert_path, cert.pem().as_bytes(), 0o644)?;
    if let Err(e) = write_new(key_path, key_pair.serialize_pem().as_bytes(), 0o600) {
        // Leave no lone certificate behind; the next run would refuse it.
        let _ = fs::remove_file(cert_path);
        return Err(e);
    }

    let der = cert.der().to_vec();
    Ok(NodeIdentity {
        device_id: DeviceId::from_certificate(&der),
        chain: vec![der],
        private_key_der: key_pair.serialize_der(),
    })
}

// ── internals ────────────────────────────────────────────────────────────────

fn exists(path: &Path) -> Result<bool, AppError> {
    path.try_exists()
        .map_err(|e| AppError::Identity(format!("cannot stat {}: {e}", path.display())))
}

/// Write `contents` to a new file at `path` with the given mode.
///
/// The data goes to a temporary file in the same directory first, so a failed
/// write never leaves a truncated `path` behind. Fails if `path` exists.
fn write_new(path: &Path, contents: &[u8], mode: u32) -> Result<(), AppError> {
    let name = path.display();
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| AppError::Identity(format!("cannot create {name}: {e}")))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(fs::Permissions::from_mode(mode))
            .map_err(|e| AppError::Identity(format!("cannot set permissions on {name}: {e}")))?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    tmp.write_all(contents)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| AppError::Identity(format!("cannot write {name}: {e}")))?;
    tmp.persist_noclobber(path)
        .map_err(|e| AppError::Identity(format!("cannot create {name}: {}", e.error)))?;
    Ok(())
}

// ── tests ─────────────────────────────────────────────────────────────────────
