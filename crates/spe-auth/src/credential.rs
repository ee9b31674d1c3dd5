//! Certificate credentials and the signing capability behind them
//!
//! A [`CertificateCredential`] pairs the DER bytes of an X.509 certificate with
//! an optional [`CredentialSigner`]. The private key itself is never exposed:
//! callers only get "sign these bytes with RS256". Key stores, HSMs, and test
//! doubles plug in by implementing [`CredentialSigner`] and
//! [`CertificateProvider`].

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rsa::RsaPrivateKey;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer};
use sha1::{Digest, Sha1};
use sha2::Sha256;
use tracing::debug;

use crate::{AuthError, Result};

const CERTIFICATE_TAG: &str = "CERTIFICATE";
const PKCS8_KEY_TAG: &str = "PRIVATE KEY";
const PKCS1_KEY_TAG: &str = "RSA PRIVATE KEY";

/// SHA-1 hash of a certificate's DER encoding
///
/// Certificate stores print this as hex (`67:49:EC:...` or `6749EC...`); the
/// JWT `x5t` header carries it base64url-encoded.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Thumbprint([u8; 20]);

impl Thumbprint {
    /// Length of a SHA-1 thumbprint in bytes
    pub const LEN: usize = 20;

    /// Compute the thumbprint of DER-encoded certificate bytes
    pub fn of_der(certificate_der: &[u8]) -> Self {
        let digest = Sha1::digest(certificate_der);
        let mut bytes = [0u8; Self::LEN];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    /// Wrap raw thumbprint bytes
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Parse a hex thumbprint, ignoring case, `:` separators and whitespace
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidInput`] unless the input is exactly 40 hex digits.
    pub fn from_hex(input: &str) -> Result<Self> {
        let digits: String = input
            .chars()
            .filter(|c| !c.is_whitespace() && *c != ':')
            .collect();

        let decoded = hex::decode(&digits).map_err(|e| AuthError::InvalidInput {
            reason: format!("thumbprint is not hex: {e}"),
        })?;

        let bytes: [u8; 20] = decoded.try_into().map_err(|v: Vec<u8>| AuthError::InvalidInput {
            reason: format!("thumbprint must be {} bytes, got {}", Self::LEN, v.len()),
        })?;

        Ok(Self(bytes))
    }

    /// Raw thumbprint bytes
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Uppercase hex, the form certificate stores display
    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.0)
    }

    /// base64url without padding, the JWT `x5t` form
    pub fn to_base64url(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0)
    }
}

impl fmt::Display for Thumbprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Thumbprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Thumbprint({})", self.to_hex())
    }
}

impl FromStr for Thumbprint {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

/// Signing capability backed by a certificate's private key
///
/// Implementations must be safe to call concurrently; signing is treated as
/// a read-only operation on the key.
pub trait CredentialSigner: Send + Sync + fmt::Debug {
    /// RSASSA-PKCS1-v1_5 signature over SHA-256 of `message`
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Signing`] when the key provider fails.
    fn sign_rs256(&self, message: &[u8]) -> Result<Vec<u8>>;
}

/// Software RSA signer
pub struct RsaCredentialSigner {
    key: SigningKey<Sha256>,
}

impl RsaCredentialSigner {
    /// Create a signer from an RSA private key
    pub fn new(private_key: RsaPrivateKey) -> Self {
        Self {
            key: SigningKey::<Sha256>::new(private_key),
        }
    }

    /// Parse a PEM private key (PKCS#8 `PRIVATE KEY` or PKCS#1 `RSA PRIVATE KEY`)
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Certificate`] when no RSA key block can be decoded.
    pub fn from_pem(key_pem: &str) -> Result<Self> {
        let blocks = pem::parse_many(key_pem).map_err(|e| AuthError::Certificate {
            reason: format!("invalid key PEM: {e}"),
        })?;

        for block in &blocks {
            let parsed = match block.tag() {
                PKCS8_KEY_TAG => RsaPrivateKey::from_pkcs8_der(block.contents())
                    .map_err(|e| e.to_string()),
                PKCS1_KEY_TAG => RsaPrivateKey::from_pkcs1_der(block.contents())
                    .map_err(|e| e.to_string()),
                _ => continue,
            };

            return parsed.map(Self::new).map_err(|reason| AuthError::Certificate {
                reason: format!("invalid RSA private key: {reason}"),
            });
        }

        Err(AuthError::Certificate {
            reason: "no RSA private key block found in PEM input".to_string(),
        })
    }
}

impl CredentialSigner for RsaCredentialSigner {
    fn sign_rs256(&self, message: &[u8]) -> Result<Vec<u8>> {
        let signature = self.key.try_sign(message).map_err(|e| AuthError::Signing {
            reason: e.to_string(),
        })?;
        Ok(signature.to_vec())
    }
}

// Key material stays out of logs
impl fmt::Debug for RsaCredentialSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaCredentialSigner")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// X.509 certificate plus an optional signing capability
#[derive(Clone)]
pub struct CertificateCredential {
    certificate_der: Arc<[u8]>,
    thumbprint: Thumbprint,
    signer: Option<Arc<dyn CredentialSigner>>,
}

impl CertificateCredential {
    /// Create a credential from DER certificate bytes and an optional signer
    pub fn new(certificate_der: impl Into<Vec<u8>>, signer: Option<Arc<dyn CredentialSigner>>) -> Self {
        let der: Vec<u8> = certificate_der.into();
        let thumbprint = Thumbprint::of_der(&der);
        Self {
            certificate_der: der.into(),
            thumbprint,
            signer,
        }
    }

    /// Create a credential holding only the public certificate
    pub fn public_only(certificate_der: impl Into<Vec<u8>>) -> Self {
        Self::new(certificate_der, None)
    }

    /// Parse PEM certificate text and an optional PEM private key
    ///
    /// When `key_pem` is `None` the certificate input is also searched for a
    /// key block, so a combined `cert + key` PEM works on its own. Without any
    /// key block the credential is public-only.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Certificate`] when no certificate block is present
    /// or the key cannot be decoded.
    pub fn from_pem(certificate_pem: &str, key_pem: Option<&str>) -> Result<Self> {
        let blocks = pem::parse_many(certificate_pem).map_err(|e| AuthError::Certificate {
            reason: format!("invalid certificate PEM: {e}"),
        })?;

        let certificate = blocks
            .iter()
            .find(|b| b.tag() == CERTIFICATE_TAG)
            .ok_or_else(|| AuthError::Certificate {
                reason: "no CERTIFICATE block found in PEM input".to_string(),
            })?;

        let signer = match key_pem {
            Some(key) => Some(RsaCredentialSigner::from_pem(key)?),
            None if blocks
                .iter()
                .any(|b| b.tag() == PKCS8_KEY_TAG || b.tag() == PKCS1_KEY_TAG) =>
            {
                Some(RsaCredentialSigner::from_pem(certificate_pem)?)
            }
            None => None,
        };

        let credential = Self::new(
            certificate.contents().to_vec(),
            signer.map(|s| Arc::new(s) as Arc<dyn CredentialSigner>),
        );

        debug!(
            thumbprint = %credential.thumbprint,
            has_private_key = credential.has_private_key(),
            "Loaded certificate credential"
        );

        Ok(credential)
    }

    /// Read PEM files from disk, see [`CertificateCredential::from_pem`]
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Certificate`] when a file cannot be read or parsed.
    pub fn from_pem_files(
        certificate_path: impl AsRef<Path>,
        key_path: Option<impl AsRef<Path>>,
    ) -> Result<Self> {
        let certificate_pem = read_pem_file(certificate_path.as_ref())?;
        let key_pem = key_path.map(|p| read_pem_file(p.as_ref())).transpose()?;
        Self::from_pem(&certificate_pem, key_pem.as_deref())
    }

    /// DER encoding of the certificate
    pub fn certificate_der(&self) -> &[u8] {
        &self.certificate_der
    }

    /// SHA-1 thumbprint of the certificate
    pub fn thumbprint(&self) -> Thumbprint {
        self.thumbprint
    }

    /// Whether a signing capability is attached
    pub fn has_private_key(&self) -> bool {
        self.signer.is_some()
    }

    /// Sign with the attached key
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingPrivateKey`] when no key is attached and
    /// [`AuthError::Signing`] when the signer fails.
    pub fn sign_rs256(&self, message: &[u8]) -> Result<Vec<u8>> {
        match &self.signer {
            Some(signer) => signer.sign_rs256(message),
            None => Err(AuthError::MissingPrivateKey {
                thumbprint: self.thumbprint.to_hex(),
            }),
        }
    }
}

impl fmt::Debug for CertificateCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateCredential")
            .field("thumbprint", &self.thumbprint)
            .field("has_private_key", &self.has_private_key())
            .finish()
    }
}

fn read_pem_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| AuthError::Certificate {
        reason: format!("cannot read {}: {e}", path.display()),
    })
}

/// Lookup of certificate credentials by thumbprint
///
/// Replaces the ambient platform certificate store so the core can run
/// against any key store, or an in-memory double in tests.
pub trait CertificateProvider: Send + Sync {
    /// Find the credential whose certificate has this thumbprint
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::CertificateNotFound`] for unknown thumbprints.
    fn lookup(&self, thumbprint: &Thumbprint) -> Result<Arc<CertificateCredential>>;
}

/// Certificate provider backed by a map
#[derive(Debug, Default, Clone)]
pub struct InMemoryCertificateProvider {
    credentials: HashMap<Thumbprint, Arc<CertificateCredential>>,
}

impl InMemoryCertificateProvider {
    /// Create an empty provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a credential, replacing any with the same thumbprint
    pub fn insert(&mut self, credential: CertificateCredential) -> Thumbprint {
        let thumbprint = credential.thumbprint();
        self.credentials.insert(thumbprint, Arc::new(credential));
        thumbprint
    }

    /// Builder-style [`InMemoryCertificateProvider::insert`]
    pub fn with(mut self, credential: CertificateCredential) -> Self {
        self.insert(credential);
        self
    }

    /// Number of stored credentials
    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    /// Whether the provider holds no credentials
    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }
}

impl CertificateProvider for InMemoryCertificateProvider {
    fn lookup(&self, thumbprint: &Thumbprint) -> Result<Arc<CertificateCredential>> {
        self.credentials
            .get(thumbprint)
            .cloned()
            .ok_or_else(|| AuthError::CertificateNotFound {
                thumbprint: thumbprint.to_hex(),
            })
    }
}
