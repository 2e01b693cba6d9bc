//! Artifact bundle adapter: loads and verifies the frozen preprocessing
//! parameters, scaler and classifier as one unit.
//!
//! # Integrity
//!
//! - `manifest.json` binds every artifact file by SHA-256
//! - `bundle.sig`, when present, is an Ed25519 signature over the exact
//!   manifest bytes and is checked against the configured public key
//! - Signatures can be made mandatory through configuration
//!
//! # Layout
//!
//! ```text
//! <bundle>/
//!   manifest.json
//!   bundle.sig            (optional)
//!   transform_params.json
//!   scaler.json
//!   classifier.json
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::TransformParameters;
use crate::ports::{Classifier, Scaler};

use super::classifier::{ExportedClassifier, ModelClassifier};
use super::scaler::{ExportedScaler, StandardScaler};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const SIGNATURE_FILE: &str = "bundle.sig";
pub const PARAMS_FILE: &str = "transform_params.json";
pub const SCALER_FILE: &str = "scaler.json";
pub const CLASSIFIER_FILE: &str = "classifier.json";

/// Files a manifest must bind.
pub const ARTIFACT_FILES: [&str; 3] = [PARAMS_FILE, SCALER_FILE, CLASSIFIER_FILE];

/// Only manifest format understood by this loader.
pub const MANIFEST_VERSION: u32 = 1;

/// Allowed clock skew for `created_at` in the future.
const MAX_CLOCK_SKEW_SECS: i64 = 300;

/// Error type for artifact loading.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid {artifact} format: {message}")]
    Format {
        artifact: &'static str,
        message: String,
    },

    #[error("Manifest rejected: {0}")]
    Manifest(String),

    #[error("Signature rejected: {0}")]
    Signature(String),

    #[error("Feature order mismatch in {artifact}: expected {expected:?}, found {found:?}")]
    FeatureOrder {
        artifact: &'static str,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("Invalid {artifact} parameters: {message}")]
    Parameters {
        artifact: &'static str,
        message: String,
    },
}

/// Signed description of a bundle's contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleManifest {
    pub version: u32,
    /// Human-facing bundle identifier, reported by health checks.
    pub bundle_version: String,
    #[serde(default)]
    pub created_at: Option<i64>,
    /// File name → lowercase hex SHA-256.
    pub files: BTreeMap<String, String>,
}

/// How strictly a bundle is verified.
#[derive(Debug, Clone, Default)]
pub struct BundleOptions {
    /// Refuse bundles without `bundle.sig`.
    pub require_signature: bool,
    /// File holding the base64 Ed25519 verifying key.
    pub pubkey_file: Option<PathBuf>,
}

/// Which artifacts made it through loading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ArtifactStatus {
    pub params_loaded: bool,
    pub scaler_loaded: bool,
    pub model_loaded: bool,
}

/// Failed load together with the per-artifact status at the point of failure.
#[derive(Debug, thiserror::Error)]
#[error("{source}")]
pub struct BundleLoadError {
    pub status: ArtifactStatus,
    #[source]
    pub source: ArtifactError,
}

impl BundleLoadError {
    fn unverified(source: ArtifactError) -> Self {
        Self {
            status: ArtifactStatus::default(),
            source,
        }
    }
}

/// Verified, immutable artifacts shared for the process lifetime.
#[derive(Debug, Clone)]
pub struct ArtifactBundle {
    pub manifest: BundleManifest,
    pub params: Arc<TransformParameters>,
    pub scaler: Arc<StandardScaler>,
    pub classifier: Arc<ModelClassifier>,
    pub signed: bool,
}

impl ArtifactBundle {
    /// Verify and load every artifact in `dir`.
    ///
    /// All three artifacts are attempted even if one fails, so the returned
    /// status reports each of them.
    ///
    /// # Errors
    /// Returns `BundleLoadError` with the first failure encountered.
    pub fn load(dir: &Path, options: &BundleOptions) -> Result<Self, BundleLoadError> {
        tracing::info!("Loading artifact bundle from {:?}", dir);

        let verified = verify_bundle(dir, options).map_err(BundleLoadError::unverified)?;
        Self::from_verified(verified)
    }

    /// Build the bundle from artifact bytes already checked against the
    /// manifest. Nothing is read from disk again.
    fn from_verified(verified: VerifiedBundle) -> Result<Self, BundleLoadError> {
        let params = parse_params(verified.artifact(PARAMS_FILE));
        let scaler = parse_json::<ExportedScaler>(verified.artifact(SCALER_FILE), "scaler")
            .and_then(StandardScaler::from_export);
        let classifier =
            parse_json::<ExportedClassifier>(verified.artifact(CLASSIFIER_FILE), "classifier")
                .and_then(ModelClassifier::from_export);

        let status = ArtifactStatus {
            params_loaded: params.is_ok(),
            scaler_loaded: scaler.is_ok(),
            model_loaded: classifier.is_ok(),
        };

        let fail = |source| BundleLoadError { status, source };
        let params = params.map_err(fail)?;
        let scaler = scaler.map_err(fail)?;
        let classifier = classifier.map_err(fail)?;

        let VerifiedBundle {
            manifest, signed, ..
        } = verified;

        tracing::info!(
            "Loaded bundle {} (params={}, classifier={}, signed={})",
            manifest.bundle_version,
            params.version,
            classifier.describe(),
            signed
        );

        Ok(Self {
            manifest,
            params: Arc::new(params),
            scaler: Arc::new(scaler),
            classifier: Arc::new(classifier),
            signed,
        })
    }

    /// Scaler as a port handle.
    #[must_use]
    pub fn scaler_port(&self) -> Arc<dyn Scaler> {
        self.scaler.clone()
    }

    /// Classifier as a port handle.
    #[must_use]
    pub fn classifier_port(&self) -> Arc<dyn Classifier> {
        self.classifier.clone()
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, ArtifactError> {
    fs::read(path).map_err(|source| ArtifactError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Manifest plus the exact artifact bytes whose digests it binds.
struct VerifiedBundle {
    manifest: BundleManifest,
    signed: bool,
    artifacts: BTreeMap<&'static str, Vec<u8>>,
}

impl VerifiedBundle {
    fn artifact(&self, file: &str) -> &[u8] {
        self.artifacts.get(file).map_or(&[][..], Vec::as_slice)
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(
    bytes: &[u8],
    artifact: &'static str,
) -> Result<T, ArtifactError> {
    serde_json::from_slice(bytes).map_err(|e| ArtifactError::Format {
        artifact,
        message: e.to_string(),
    })
}

fn parse_params(bytes: &[u8]) -> Result<TransformParameters, ArtifactError> {
    let params: TransformParameters = parse_json(bytes, "transform parameters")?;
    params
        .validate()
        .map_err(|errors| ArtifactError::Parameters {
            artifact: "transform parameters",
            message: errors.join("; "),
        })?;
    Ok(params)
}

/// Lowercase hex SHA-256 of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

// Constant-time compare for ASCII strings (used for SHA-256 hex digests).
fn constant_time_eq_str(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes().iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Check manifest, hashes and (optional) signature.
///
/// Each artifact is read exactly once; the returned bytes are the ones that
/// matched the manifest.
fn verify_bundle(dir: &Path, options: &BundleOptions) -> Result<VerifiedBundle, ArtifactError> {
    let manifest_path = dir.join(MANIFEST_FILE);
    if !manifest_path.exists() {
        return Err(ArtifactError::Manifest(format!(
            "{MANIFEST_FILE} not found in {dir:?}"
        )));
    }
    let manifest_bytes = read_file(&manifest_path)?;

    let sig_path = dir.join(SIGNATURE_FILE);
    let signed = if sig_path.exists() {
        let key = load_verifying_key(options)?;
        verify_signature(&manifest_bytes, &read_file(&sig_path)?, &key)?;
        true
    } else if options.require_signature {
        return Err(ArtifactError::Signature(format!(
            "{SIGNATURE_FILE} required but not found in {dir:?}"
        )));
    } else {
        tracing::warn!("Loading unsigned bundle from {:?} (hashes still verified)", dir);
        false
    };

    let manifest: BundleManifest = serde_json::from_slice(&manifest_bytes)
        .map_err(|e| ArtifactError::Manifest(format!("invalid format: {e}")))?;

    if manifest.version != MANIFEST_VERSION {
        return Err(ArtifactError::Manifest(format!(
            "unsupported version {}",
            manifest.version
        )));
    }

    if let Some(created_at) = manifest.created_at {
        if created_at > unix_now() + MAX_CLOCK_SKEW_SECS {
            return Err(ArtifactError::Manifest("created_at is in the future".into()));
        }
    }

    let mut artifacts = BTreeMap::new();
    for rel in ARTIFACT_FILES {
        let expected = manifest
            .files
            .get(rel)
            .ok_or_else(|| ArtifactError::Manifest(format!("does not bind {rel}")))?;
        let bytes = read_file(&dir.join(rel))?;
        if !constant_time_eq_str(&sha256_hex(&bytes), &expected.to_ascii_lowercase()) {
            return Err(ArtifactError::Manifest(format!("hash mismatch for {rel}")));
        }
        artifacts.insert(rel, bytes);
    }

    Ok(VerifiedBundle {
        manifest,
        signed,
        artifacts,
    })
}

fn load_verifying_key(options: &BundleOptions) -> Result<VerifyingKey, ArtifactError> {
    let path = options.pubkey_file.as_ref().ok_or_else(|| {
        ArtifactError::Signature("bundle is signed but no public key file is configured".into())
    })?;
    let b64 = fs::read_to_string(path).map_err(|source| ArtifactError::Read {
        path: path.clone(),
        source,
    })?;
    verifying_key_from_b64(&b64)
}

/// Parse a base64-encoded 32-byte Ed25519 verifying key.
///
/// # Errors
/// Returns `ArtifactError::Signature` for bad encoding or length.
pub fn verifying_key_from_b64(b64: &str) -> Result<VerifyingKey, ArtifactError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(b64.trim())
        .map_err(|_| ArtifactError::Signature("invalid public key base64".into()))?;
    let bytes: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| ArtifactError::Signature("invalid public key length (expected 32 bytes)".into()))?;
    VerifyingKey::from_bytes(&bytes)
        .map_err(|_| ArtifactError::Signature("invalid verifying key".into()))
}

fn verify_signature(
    manifest_bytes: &[u8],
    sig_bytes: &[u8],
    key: &VerifyingKey,
) -> Result<(), ArtifactError> {
    let sig_bytes: [u8; 64] = sig_bytes
        .try_into()
        .map_err(|_| ArtifactError::Signature("invalid signature length (expected 64 bytes)".into()))?;
    key.verify(manifest_bytes, &Signature::from_bytes(&sig_bytes))
        .map_err(|_| ArtifactError::Signature("manifest signature does not verify".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};
    use rand::RngCore;
    use tempfile::tempdir;

    fn shipped_dir() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("models")
    }

    /// Copy the shipped artifacts into `dir` without manifest or signature.
    fn copy_artifacts(dir: &Path) {
        for rel in ARTIFACT_FILES {
            fs::copy(shipped_dir().join(rel), dir.join(rel)).expect("copy artifact");
        }
    }

    fn write_manifest(dir: &Path) -> Vec<u8> {
        let files = ARTIFACT_FILES
            .iter()
            .map(|rel| {
                let bytes = fs::read(dir.join(rel)).expect("read artifact");
                ((*rel).to_string(), sha256_hex(&bytes))
            })
            .collect();
        let manifest = BundleManifest {
            version: MANIFEST_VERSION,
            bundle_version: "test-bundle".into(),
            created_at: Some(unix_now()),
            files,
        };
        let bytes = serde_json::to_vec_pretty(&manifest).expect("serialize manifest");
        fs::write(dir.join(MANIFEST_FILE), &bytes).expect("write manifest");
        bytes
    }

    fn signing_key() -> SigningKey {
        let mut seed = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut seed);
        SigningKey::from_bytes(&seed)
    }

    fn write_pubkey(dir: &Path, key: &SigningKey) -> PathBuf {
        let path = dir.join("pub.b64");
        let b64 = base64::engine::general_purpose::STANDARD.encode(key.verifying_key().to_bytes());
        fs::write(&path, b64).expect("write pubkey");
        path
    }

    #[test]
    fn test_load_shipped_bundle() {
        let bundle = ArtifactBundle::load(&shipped_dir(), &BundleOptions::default())
            .expect("shipped bundle should load");
        assert_eq!(bundle.manifest.bundle_version, "pima-reference-1");
        assert_eq!(bundle.params.version, "pima-reference-1");
        assert!(!bundle.signed);
        assert_eq!(bundle.classifier_port().feature_names().len(), 13);
        assert_eq!(bundle.scaler_port().feature_names().len(), 8);
    }

    #[test]
    fn test_missing_manifest_is_rejected() {
        let temp = tempdir().expect("tempdir");
        copy_artifacts(temp.path());

        let err = ArtifactBundle::load(temp.path(), &BundleOptions::default())
            .expect_err("manifest is mandatory");
        assert!(matches!(err.source, ArtifactError::Manifest(_)));
        assert_eq!(err.status, ArtifactStatus::default());
    }

    #[test]
    fn test_tampered_artifact_fails_hash_check() {
        let temp = tempdir().expect("tempdir");
        copy_artifacts(temp.path());
        write_manifest(temp.path());

        let path = temp.path().join(PARAMS_FILE);
        let tampered = fs::read_to_string(&path)
            .expect("read params")
            .replace("125.0", "150.0");
        fs::write(&path, tampered).expect("write params");

        let err = ArtifactBundle::load(temp.path(), &BundleOptions::default())
            .expect_err("tampered params must not load");
        assert!(err.to_string().contains("hash mismatch for transform_params.json"));
    }

    #[test]
    fn test_loads_the_bytes_that_were_hashed() {
        let temp = tempdir().expect("tempdir");
        copy_artifacts(temp.path());
        write_manifest(temp.path());

        let verified =
            verify_bundle(temp.path(), &BundleOptions::default()).expect("bundle verifies");

        // Replaced on disk after verification; the verified copy must win.
        fs::write(temp.path().join(CLASSIFIER_FILE), b"{\"kind\": \"forest\"}").expect("write");
        fs::remove_file(temp.path().join(PARAMS_FILE)).expect("remove");

        let bundle = ArtifactBundle::from_verified(verified).expect("verified bytes load");
        assert_eq!(bundle.classifier.describe(), "logistic");
        assert_eq!(bundle.params.version, "pima-reference-1");
    }

    #[test]
    fn test_verified_artifacts_match_manifest_digests() {
        let verified =
            verify_bundle(&shipped_dir(), &BundleOptions::default()).expect("bundle verifies");
        for rel in ARTIFACT_FILES {
            assert_eq!(
                &sha256_hex(verified.artifact(rel)),
                &verified.manifest.files[rel]
            );
        }
    }

    #[test]
    fn test_broken_classifier_reports_partial_status() {
        let temp = tempdir().expect("tempdir");
        copy_artifacts(temp.path());
        fs::write(temp.path().join(CLASSIFIER_FILE), b"{\"kind\": \"forest\"}").expect("write");
        write_manifest(temp.path());

        let err = ArtifactBundle::load(temp.path(), &BundleOptions::default())
            .expect_err("unknown classifier kind");
        assert_eq!(
            err.status,
            ArtifactStatus {
                params_loaded: true,
                scaler_loaded: true,
                model_loaded: false,
            }
        );
        assert!(matches!(err.source, ArtifactError::Format { artifact: "classifier", .. }));
    }

    #[test]
    fn test_signed_bundle_round_trip() {
        let temp = tempdir().expect("tempdir");
        copy_artifacts(temp.path());
        let manifest_bytes = write_manifest(temp.path());

        let key = signing_key();
        let sig: Signature = key.sign(&manifest_bytes);
        fs::write(temp.path().join(SIGNATURE_FILE), sig.to_bytes()).expect("write sig");

        let options = BundleOptions {
            require_signature: true,
            pubkey_file: Some(write_pubkey(temp.path(), &key)),
        };
        let bundle = ArtifactBundle::load(temp.path(), &options).expect("signed bundle loads");
        assert!(bundle.signed);
    }

    #[test]
    fn test_signature_from_other_key_is_rejected() {
        let temp = tempdir().expect("tempdir");
        copy_artifacts(temp.path());
        let manifest_bytes = write_manifest(temp.path());

        let sig: Signature = signing_key().sign(&manifest_bytes);
        fs::write(temp.path().join(SIGNATURE_FILE), sig.to_bytes()).expect("write sig");

        let options = BundleOptions {
            require_signature: false,
            pubkey_file: Some(write_pubkey(temp.path(), &signing_key())),
        };
        let err = ArtifactBundle::load(temp.path(), &options).expect_err("wrong key");
        assert!(matches!(err.source, ArtifactError::Signature(_)));
    }

    #[test]
    fn test_required_signature_missing() {
        let options = BundleOptions {
            require_signature: true,
            pubkey_file: None,
        };
        let err = ArtifactBundle::load(&shipped_dir(), &options).expect_err("unsigned");
        assert!(matches!(err.source, ArtifactError::Signature(_)));
    }

    #[test]
    fn test_verifying_key_length_is_checked() {
        let short = base64::engine::general_purpose::STANDARD.encode([1u8; 16]);
        assert!(verifying_key_from_b64(&short).is_err());
        assert!(verifying_key_from_b64("not base64!").is_err());
    }
}
