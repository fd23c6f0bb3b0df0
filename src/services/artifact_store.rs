use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::core::artifact::{ArtifactError, ModelArtifact};
use crate::core::encoder::FeatureEncoder;
use crate::core::scorer::{DualBranchScorer, ScorerConfig};

const CURRENT_POINTER: &str = "CURRENT";
const MANIFEST_FILE: &str = "manifest.json";
const SEEKER_ENCODER_FILE: &str = "seeker_encoder.json";
const PROVIDER_ENCODER_FILE: &str = "provider_encoder.json";
const SCORER_FILE: &str = "scorer.safetensors";
const STAGING_PREFIX: &str = ".staging-";

/// Per-bundle description written next to the three model files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleManifest {
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub scorer: ScorerConfig,
    pub checksums: BundleChecksums,
}

/// blake3 digests of the bundle files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleChecksums {
    pub seeker_encoder: String,
    pub provider_encoder: String,
    pub scorer: String,
}

/// Encoder file payload, tagged with the bundle it belongs to
#[derive(Debug, Serialize, Deserialize)]
struct EncoderFile {
    bundle_version: String,
    encoder: FeatureEncoder,
}

/// Versioned on-disk store of model bundles
///
/// Each bundle lives in its own directory named by version. A bundle is
/// fully written to a staging directory and renamed into place before the
/// `CURRENT` pointer is swapped, so readers only ever see complete bundles.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Open (creating if needed) a store rooted at `root`
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, ArtifactError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persist a bundle and make it current; returns its directory
    pub fn save(&self, artifact: &ModelArtifact) -> Result<PathBuf, ArtifactError> {
        let version = artifact.version().to_string();
        let staging = tempfile::Builder::new().prefix(STAGING_PREFIX).tempdir_in(&self.root)?;

        let seeker_bytes = encoder_bytes(&version, artifact.seeker_encoder())?;
        let provider_bytes = encoder_bytes(&version, artifact.provider_encoder())?;
        write_synced(&staging.path().join(SEEKER_ENCODER_FILE), &seeker_bytes)?;
        write_synced(&staging.path().join(PROVIDER_ENCODER_FILE), &provider_bytes)?;

        let scorer_path = staging.path().join(SCORER_FILE);
        artifact.scorer().save(&scorer_path)?;
        let scorer_bytes = fs::read(&scorer_path)?;

        let manifest = BundleManifest {
            version: version.clone(),
            created_at: artifact.created_at(),
            scorer: artifact.scorer().config().clone(),
            checksums: BundleChecksums {
                seeker_encoder: checksum(&seeker_bytes),
                provider_encoder: checksum(&provider_bytes),
                scorer: checksum(&scorer_bytes),
            },
        };
        write_synced(&staging.path().join(MANIFEST_FILE), &serde_json::to_vec_pretty(&manifest)?)?;

        let bundle_dir = self.root.join(&version);
        if bundle_dir.exists() {
            return Err(ArtifactError::Incompatible(format!("bundle {} already exists", version)));
        }
        fs::rename(staging.path(), &bundle_dir)?;
        debug!("Bundle {} written to {}", version, bundle_dir.display());

        self.set_current(&version)?;
        info!("Model bundle {} is now current", version);
        Ok(bundle_dir)
    }

    /// Atomically point `CURRENT` at an existing bundle
    pub fn set_current(&self, version: &str) -> Result<(), ArtifactError> {
        if !self.root.join(version).join(MANIFEST_FILE).is_file() {
            return Err(ArtifactError::Incompatible(format!("bundle {} does not exist", version)));
        }
        let mut pointer = tempfile::NamedTempFile::new_in(&self.root)?;
        pointer.write_all(version.as_bytes())?;
        pointer.as_file().sync_all()?;
        pointer
            .persist(self.root.join(CURRENT_POINTER))
            .map_err(|e| ArtifactError::Io(e.error))?;
        Ok(())
    }

    /// Version named by the `CURRENT` pointer, if any
    pub fn current_version(&self) -> Result<Option<String>, ArtifactError> {
        match fs::read_to_string(self.root.join(CURRENT_POINTER)) {
            Ok(s) => Ok(Some(s.trim().to_string()).filter(|v| !v.is_empty())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// All complete bundles, oldest first
    pub fn list_versions(&self) -> Result<Vec<String>, ArtifactError> {
        let mut versions = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || !entry.file_type()?.is_dir() {
                continue;
            }
            if entry.path().join(MANIFEST_FILE).is_file() {
                versions.push(name);
            }
        }
        versions.sort();
        Ok(versions)
    }

    /// Load the bundle named by `CURRENT`
    pub fn load_current(&self) -> Result<ModelArtifact, ArtifactError> {
        let version = self
            .current_version()?
            .ok_or_else(|| ArtifactError::NoCurrentBundle(self.root.clone()))?;
        self.load_version(&version)
    }

    /// Load and verify one bundle as a unit
    pub fn load_version(&self, version: &str) -> Result<ModelArtifact, ArtifactError> {
        let dir = self.root.join(version);
        let manifest: BundleManifest = serde_json::from_slice(&fs::read(dir.join(MANIFEST_FILE))?)?;
        if manifest.version != version {
            return Err(ArtifactError::VersionSkew {
                file: MANIFEST_FILE.to_string(),
                expected: version.to_string(),
                found: manifest.version,
            });
        }

        let seeker_encoder = read_encoder(&dir, SEEKER_ENCODER_FILE, &manifest.checksums.seeker_encoder, version)?;
        let provider_encoder =
            read_encoder(&dir, PROVIDER_ENCODER_FILE, &manifest.checksums.provider_encoder, version)?;

        let scorer_path = dir.join(SCORER_FILE);
        verify(&fs::read(&scorer_path)?, &manifest.checksums.scorer, SCORER_FILE, version)?;
        let scorer = DualBranchScorer::load(manifest.scorer.clone(), &scorer_path)?;

        let artifact = ModelArtifact::from_parts(
            manifest.version,
            manifest.created_at,
            seeker_encoder,
            provider_encoder,
            scorer,
        )?;
        info!(
            "Loaded model bundle {} (founder dim {}, investor dim {})",
            artifact.version(),
            artifact.scorer().config().seeker_dim,
            artifact.scorer().config().provider_dim
        );
        Ok(artifact)
    }
}

fn checksum(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

fn verify(bytes: &[u8], expected: &str, file: &str, version: &str) -> Result<(), ArtifactError> {
    if checksum(bytes) != expected {
        return Err(ArtifactError::ChecksumMismatch {
            version: version.to_string(),
            file: file.to_string(),
        });
    }
    Ok(())
}

fn encoder_bytes(version: &str, encoder: &FeatureEncoder) -> Result<Vec<u8>, ArtifactError> {
    Ok(serde_json::to_vec_pretty(&EncoderFile {
        bundle_version: version.to_string(),
        encoder: encoder.clone(),
    })?)
}

fn read_encoder(dir: &Path, file: &str, expected: &str, version: &str) -> Result<FeatureEncoder, ArtifactError> {
    let bytes = fs::read(dir.join(file))?;
    verify(&bytes, expected, file, version)?;
    let payload: EncoderFile = serde_json::from_slice(&bytes)?;
    if payload.bundle_version != version {
        return Err(ArtifactError::VersionSkew {
            file: file.to_string(),
            expected: version.to_string(),
            found: payload.bundle_version,
        });
    }
    Ok(payload.encoder)
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<(), ArtifactError> {
    let mut file = fs::File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}
