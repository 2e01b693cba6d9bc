//! Artifact bundle signing utility.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin bundle_tool -- keygen --out-seed <path> [--out-pub <path>] [--force]
//! cargo run --bin bundle_tool -- sign <bundle_dir> --seed-file <path> [--bundle-version <v>]
//! ```
//!
//! `sign` writes `manifest.json` (SHA-256 of every artifact file) and
//! `bundle.sig` (Ed25519 over the manifest bytes) into the bundle directory.
//!
//! # Security
//!
//! - Keys come from OS entropy (`OsRng`)
//! - Seed material is zeroized after use
//! - The seed file is created with 0600 permissions (Unix only)

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose;
use base64::Engine;
use clap::{Parser, Subcommand};
use ed25519_dalek::{Signature, Signer, SigningKey};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use glucoguard::adapters::bundle::{
    sha256_hex, BundleManifest, ARTIFACT_FILES, MANIFEST_FILE, MANIFEST_VERSION, SIGNATURE_FILE,
};

#[derive(Parser)]
#[command(name = "bundle_tool", about = "Generate signing keys and sign artifact bundles")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate an Ed25519 signing keypair
    Keygen {
        /// Where to write the base64 seed (secret)
        #[arg(long, value_name = "PATH")]
        out_seed: PathBuf,

        /// Where to write the base64 public key
        #[arg(long, value_name = "PATH")]
        out_pub: Option<PathBuf>,

        /// Overwrite existing files
        #[arg(long)]
        force: bool,
    },
    /// Write manifest.json and bundle.sig for a bundle directory
    Sign {
        bundle_dir: PathBuf,

        /// File holding the base64 signing seed
        #[arg(long, value_name = "PATH")]
        seed_file: PathBuf,

        /// Identifier recorded in the manifest (defaults to the parameters' version)
        #[arg(long, value_name = "V")]
        bundle_version: Option<String>,
    },
}

#[derive(Zeroize, ZeroizeOnDrop)]
struct Seed([u8; 32]);

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn refuse_overwrite(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("Refusing to overwrite existing file {path:?}. Use --force.");
    }
    Ok(())
}

fn write_key_file(path: &Path, contents: &[u8], mode: u32) -> Result<()> {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }

    let mut opts = fs::OpenOptions::new();
    opts.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        opts.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;

    let mut file = opts
        .open(path)
        .with_context(|| format!("Failed to open {path:?}"))?;
    file.write_all(contents)?;
    file.write_all(b"\n")?;
    Ok(())
}

fn keygen(out_seed: &Path, out_pub: Option<&Path>, force: bool) -> Result<()> {
    refuse_overwrite(out_seed, force)?;
    if let Some(pub_path) = out_pub {
        refuse_overwrite(pub_path, force)?;
    }

    let mut seed = Seed([0u8; 32]);
    OsRng.fill_bytes(&mut seed.0);

    let verifying_key = SigningKey::from_bytes(&seed.0).verifying_key();
    let seed_b64 = Zeroizing::new(general_purpose::STANDARD.encode(seed.0));
    let pub_b64 = general_purpose::STANDARD.encode(verifying_key.as_bytes());

    write_key_file(out_seed, seed_b64.as_bytes(), 0o600)?;
    // Public key is non-secret; allow read access.
    if let Some(pub_path) = out_pub {
        write_key_file(pub_path, pub_b64.as_bytes(), 0o644)?;
    }

    // Print only non-secret material.
    println!("Wrote signing seed (base64) to {out_seed:?}");
    if let Some(pub_path) = out_pub {
        println!("Wrote public key (base64) to {pub_path:?}");
    }
    println!("PUBKEY (base64)={pub_b64}");
    println!("PUBKEY (hex)={}", to_hex(verifying_key.as_bytes()));
    Ok(())
}

fn read_seed(path: &Path) -> Result<Seed> {
    let content = Zeroizing::new(
        fs::read_to_string(path).with_context(|| format!("Failed to read seed file {path:?}"))?,
    );
    let raw = Zeroizing::new(
        general_purpose::STANDARD
            .decode(content.trim())
            .context("Invalid base64 in signing seed")?,
    );
    if raw.len() != 32 {
        bail!(
            "Signing seed must be 32 bytes after base64 decode (got {})",
            raw.len()
        );
    }
    let mut seed = Seed([0u8; 32]);
    seed.0.copy_from_slice(&raw);
    Ok(seed)
}

/// Default bundle version: the `version` recorded in transform_params.json.
fn params_version(bundle_dir: &Path) -> Result<String> {
    let path = bundle_dir.join(ARTIFACT_FILES[0]);
    let bytes = fs::read(&path).with_context(|| format!("Failed to read {path:?}"))?;
    let value: serde_json::Value = serde_json::from_slice(&bytes)?;
    value
        .get("version")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
        .with_context(|| format!("{path:?} has no version; pass --bundle-version"))
}

fn sign(bundle_dir: &Path, seed_file: &Path, bundle_version: Option<String>) -> Result<()> {
    let seed = read_seed(seed_file)?;
    let signing_key = SigningKey::from_bytes(&seed.0);

    let mut files = BTreeMap::new();
    for rel in ARTIFACT_FILES {
        let path = bundle_dir.join(rel);
        let bytes = fs::read(&path).with_context(|| format!("Failed to read {path:?}"))?;
        files.insert(rel.to_string(), sha256_hex(&bytes));
    }

    let bundle_version = match bundle_version {
        Some(v) => v,
        None => params_version(bundle_dir)?,
    };

    let manifest = BundleManifest {
        version: MANIFEST_VERSION,
        bundle_version,
        created_at: Some(unix_now()),
        files,
    };
    let manifest_bytes =
        serde_json::to_vec_pretty(&manifest).context("Failed to serialize manifest.json")?;

    let manifest_path = bundle_dir.join(MANIFEST_FILE);
    fs::write(&manifest_path, &manifest_bytes)
        .with_context(|| format!("Failed to write {manifest_path:?}"))?;

    let sig: Signature = signing_key.sign(&manifest_bytes);
    let sig_path = bundle_dir.join(SIGNATURE_FILE);
    fs::write(&sig_path, sig.to_bytes()).with_context(|| format!("Failed to write {sig_path:?}"))?;

    println!("Signed manifest: {manifest_path:?}");
    println!("Wrote signature: {sig_path:?}");
    println!(
        "PUBKEY (base64)={}",
        general_purpose::STANDARD.encode(signing_key.verifying_key().as_bytes())
    );
    Ok(())
}

fn main() -> Result<()> {
    match Cli::parse().command {
        Command::Keygen {
            out_seed,
            out_pub,
            force,
        } => keygen(&out_seed, out_pub.as_deref(), force),
        Command::Sign {
            bundle_dir,
            seed_file,
            bundle_version,
        } => sign(&bundle_dir, &seed_file, bundle_version),
    }
}
