//! Host key pair generation.

use crate::constants;
use crate::core::paths::ProvisionPaths;
use crate::core::snapshot::HostSnapshot;
use crate::util::fs as host_fs;
use crate::util::host::{self, Host, HostCommand};
use crate::util::privilege::Privileged;
use anyhow::{bail, Context, Result};
use base64::{
    engine::general_purpose::{STANDARD, STANDARD_NO_PAD},
    Engine,
};
use log::{info, warn};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct KeyMaterial {
    pub private_key: PathBuf,
    pub public_key: PathBuf,
    /// The `.pub` line, without trailing newline.
    pub public_line: String,
    pub fingerprint: Option<String>,
    pub generated: bool,
}

/// Generate `<root home>/.ssh/<hostname>` unless a key is already there.
///
/// An existing key is never overwritten; the operator may already hold a copy.
pub fn ensure_key_pair(
    _cap: Privileged,
    host: &dyn Host,
    paths: &ProvisionPaths,
    snapshot: &HostSnapshot,
) -> Result<KeyMaterial> {
    host_fs::ensure_dir(&paths.root_ssh_dir, constants::SSH_DIR_MODE)?;
    let private_key = paths.key_path(&snapshot.hostname);
    let mut public_os = private_key.as_os_str().to_owned();
    public_os.push(".pub");
    let public_key = PathBuf::from(public_os);

    let generated = if private_key.exists() || public_key.exists() {
        warn!(
            "key already exists at {}; not regenerating",
            private_key.display()
        );
        false
    } else {
        info!("generating ED25519 key pair at {}", private_key.display());
        let cmd = HostCommand::new("ssh-keygen")
            .args(["-q", "-t", "ed25519", "-N", "", "-C"])
            .arg(snapshot.key_comment())
            .arg("-f")
            .arg(private_key.to_string_lossy());
        host::run(host, &cmd).context("generate key pair")?;
        true
    };

    if private_key.exists() {
        host_fs::set_permissions(&private_key, constants::SSH_FILE_MODE)?;
    }

    if !public_key.exists() {
        if !private_key.exists() {
            bail!("no key material at {}", private_key.display());
        }
        warn!("public half missing; deriving it from {}", private_key.display());
        let out = host::run(
            host,
            &HostCommand::new("ssh-keygen")
                .arg("-y")
                .arg("-f")
                .arg(private_key.to_string_lossy()),
        )?;
        host_fs::write_atomic(&public_key, &out.stdout, constants::PUBLIC_KEY_MODE)?;
    }

    let public_line = fs::read_to_string(&public_key)
        .with_context(|| format!("read {}", public_key.display()))?
        .trim()
        .to_string();
    if public_line.is_empty() {
        bail!("public key {} is empty", public_key.display());
    }

    let fingerprint = match fingerprint(&public_line) {
        Ok(fp) => Some(fp),
        Err(e) => {
            warn!("cannot fingerprint {}: {}", public_key.display(), e);
            None
        }
    };

    Ok(KeyMaterial {
        private_key,
        public_key,
        public_line,
        fingerprint,
        generated,
    })
}

/// OpenSSH-style `SHA256:` fingerprint of a public key line.
pub fn fingerprint(public_line: &str) -> Result<String> {
    let Some(blob) = public_line.split_whitespace().nth(1) else {
        bail!("malformed public key line");
    };
    let raw = STANDARD.decode(blob).context("decode key blob")?;
    let digest = Sha256::digest(&raw);
    Ok(format!("SHA256:{}", STANDARD_NO_PAD.encode(digest)))
}
