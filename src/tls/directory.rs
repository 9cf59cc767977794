use super::{material::CertificateMaterial, resolver::CertificateAuthority};
use crate::BoxError;
use async_trait::async_trait;
use std::{
    io,
    path::{Path, PathBuf},
};

/// A [`CertificateAuthority`] over a directory laid out the way ACME clients such as certbot keep
/// their live certificates:
///
/// ```text
/// <dir>/<hostname>/privkey.pem
/// <dir>/<hostname>/cert.pem
/// <dir>/<hostname>/chain.pem   (optional)
/// ```
///
/// Issuance runs an external command, in which every `{hostname}` argument is replaced by the
/// hostname, e.g. `certbot certonly --standalone -d {hostname}`.
#[derive(Debug, Clone)]
pub struct DirectoryAuthority {
    dir: PathBuf,
    issue_command: Option<(String, Vec<String>)>,
}

impl DirectoryAuthority {
    /// An authority reading from `dir` that can not issue.
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        DirectoryAuthority {
            dir: dir.into(),
            issue_command: None,
        }
    }

    /// Sets the command that issues material.
    pub fn issue_command<S: Into<String>>(mut self, program: S, args: Vec<String>) -> Self {
        self.issue_command = Some((program.into(), args));
        self
    }

    fn host_dir(&self, hostname: &str) -> io::Result<PathBuf> {
        let valid = !hostname.is_empty()
            && hostname != "."
            && hostname != ".."
            && hostname.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
        if !valid {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, format!("not a hostname: '{hostname}'")));
        }
        Ok(self.dir.join(hostname))
    }
}

async fn read_optional(path: &Path) -> io::Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(pem) => Ok(Some(pem)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

#[async_trait]
impl CertificateAuthority for DirectoryAuthority {
    async fn lookup(&self, hostname: &str) -> Result<Option<CertificateMaterial>, BoxError> {
        let dir = self.host_dir(hostname)?;
        let Some(private_key) = read_optional(&dir.join("privkey.pem")).await? else {
            return Ok(None);
        };
        let Some(certificate) = read_optional(&dir.join("cert.pem")).await? else {
            return Ok(None);
        };
        let chain = read_optional(&dir.join("chain.pem")).await?.unwrap_or_default();
        Ok(Some(CertificateMaterial {
            private_key,
            certificate,
            chain,
        }))
    }

    async fn request_issuance(&self, hostname: &str) -> Result<(), BoxError> {
        self.host_dir(hostname)?;
        let Some((program, args)) = &self.issue_command else {
            return Err(format!("no issuance command configured, can not issue for '{hostname}'").into());
        };
        let args: Vec<String> = args.iter().map(|a| a.replace("{hostname}", hostname)).collect();
        let status = tokio::process::Command::new(program).args(&args).kill_on_drop(true).status().await?;
        if !status.success() {
            return Err(format!("'{program}' exited with {status}").into());
        }
        Ok(())
    }
}
