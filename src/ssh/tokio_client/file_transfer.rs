// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! SFTP file transfer operations.
//!
//! Some sshd_config does not enable sftp by default. A config line like
//! `Subsystem sftp internal-sftp` or `Subsystem sftp /usr/lib/openssh/sftp-server`
//! is needed on the remote machine.

use russh_sftp::{client::SftpSession, protocol::OpenFlags};
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use super::connection::Client;

type TransferFuture<'a> = Pin<Box<dyn Future<Output = Result<(), super::Error>> + Send + 'a>>;

impl Client {
    /// Start an sftp session on a new channel.
    pub async fn sftp(&self) -> Result<SftpSession, super::Error> {
        let channel = self.get_channel().await?;
        channel.request_subsystem(true, "sftp").await?;
        Ok(SftpSession::new(channel.into_stream()).await?)
    }

    /// Copy a local file or directory to `remote`.
    ///
    /// When `remote` is an existing remote directory the source keeps its
    /// name inside it; otherwise `remote` is the new path. Directories are
    /// copied recursively.
    pub async fn upload<T: AsRef<Path>>(&self, local: T, remote: &str) -> Result<(), super::Error> {
        let local = local.as_ref();
        let metadata = tokio::fs::metadata(local).await?;
        let sftp = self.sftp().await?;

        let target = if remote_is_dir(&sftp, remote).await {
            let name = local
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            join_remote(remote, &name)
        } else {
            remote.to_string()
        };

        tracing::debug!("Uploading {:?} to {}", local, target);
        if metadata.is_dir() {
            let _ = sftp.create_dir(&target).await; // Ignore error if already exists
            upload_dir_recursive(&sftp, local, &target).await?;
        } else {
            upload_file(&sftp, local, &target).await?;
        }

        Ok(())
    }

    /// Copy a remote file or directory to exactly `local`.
    pub async fn download<T: AsRef<Path>>(
        &self,
        remote: &str,
        local: T,
    ) -> Result<(), super::Error> {
        let local = local.as_ref();
        let sftp = self.sftp().await?;

        tracing::debug!("Downloading {} to {:?}", remote, local);
        if remote_is_dir(&sftp, remote).await {
            tokio::fs::create_dir_all(local).await?;
            download_dir_recursive(&sftp, remote, local).await?;
        } else {
            download_file(&sftp, remote, local).await?;
        }

        Ok(())
    }
}

async fn remote_is_dir(sftp: &SftpSession, path: &str) -> bool {
    match sftp.metadata(path).await {
        Ok(metadata) => metadata.file_type().is_dir(),
        Err(_) => false,
    }
}

fn join_remote(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{dir}{name}")
    } else {
        format!("{dir}/{name}")
    }
}

async fn upload_file(sftp: &SftpSession, local: &Path, remote: &str) -> Result<(), super::Error> {
    let file_contents = tokio::fs::read(local).await?;

    let mut remote_file = sftp
        .open_with_flags(
            remote,
            OpenFlags::CREATE | OpenFlags::TRUNCATE | OpenFlags::WRITE,
        )
        .await?;
    remote_file.write_all(&file_contents).await?;
    remote_file.flush().await?;
    remote_file.shutdown().await?;
    Ok(())
}

async fn download_file(sftp: &SftpSession, remote: &str, local: &Path) -> Result<(), super::Error> {
    let mut remote_file = sftp.open_with_flags(remote, OpenFlags::READ).await?;
    let mut contents = Vec::new();
    remote_file.read_to_end(&mut contents).await?;

    let mut local_file = tokio::fs::File::create(local).await?;
    local_file.write_all(&contents).await?;
    local_file.flush().await?;
    Ok(())
}

/// Helper function to recursively upload directory contents
fn upload_dir_recursive<'a>(
    sftp: &'a SftpSession,
    local_dir: &'a Path,
    remote_dir: &'a str,
) -> TransferFuture<'a> {
    Box::pin(async move {
        let mut entries = tokio::fs::read_dir(local_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let file_name = entry.file_name();
            let remote_path = join_remote(remote_dir, &file_name.to_string_lossy());

            let metadata = entry.metadata().await?;
            if metadata.is_dir() {
                let _ = sftp.create_dir(&remote_path).await; // Ignore error if already exists
                upload_dir_recursive(sftp, &path, &remote_path).await?;
            } else if metadata.is_file() {
                upload_file(sftp, &path, &remote_path).await?;
            }
        }
        Ok(())
    })
}

/// Helper function to recursively download directory contents
fn download_dir_recursive<'a>(
    sftp: &'a SftpSession,
    remote_dir: &'a str,
    local_dir: &'a Path,
) -> TransferFuture<'a> {
    Box::pin(async move {
        let entries = sftp.read_dir(remote_dir).await?;

        for entry in entries {
            let name = entry.file_name();
            if name == "." || name == ".." {
                continue;
            }

            let remote_path = join_remote(remote_dir, &name);
            let local_path = local_dir.join(&name);

            if entry.metadata().file_type().is_dir() {
                tokio::fs::create_dir_all(&local_path).await?;
                download_dir_recursive(sftp, &remote_path, &local_path).await?;
            } else if entry.metadata().file_type().is_file() {
                download_file(sftp, &remote_path, &local_path).await?;
            }
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_remote() {
        assert_eq!(join_remote("/opt", "app.tar"), "/opt/app.tar");
        assert_eq!(join_remote("/opt/", "app.tar"), "/opt/app.tar");
        assert_eq!(join_remote(".", "conf"), "./conf");
    }
}
