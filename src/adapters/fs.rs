//! File-backed upload target.
//!
//! Implements [`UploadStore`] with `std::fs`.  On ESP-IDF the path lives on
//! a SPIFFS partition that [`mount_spiffs`] registers with the VFS; on the
//! host it is any writable path.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::app::ports::UploadStore;
use crate::error::{Error, Result};

pub struct FsUploadStore {
    path: PathBuf,
}

impl FsUploadStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        info!("fs: upload target {}", path.display());
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl UploadStore for FsUploadStore {
    fn append(&mut self, data: &[u8]) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|_| Error::Storage("open for append failed"))?;
        file.write_all(data)
            .map_err(|_| Error::Storage("append failed"))?;
        debug!("fs: appended {} bytes", data.len());
        Ok(())
    }

    fn remove(&mut self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(_) => Err(Error::Storage("remove failed")),
        }
    }
}

/// Register the default SPIFFS partition at `/spiffs`, formatting it on
/// first boot.
#[cfg(target_os = "espidf")]
pub fn mount_spiffs() -> Result<()> {
    use esp_idf_svc::sys::*;

    let conf = esp_vfs_spiffs_conf_t {
        base_path: c"/spiffs".as_ptr(),
        partition_label: core::ptr::null(),
        max_files: 4,
        format_if_mount_failed: true,
    };
    // SAFETY: `conf` and its C strings outlive the call; called once at boot.
    let ret = unsafe { esp_vfs_spiffs_register(&conf) };
    if ret != ESP_OK as i32 {
        log::error!("fs: SPIFFS mount failed (rc={})", ret);
        return Err(Error::Storage("SPIFFS mount failed"));
    }
    info!("fs: SPIFFS mounted at /spiffs");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn mount_spiffs() -> Result<()> {
    info!("fs(sim): using host filesystem");
    Ok(())
}
