// src/filesystem/mounts.rs

//! Mounted filesystems of the inspected system
//!
//! Mount points are classified once, by filesystem type and device:
//!
//! - remote: network filesystems, or a device of the form `host:path`
//! - special: kernel and memory filesystems (`/proc`, `/sys`, tmpfs, ...)
//! - local: everything else
//!
//! Special mounts are local mounts without persistent data, so `local()`
//! and `remote()` always partition `all()`.

use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::system::System;

/// Location of the mount table on the inspected system
pub const MOUNT_TABLE: &str = "/proc/mounts";

const REMOTE_FILE_SYSTEMS: &[&str] = &[
    "autofs",
    "cifs",
    "smb3",
    "smbfs",
    "nfs",
    "nfs4",
    "ceph",
    "glusterfs",
    "fuse.sshfs",
];

const SPECIAL_FILE_SYSTEMS: &[&str] = &[
    "proc",
    "sysfs",
    "devtmpfs",
    "devpts",
    "tmpfs",
    "cgroup",
    "cgroup2",
    "securityfs",
    "debugfs",
    "fuse.gvfs-fuse-daemon",
];

/// Class of a mounted filesystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FsClass {
    Remote,
    Special,
    Local,
}

impl FsClass {
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote)
    }
}

/// Filesystem type tables used for classification
#[derive(Debug, Clone)]
pub struct FsClassifier {
    remote: Vec<String>,
    special: Vec<String>,
}

impl Default for FsClassifier {
    fn default() -> Self {
        Self {
            remote: REMOTE_FILE_SYSTEMS.iter().map(|s| s.to_string()).collect(),
            special: SPECIAL_FILE_SYSTEMS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl FsClassifier {
    /// Built-in tables extended with additional filesystem types
    pub fn with_extra<S: AsRef<str>>(extra_remote: &[S], extra_special: &[S]) -> Self {
        let mut classifier = Self::default();
        classifier
            .remote
            .extend(extra_remote.iter().map(|s| s.as_ref().to_string()));
        classifier
            .special
            .extend(extra_special.iter().map(|s| s.as_ref().to_string()));
        classifier
    }

    pub fn classify(&self, device: &str, fs_type: &str) -> FsClass {
        if self.remote.iter().any(|t| t == fs_type) || device.contains(':') {
            FsClass::Remote
        } else if self.special.iter().any(|t| t == fs_type) {
            FsClass::Special
        } else {
            FsClass::Local
        }
    }
}

/// One mount table record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MountPoint {
    pub path: String,
    pub device: String,
    pub fs_type: String,
    pub class: FsClass,
}

impl MountPoint {
    pub fn is_remote(&self) -> bool {
        self.class.is_remote()
    }
}

/// Mount points in mount table order
#[derive(Debug, Clone, Default, Serialize)]
pub struct MountPoints {
    mounts: Vec<MountPoint>,
}

impl MountPoints {
    /// Read and classify the mount table of `system`
    pub fn load(system: &dyn System, classifier: &FsClassifier) -> Result<Self> {
        let content = system.read_file(MOUNT_TABLE)?.ok_or_else(|| {
            Error::NotFoundError(format!("Mount table {} is not readable", MOUNT_TABLE))
        })?;
        let mounts = Self::parse(&content, classifier)?;
        debug!("Found {} mount points", mounts.mounts.len());
        Ok(mounts)
    }

    /// Parse `/proc/mounts` content
    ///
    /// A mount point listed more than once keeps its position of first
    /// appearance and the data of its last record.
    pub fn parse(content: &str, classifier: &FsClassifier) -> Result<Self> {
        let mut mounts: Vec<MountPoint> = Vec::new();

        for line in content.lines() {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.is_empty() {
                continue;
            }
            if fields.len() != 6 {
                return Err(Error::MalformedMountLine {
                    line: line.to_string(),
                    fields: fields.len(),
                });
            }

            let mount = MountPoint {
                path: decode_octal_escapes(fields[1]),
                device: decode_octal_escapes(fields[0]),
                fs_type: fields[2].to_string(),
                class: classifier.classify(fields[0], fields[2]),
            };
            match mounts.iter_mut().find(|m| m.path == mount.path) {
                Some(existing) => *existing = mount,
                None => mounts.push(mount),
            }
        }

        Ok(Self { mounts })
    }

    pub fn mounts(&self) -> &[MountPoint] {
        &self.mounts
    }

    pub fn get(&self, path: &str) -> Option<&MountPoint> {
        self.mounts.iter().find(|m| m.path == path)
    }

    pub fn all(&self) -> Vec<String> {
        self.paths(|_| true)
    }

    pub fn remote(&self) -> Vec<String> {
        self.paths(|m| m.class == FsClass::Remote)
    }

    /// Everything that is not remote, special filesystems included
    pub fn local(&self) -> Vec<String> {
        self.paths(|m| m.class != FsClass::Remote)
    }

    pub fn special(&self) -> Vec<String> {
        self.paths(|m| m.class == FsClass::Special)
    }

    /// Local filesystems holding persistent data
    pub fn persistent(&self) -> Vec<String> {
        self.paths(|m| m.class == FsClass::Local)
    }

    fn paths(&self, keep: impl Fn(&MountPoint) -> bool) -> Vec<String> {
        self.mounts
            .iter()
            .filter(|m| keep(m))
            .map(|m| m.path.clone())
            .collect()
    }
}

/// Decode `\NNN` octal escapes the kernel uses for whitespace in mount paths
fn decode_octal_escapes(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'\\'
            && i + 3 < bytes.len()
            && bytes[i + 1..=i + 3].iter().all(|b| (b'0'..=b'7').contains(b))
        {
            let value = bytes[i + 1..=i + 3]
                .iter()
                .fold(0u32, |acc, b| acc * 8 + u32::from(b - b'0'));
            if let Ok(byte) = u8::try_from(value) {
                decoded.push(byte);
                i += 4;
                continue;
            }
        }
        decoded.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&decoded).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROC_MOUNTS: &str = "\
rootfs / rootfs rw 0 0
/dev/sda1 / ext4 rw,relatime,data=ordered 0 0
proc /proc proc rw,nosuid,nodev,noexec,relatime 0 0
sysfs /sys sysfs rw,nosuid,nodev,noexec,relatime 0 0
devtmpfs /dev devtmpfs rw,size=1024k 0 0
tmpfs /dev/shm tmpfs rw,nosuid,nodev 0 0
/dev/sda2 /home xfs rw,relatime 0 0
server:/export /mnt/nfs nfs4 rw,relatime 0 0
//server/share /mnt/cifs cifs rw 0 0
storage:/data /mnt/unknown fuse.weird rw 0 0
/dev/sdb1 /data\\040disk btrfs rw 0 0
";

    fn mounts() -> MountPoints {
        MountPoints::parse(PROC_MOUNTS, &FsClassifier::default()).unwrap()
    }

    #[test]
    fn test_all() {
        assert_eq!(
            mounts().all(),
            vec![
                "/",
                "/proc",
                "/sys",
                "/dev",
                "/dev/shm",
                "/home",
                "/mnt/nfs",
                "/mnt/cifs",
                "/mnt/unknown",
                "/data disk",
            ]
        );
    }

    #[test]
    fn test_last_duplicate_wins() {
        let mounts = mounts();
        let root = mounts.get("/").unwrap();
        assert_eq!(root.fs_type, "ext4");
        assert_eq!(root.class, FsClass::Local);
    }

    #[test]
    fn test_remote() {
        assert_eq!(mounts().remote(), vec!["/mnt/nfs", "/mnt/cifs", "/mnt/unknown"]);
    }

    #[test]
    fn test_special_and_persistent() {
        let mounts = mounts();
        assert_eq!(mounts.special(), vec!["/proc", "/sys", "/dev", "/dev/shm"]);
        assert_eq!(mounts.persistent(), vec!["/", "/home", "/data disk"]);
    }

    #[test]
    fn test_local_and_remote_partition_all() {
        let mounts = mounts();
        let local = mounts.local();
        let remote = mounts.remote();

        assert!(local.iter().all(|m| !remote.contains(m)));
        let mut union: Vec<String> = local.into_iter().chain(remote).collect();
        let mut all = mounts.all();
        union.sort();
        all.sort();
        assert_eq!(union, all);
    }

    #[test]
    fn test_extra_types() {
        let classifier = FsClassifier::with_extra(&["fuse.weird2"], &["overlay"]);
        assert_eq!(classifier.classify("x", "fuse.weird2"), FsClass::Remote);
        assert_eq!(classifier.classify("overlay", "overlay"), FsClass::Special);
        assert_eq!(classifier.classify("/dev/sda1", "ext4"), FsClass::Local);
    }

    #[test]
    fn test_blank_lines_skipped() {
        let mounts =
            MountPoints::parse("\n/dev/sda1 / ext4 rw 0 0\n\n", &FsClassifier::default()).unwrap();
        assert_eq!(mounts.all(), vec!["/"]);
    }

    #[test]
    fn test_malformed_line() {
        let err = MountPoints::parse("/dev/sda1 / ext4 rw 0", &FsClassifier::default())
            .unwrap_err();
        assert!(matches!(err, Error::MalformedMountLine { fields: 5, .. }));
    }

    #[test]
    fn test_octal_escapes() {
        assert_eq!(decode_octal_escapes("/a\\040b"), "/a b");
        assert_eq!(decode_octal_escapes("/a\\011b"), "/a\tb");
        assert_eq!(decode_octal_escapes("/a\\b"), "/a\\b");
        assert_eq!(decode_octal_escapes("/a\\04"), "/a\\04");
    }
}
