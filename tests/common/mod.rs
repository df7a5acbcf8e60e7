// tests/common/mod.rs

//! Shared fixtures for integration tests: a recorded inspected system and
//! a matching filesystem tree to extract from.

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::symlink;

use sysdescribe::reconcile::VERIFY_ARGS;
use sysdescribe::system::{CommandOutput, ReplaySystem};
use tempfile::TempDir;

pub const PROC_MOUNTS: &str = "\
/dev/sda1 / ext4 rw,relatime 0 0
proc /proc proc rw,nosuid,nodev,noexec 0 0
sysfs /sys sysfs rw,nosuid,nodev,noexec 0 0
/dev/sda2 /home xfs rw,relatime 0 0
server:/export /mnt/nfs nfs4 rw,relatime 0 0
";

pub const RPM_QLAV: &str = "\
drwxr-xr-x    2 root    root                0 Jan 11  2024 /etc
-rw-r--r--    1 root    root              120 Jan 11  2024 /etc/hosts
drwxr-xr-x    2 root    root                0 Jan 11  2024 /usr/bin
-rwxr-xr-x    1 root    root            40960 Jan 11  2024 /usr/bin/zypper
drwxr-xr-x    2 root    root                0 Jan 11  2024 /home
drwxr-xr-x    2 root    root                0 Jan 11  2024 /mnt
dr-xr-xr-x    2 root    root                0 Jan 11  2024 /proc
dr-xr-xr-x    2 root    root                0 Jan 11  2024 /sys
";

pub const RPM_VA: &str = "\
..5......  c /etc/hosts
S.5....T.    /usr/bin/zypper
";

/// Encode `(type, relative path, link target)` records like `find -printf '%y\0%P\0%l\0'`
pub fn find_output(entries: &[(&str, &str, &str)]) -> Vec<u8> {
    let mut out = Vec::new();
    for (kind, path, link) in entries {
        for field in [kind, path, link] {
            out.extend_from_slice(field.as_bytes());
            out.push(0);
        }
    }
    out
}

fn find_root() -> Vec<u8> {
    find_output(&[
        ("d", "", ""),
        ("d", "etc", ""),
        ("f", "etc/hosts", ""),
        ("f", "etc/unmanaged.conf", ""),
        ("l", "etc/hosts.link", "hosts"),
        ("d", "usr", ""),
        ("d", "usr/bin", ""),
        ("f", "usr/bin/zypper", ""),
        ("d", "usr/local", ""),
        ("d", "usr/local/lib", ""),
        ("d", "opt", ""),
        ("d", "opt/app", ""),
        ("f", "opt/app/bin", ""),
        ("d", "home", ""),
        ("d", "proc", ""),
        ("d", "sys", ""),
        ("d", "mnt", ""),
        ("d", "mnt/nfs", ""),
        ("d", "tmp", ""),
        ("f", "tmp/scratch", ""),
    ])
}

fn find_home() -> Vec<u8> {
    find_output(&[
        ("d", "", ""),
        ("d", "alfred", ""),
        ("f", "alfred/.bashrc", ""),
    ])
}

/// A recorded system with rpm, stat and find available
pub fn inspected_system() -> ReplaySystem {
    ReplaySystem::new()
        .with_binary("rpm")
        .with_binary("stat")
        .with_binary("find")
        .with_file("/proc/mounts", PROC_MOUNTS)
        .with_command("rpm", &["-qlav"], CommandOutput::ok(RPM_QLAV))
        .with_command("rpm", VERIFY_ARGS, CommandOutput::failed(1, "").with_stdout(RPM_VA))
        .with_handler("rpm", |args| match args {
            ["-qf", "/etc/hosts"] => CommandOutput::ok("netcfg-11.6-1.1.noarch\n"),
            ["-qf", "/usr/bin/zypper"] => CommandOutput::ok("zypper-1.6.311-16.2.3.x86_64\n"),
            ["-qf", path] => CommandOutput::failed(1, "")
                .with_stdout(format!("file {} is not owned by any package\n", path)),
            _ => CommandOutput::failed(2, "unexpected rpm call"),
        })
        .with_handler("stat", |_| {
            CommandOutput::ok(
                "644:root:root:0:0:regular file:/etc/hosts\n\
                 755:root:root:0:0:regular file:/usr/bin/zypper\n",
            )
        })
        .with_handler("find", |args| match args.first() {
            Some(&"/") => CommandOutput::ok(find_root()),
            Some(&"/home") => CommandOutput::ok(find_home()),
            _ => CommandOutput::ok(Vec::new()),
        })
}

/// Filesystem content matching `inspected_system`
pub fn inspected_root() -> TempDir {
    let root = tempfile::tempdir().unwrap();
    let path = root.path();
    for dir in ["etc", "usr/bin", "usr/local/lib", "opt/app", "home/alfred", "tmp"] {
        fs::create_dir_all(path.join(dir)).unwrap();
    }
    fs::write(path.join("etc/hosts"), "127.0.0.1 localhost\n").unwrap();
    fs::write(path.join("etc/unmanaged.conf"), "key=value\n").unwrap();
    symlink("hosts", path.join("etc/hosts.link")).unwrap();
    fs::write(path.join("usr/local/lib/libx.so"), vec![0u8; 64]).unwrap();
    fs::write(path.join("opt/app/bin"), "#!/bin/sh\n").unwrap();
    fs::write(path.join("home/alfred/.bashrc"), "alias ll='ls -l'\n").unwrap();
    fs::write(path.join("tmp/scratch"), "x").unwrap();
    root
}
