//! Fake Workbench and FSL executables for end-to-end tests
//!
//! Each script appends its argument vector to a shared call log, then
//! copies its input through: conversion copies the CIFTI file, `cluster`
//! copies (or zeroes, or refuses) the raster, and `fslmeants` copies the
//! mask raster to the matrix path. A mask file holding one number per line
//! therefore comes out as that same timeseries.

use crate::structs::Toolchain;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[derive(Debug, Clone, Copy)]
pub enum ClusterBehavior {
    Copy,
    ZeroAll,
    Fail,
}

pub struct FakeTools {
    _dir: TempDir,
    pub tools: Toolchain,
    calls: PathBuf,
}

impl FakeTools {
    pub fn new() -> Self {
        Self::with_cluster(ClusterBehavior::Copy)
    }

    pub fn with_cluster(behavior: ClusterBehavior) -> Self {
        let dir = TempDir::new().expect("tempdir");
        let calls = dir.path().join("calls.log");
        let log = calls.display();

        let converter = write_script(
            dir.path(),
            "wb_command",
            &format!("echo \"wb_command $*\" >> '{log}'\ncp \"$3\" \"$4\"\n"),
        );

        let cluster_body = match behavior {
            ClusterBehavior::Copy => "cp \"$in\" \"$out\"\n",
            ClusterBehavior::ZeroAll => "awk '{ print 0 }' \"$in\" > \"$out\"\n",
            ClusterBehavior::Fail => "echo 'no clusters survive' >&2\nexit 1\n",
        };
        let cluster = write_script(
            dir.path(),
            "cluster",
            &format!(
                "echo \"cluster $*\" >> '{log}'\n\
                 for a in \"$@\"; do\n\
                 \x20 case \"$a\" in\n\
                 \x20   --in=*) in=\"${{a#--in=}}\" ;;\n\
                 \x20   --oindex=*) out=\"${{a#--oindex=}}\" ;;\n\
                 \x20 esac\n\
                 done\n\
                 {cluster_body}"
            ),
        );

        let meants = write_script(
            dir.path(),
            "fslmeants",
            &format!("echo \"fslmeants $*\" >> '{log}'\ncp \"$6\" \"$4\"\n"),
        );

        Self {
            _dir: dir,
            tools: Toolchain {
                converter,
                cluster,
                meants,
            },
            calls,
        }
    }

    /// Every recorded invocation, oldest first, with the program's base name
    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(&self.calls)
            .map(|s| s.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn calls_to(&self, program: &str) -> Vec<String> {
        let prefix = format!("{program} ");
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(&prefix))
            .collect()
    }
}

fn write_script(dir: &Path, name: &str, body: &str) -> String {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}")).expect("write script");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod");
    path.display().to_string()
}

/// Write a timeseries as one value per line
pub fn write_series(dir: &Path, name: &str, values: &[f64]) -> PathBuf {
    let path = dir.join(name);
    let content: String = values.iter().map(|v| format!("{v}\n")).collect();
    fs::write(&path, content).expect("write series");
    path
}
