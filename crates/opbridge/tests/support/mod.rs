//! Shared helpers: compile C fixtures into shared objects at test time.

#![allow(dead_code)]

use std::env::consts::{DLL_PREFIX, DLL_SUFFIX};
use std::path::{Path, PathBuf};
use std::process::Command;

pub type VectorAdd = unsafe extern "C" fn(*const i32, *const i32, *mut i32, usize);
pub type VectorDot = unsafe extern "C" fn(*const i32, *const i32, usize) -> i64;
pub type OpA = unsafe extern "C" fn(i32) -> i32;
pub type BumpCounter = unsafe extern "C" fn() -> i32;

fn fixture_source(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

pub fn lib_file_name(stem: &str) -> String {
    format!("{DLL_PREFIX}{stem}{DLL_SUFFIX}")
}

/// Compile `tests/fixtures/<source>` into `<out_dir>/lib<stem>.so`.
pub fn compile_fixture(out_dir: &Path, source: &str, stem: &str) -> PathBuf {
    let out = out_dir.join(lib_file_name(stem));
    let cc = std::env::var("CC").unwrap_or_else(|_| "cc".to_string());
    let mut cmd = Command::new(cc);
    cmd.args(["-shared", "-fPIC", "-O1", "-o"])
        .arg(&out)
        .arg(fixture_source(source));
    if cfg!(target_vendor = "apple") {
        cmd.args(["-undefined", "dynamic_lookup"]);
    }
    let output = cmd.output().expect("C compiler should be runnable");
    assert!(
        output.status.success(),
        "compiling {source} failed:\n{}",
        String::from_utf8_lossy(&output.stderr)
    );
    out
}

/// A temp dir holding the compiled `vector_ops` fixture.
pub struct VectorOps {
    pub dir: tempfile::TempDir,
    pub path: PathBuf,
}

pub fn vector_ops() -> VectorOps {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = compile_fixture(dir.path(), "vector_ops.c", "vector_ops");
    VectorOps { dir, path }
}
