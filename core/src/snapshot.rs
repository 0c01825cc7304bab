//! Diagnostic snapshot of captured fragments
//!
//! Written at the end of every drain and overwritten each run. The pipeline
//! never reads it back; `scatter reassemble <file>` does, for inspection.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};

use crate::error::SnapshotError;
use crate::types::FragmentCollection;

pub fn write_snapshot(path: &Path, fragments: &FragmentCollection) -> Result<(), SnapshotError> {
    let io_err = |source: std::io::Error| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let file = File::create(path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);

    let mut serializer = Serializer::with_formatter(&mut writer, PrettyFormatter::with_indent(b"    "));
    fragments
        .serialize(&mut serializer)
        .map_err(|source| SnapshotError::Json {
            path: path.to_path_buf(),
            source,
        })?;

    writer.write_all(b"\n").map_err(io_err)?;
    writer.flush().map_err(io_err)
}

pub fn read_snapshot(path: &Path) -> Result<FragmentCollection, SnapshotError> {
    let file = File::open(path).map_err(|source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_reader(BufReader::new(file)).map_err(|source| SnapshotError::Json {
        path: path.to_path_buf(),
        source,
    })
}
