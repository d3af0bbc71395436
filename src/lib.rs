pub mod coverage;
pub mod error;
pub mod events;
pub mod generate;
pub mod mutant;
pub mod mutators;
pub mod output;
pub mod runner;
pub mod sandbox;
pub mod tree;

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// One file marked for mutation. Read once; frozen thereafter.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub content: String,
}

impl SourceFile {
    pub fn read(path: &Path) -> Result<SourceFile> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Ok(SourceFile { path: path.to_path_buf(), content })
    }
}

/// Read every file to mutate, in input order, announcing each to the
/// reporting pipeline. The completion event fires once reading finishes,
/// whatever the file count.
pub fn read_source_files(paths: &[PathBuf], reporter: &dyn events::Reporter) -> Result<Vec<SourceFile>> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let file = SourceFile::read(path)?;
        reporter.on_source_file_read(&file);
        files.push(file);
    }
    reporter.on_all_source_files_read(&files);
    Ok(files)
}
