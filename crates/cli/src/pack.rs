use anyhow::{Context, Result};
use node::{Branch, Leaf};
use std::fs;
use std::path::Path;

/// Builds an in-memory tree mirroring a directory: regular files become
/// payload leaves, directories become branches. Anything else (sockets,
/// device nodes, dangling symlinks) is skipped.
pub fn dir_tree(path: &Path) -> Result<Branch<'static>> {
    let mut branch = Branch::new();

    for entry in fs::read_dir(path).with_context(|| format!("reading {}", path.display()))? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned().into_bytes();
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            branch.add_boxed(name, Box::new(dir_tree(&entry.path())?))?;
        } else if file_type.is_file() {
            let data = fs::read(entry.path())
                .with_context(|| format!("reading {}", entry.path().display()))?;
            branch.add_boxed(name, Box::new(Leaf(data)))?;
        }
    }

    Ok(branch)
}
