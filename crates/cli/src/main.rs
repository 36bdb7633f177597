//! Pack a directory into a tree container, list it, or print a node.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use treefile::{FileTree, Tree};

mod pack;

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    match args.as_slice() {
        ["pack", dir, out] => cmd_pack(dir, out),
        ["ls", file] => cmd_ls(file, ""),
        ["ls", file, path] => cmd_ls(file, path),
        ["cat", file, path] => cmd_cat(file, path),
        _ => {
            eprintln!("usage: cli pack <dir> <out.tree>");
            eprintln!("       cli ls <file.tree> [path]");
            eprintln!("       cli cat <file.tree> <path>");
            std::process::exit(2);
        }
    }
}

fn cmd_pack(dir: &str, out: &str) -> Result<()> {
    let tree = pack::dir_tree(Path::new(dir))?;
    let end = treefile::write_file(out, &tree).with_context(|| format!("writing {out}"))?;
    println!("{out}: {end} bytes");
    Ok(())
}

fn cmd_ls(file: &str, path: &str) -> Result<()> {
    let container = FileTree::open(file).with_context(|| format!("opening {file}"))?;
    let node = descend(container.root(), path)?;

    let mut stdout = io::stdout().lock();
    for entry in node.children() {
        let (name, child) = entry?;
        let marker = if child.num_children()? > 0 { "/" } else { "" };
        writeln!(
            stdout,
            "{}{}\t{}",
            String::from_utf8_lossy(&name),
            marker,
            child.data_len()?
        )?;
    }
    Ok(())
}

fn cmd_cat(file: &str, path: &str) -> Result<()> {
    let container = FileTree::open(file).with_context(|| format!("opening {file}"))?;
    let node = descend(container.root(), path)?;
    node.write_to(&mut io::stdout().lock())?;
    Ok(())
}

/// Walks `/`-separated path segments down from `node`.
fn descend<'r>(mut node: Tree<'r, File>, path: &str) -> Result<Tree<'r, File>> {
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        node = node
            .child(segment.as_bytes())
            .with_context(|| format!("descending into {segment}"))?;
    }
    Ok(node)
}
