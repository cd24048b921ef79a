//! Module-name resolution from a project's directory layout.
//!
//! The session core only consumes the resulting [`ModuleRef`]; resolution
//! is pure path computation over the caller-supplied workspace root and
//! configured source directories.

use std::path::{Component, Path};

use crate::wire::request::ModuleRef;

/// Resolve the module context for a source file.
///
/// The module name is the file's path relative to the first matching
/// source directory under the workspace root, extension stripped, with
/// components joined by `/` (`src/foo/bar.scm` resolves to `foo/bar`).
/// Files outside the workspace root or outside every source directory
/// resolve to the top level.
#[must_use]
pub fn module_for_path(workspace_root: &Path, source_dirs: &[String], file: &Path) -> ModuleRef {
    let Ok(relative) = file.strip_prefix(workspace_root) else {
        return ModuleRef::TopLevel;
    };

    for dir in source_dirs {
        if let Ok(inner) = relative.strip_prefix(dir) {
            if let Some(name) = module_name(inner) {
                return ModuleRef::Named(name);
            }
        }
    }

    ModuleRef::TopLevel
}

/// Join normal path components into a `/`-separated module name, with the
/// final extension stripped.
fn module_name(path: &Path) -> Option<String> {
    let stem = path.with_extension("");
    let mut parts = Vec::new();
    for component in stem.components() {
        let Component::Normal(part) = component else {
            return None;
        };
        let part = part.to_string_lossy();
        if part.is_empty() {
            return None;
        }
        parts.push(part.into_owned());
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}
