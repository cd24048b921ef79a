//! Unit tests for module-name resolution from project layout.

use std::path::Path;

use replwire::resolver::module_for_path;
use replwire::ModuleRef;

fn dirs(names: &[&str]) -> Vec<String> {
    names.iter().map(|&n| n.to_owned()).collect()
}

#[test]
fn resolves_nested_source_file_to_slash_separated_name() {
    let module = module_for_path(
        Path::new("/work/project"),
        &dirs(&["src"]),
        Path::new("/work/project/src/foo/bar.scm"),
    );
    assert_eq!(module, ModuleRef::Named("foo/bar".into()));
}

#[test]
fn resolves_file_directly_under_source_dir() {
    let module = module_for_path(
        Path::new("/work/project"),
        &dirs(&["src"]),
        Path::new("/work/project/src/main.scm"),
    );
    assert_eq!(module, ModuleRef::Named("main".into()));
}

#[test]
fn first_matching_source_dir_wins() {
    let module = module_for_path(
        Path::new("/work/project"),
        &dirs(&["src", "lib"]),
        Path::new("/work/project/lib/util/strings.scm"),
    );
    assert_eq!(module, ModuleRef::Named("util/strings".into()));
}

#[test]
fn file_outside_workspace_resolves_to_top_level() {
    let module = module_for_path(
        Path::new("/work/project"),
        &dirs(&["src"]),
        Path::new("/elsewhere/src/foo.scm"),
    );
    assert_eq!(module, ModuleRef::TopLevel);
}

#[test]
fn file_outside_every_source_dir_resolves_to_top_level() {
    let module = module_for_path(
        Path::new("/work/project"),
        &dirs(&["src"]),
        Path::new("/work/project/scripts/deploy.scm"),
    );
    assert_eq!(module, ModuleRef::TopLevel);
}

#[test]
fn source_dir_itself_resolves_to_top_level() {
    let module = module_for_path(
        Path::new("/work/project"),
        &dirs(&["src"]),
        Path::new("/work/project/src"),
    );
    assert_eq!(module, ModuleRef::TopLevel);
}

#[test]
fn extension_less_file_keeps_its_name() {
    let module = module_for_path(
        Path::new("/work/project"),
        &dirs(&["src"]),
        Path::new("/work/project/src/foo/Makefile"),
    );
    assert_eq!(module, ModuleRef::Named("foo/Makefile".into()));
}

#[test]
fn only_the_final_extension_is_stripped() {
    let module = module_for_path(
        Path::new("/work/project"),
        &dirs(&["src"]),
        Path::new("/work/project/src/data/set.v2.scm"),
    );
    assert_eq!(module, ModuleRef::Named("data/set.v2".into()));
}
