//! Integration-level coverage of the `sourceFolders` antichain algorithm
//! (spec.md §3 invariant 4 / §8 invariant 5), run through the public
//! `ct::trace_metadata` entry point rather than inlined in a unit test.

use ct::trace_metadata::process_source_folders_list;

#[test]
fn antichain_drops_prefixes_and_appends_git_toplevel_last() {
    let input = vec![
        "/a/b".to_string(),
        "/a/b/c".to_string(),
        "/d".to_string(),
        "/d".to_string(),
    ];
    assert_eq!(
        process_source_folders_list(&input, "/a"),
        vec!["/d".to_string(), "/a".to_string()]
    );
}

#[test]
fn unrelated_folders_all_survive_when_there_is_no_git_root() {
    let input = vec!["/x/lib".to_string(), "/y/app".to_string(), "/x/lib".to_string()];
    let mut result = process_source_folders_list(&input, "");
    result.sort();
    assert_eq!(result, vec!["/x/lib".to_string(), "/y/app".to_string()]);
}

#[test]
fn git_toplevel_absorbs_everything_beneath_it() {
    let input = vec!["/repo/src".to_string(), "/repo/tests".to_string(), "/other".to_string()];
    assert_eq!(
        process_source_folders_list(&input, "/repo"),
        vec!["/other".to_string(), "/repo".to_string()]
    );
}
