use mediafront::content::mime::MediaKind;
use mediafront::content::node::ROOT_ID;
use mediafront::content::tree::{post_search, ChildQuery, ContentTree, MemoryTree};

fn query(search: Option<&str>) -> ChildQuery<'_> {
    ChildQuery { search, ..ChildQuery::all("WebRender") }
}

#[test]
fn unknown_id_has_no_children() {
    let tree = MemoryTree::default();
    assert!(tree.children("does-not-exist", &query(None)).is_empty());
    assert!(tree.node("does-not-exist").is_none());
}

#[test]
fn children_keep_insertion_order() {
    let tree = MemoryTree::default();
    let b = tree.add_folder(ROOT_ID, "Beta");
    let a = tree.add_folder(ROOT_ID, "Alpha");
    let ids: Vec<String> = tree.children(ROOT_ID, &query(None)).into_iter().map(|n| n.id).collect();
    assert_eq!(ids, vec![b, a]);
}

#[test]
fn offset_and_limit_page_the_listing() {
    let tree = MemoryTree::default();
    for name in ["a", "b", "c", "d"] {
        tree.add_media(ROOT_ID, name, MediaKind::Audio, "audio/mpeg");
    }
    let q = ChildQuery { offset: 1, limit: 2, ..ChildQuery::all("WebRender") };
    let names: Vec<String> = tree.children(ROOT_ID, &q).into_iter().map(|n| n.display_name).collect();
    assert_eq!(names, vec!["b", "c"]);
}

#[test]
fn search_filters_case_insensitively() {
    let tree = MemoryTree::default();
    tree.add_media(ROOT_ID, "Holiday Video", MediaKind::Video, "video/mp4");
    tree.add_media(ROOT_ID, "Work Call", MediaKind::Video, "video/mp4");
    let found = tree.children(ROOT_ID, &query(Some("holiday")));
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].display_name, "Holiday Video");
}

#[test]
fn search_is_not_applied_below_a_code_gate() {
    let tree = MemoryTree::default();
    let secret = tree.add_folder(ROOT_ID, "Secret");
    let (gate, placeholder) = tree.add_code_gate(ROOT_ID, "Locked", "4711", &secret).unwrap();
    let kids = tree.children(&gate, &query(Some("4711")));
    assert_eq!(kids.len(), 1);
    assert_eq!(kids[0].id, placeholder);
    assert_eq!(kids[0].parent_id.as_deref(), Some(gate.as_str()));
}

#[test]
fn code_gate_records_target() {
    let tree = MemoryTree::default();
    let movie = tree.add_media(ROOT_ID, "Movie", MediaKind::Video, "video/mp4");
    let (gate, _) = tree.add_code_gate(ROOT_ID, "Locked", "1", &movie).unwrap();
    let node = tree.node(&gate).unwrap();
    assert!(node.is_code_protected());
    let target = node.code_gate.unwrap().target().clone();
    assert_eq!(target.id, movie);
    assert!(!target.is_folder);
}

#[test]
fn code_gate_for_unknown_target_is_refused() {
    let tree = MemoryTree::default();
    assert!(tree.add_code_gate(ROOT_ID, "Locked", "1", "missing").is_none());
}

#[test]
fn post_search_keeps_matches_in_order() {
    let tree = MemoryTree::default();
    tree.add_media(ROOT_ID, "Cat One", MediaKind::Image, "image/png");
    tree.add_media(ROOT_ID, "Dog", MediaKind::Image, "image/png");
    tree.add_media(ROOT_ID, "CAT two", MediaKind::Image, "image/png");
    let mut nodes = tree.children(ROOT_ID, &query(None));
    post_search(&mut nodes, "cat");
    let names: Vec<&str> = nodes.iter().map(|n| n.display_name.as_str()).collect();
    assert_eq!(names, vec!["Cat One", "CAT two"]);
}

#[test]
fn resume_nodes_use_their_resume_name() {
    let tree = MemoryTree::default();
    let id = tree.add_resume(ROOT_ID, "Film", "Film (resume 00:12:00)", MediaKind::Video, "video/x-matroska");
    let node = tree.node(&id).unwrap();
    assert!(node.is_resume());
    assert_eq!(node.web_name(), "Film (resume 00:12:00)");
}
