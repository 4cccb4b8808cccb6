use std::io::Write;
use std::sync::Arc;

use notebook_graph::config::ExplorerConfig;
use notebook_graph::explorer::Explorer;
use notebook_graph::graph::{EdgeKind, GraphEdge, NodeKey};
use notebook_graph::store::MemoryStore;
use tempfile::NamedTempFile;
use uuid::Uuid;

const WORKSPACE: &str = "0000000a-0000-0000-0000-000000000000";
const OTHER_WORKSPACE: &str = "0000000b-0000-0000-0000-000000000000";

fn notebook_json() -> String {
    format!(
        r#"{{
            "entities": [
                {{"id": "00000000-0000-0000-0000-000000000001", "name": "Grace",
                  "graph": "{WORKSPACE}"}},
                {{"id": "00000000-0000-0000-0000-000000000002", "name": "COBOL",
                  "graph": "{WORKSPACE}"}},
                {{"id": "00000000-0000-0000-0000-000000000003", "name": "Legacy note"}},
                {{"id": "00000000-0000-0000-0000-000000000004", "name": "Elsewhere",
                  "graph": "{OTHER_WORKSPACE}"}}
            ],
            "attributes": [
                {{"id": "00000000-0000-0000-0000-000000000010",
                  "owner": "00000000-0000-0000-0000-000000000001", "name": "rear admiral"}}
            ],
            "links": [
                {{"source": {{"kind": "entity", "id": "00000000-0000-0000-0000-000000000001"}},
                  "target": {{"kind": "entity", "id": "00000000-0000-0000-0000-000000000002"}},
                  "note": "designed",
                  "createdAt": "2024-03-01T10:00:00Z"}},
                {{"source": {{"kind": "entity", "id": "00000000-0000-0000-0000-000000000003"}},
                  "target": {{"kind": "entity", "id": "00000000-0000-0000-0000-000000000001"}},
                  "createdAt": "2024-03-02T10:00:00Z"}},
                {{"source": {{"kind": "entity", "id": "00000000-0000-0000-0000-000000000001"}},
                  "target": {{"kind": "entity", "id": "00000000-0000-0000-0000-000000000004"}},
                  "graph": "{OTHER_WORKSPACE}"}}
            ]
        }}"#
    )
}

fn write_notebook() -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(notebook_json().as_bytes()).expect("write");
    file.flush().expect("flush");
    file
}

fn entity(n: u128) -> NodeKey {
    NodeKey::entity(Uuid::from_u128(n))
}

#[test]
fn notebook_file_feeds_a_scoped_load() {
    let file = write_notebook();
    let store = MemoryStore::from_notebook_file(file.path()).expect("read notebook");
    assert_eq!(store.entity_count(), 4);
    assert_eq!(store.attribute_count(), 1);
    assert_eq!(store.link_count(), 3);

    let scope = Some(Uuid::parse_str(WORKSPACE).expect("uuid"));
    let grace = entity(1);
    let mut explorer = Explorer::new(Arc::new(store), ExplorerConfig::default()).with_scope(scope);
    let snapshot = explorer.load_graph(Some(grace), 1, true).expect("load");

    assert!(snapshot.contains(&grace));
    assert!(snapshot.contains(&entity(2)));
    assert!(snapshot.contains(&entity(3)), "unscoped records belong to every workspace");
    assert!(!snapshot.contains(&entity(4)));

    let attribute = NodeKey::attribute(Uuid::from_u128(0x10));
    assert!(
        snapshot
            .edges
            .contains(&GraphEdge::new(grace, attribute, EdgeKind::Containment))
    );
    assert_eq!(snapshot.note(grace, entity(2)), Some("designed"));
    assert_eq!(snapshot.note(entity(2), grace), None);
}

#[test]
fn missing_notebook_reports_the_path() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("absent.json");

    let error = MemoryStore::from_notebook_file(&path).expect_err("missing file");
    assert!(format!("{error:#}").contains("absent.json"));
}

#[test]
fn settings_file_overrides_defaults() {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(br#"{"degree_cap": 4, "lens": {"enabled": true}}"#)
        .expect("write");
    file.flush().expect("flush");

    let config = ExplorerConfig::from_file(file.path()).expect("settings");
    assert_eq!(config.degree_cap, 4);
    assert!(config.lens.enabled);
    assert_eq!(config.lens.depth, 2);
    assert_eq!(config.hops, 2);
}
