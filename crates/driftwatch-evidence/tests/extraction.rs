//! Extraction over real directory layouts built in a temp dir.

use driftwatch_evidence::{
    ExtractionWarning, LocalScan, LocalSchemaSpec, ScanKind, build_baseline, extract_jsonl,
    extract_session_json, extract_storage_tree, extract_tree_fixture_file, newest_file_with_types,
    scan_local,
};
use driftwatch_kernel::{MISSING_TYPE, ProducerFamily};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

struct TempDirGuard {
    path: PathBuf,
}

impl TempDirGuard {
    fn new(prefix: &str) -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time should be after unix epoch")
            .as_nanos();
        let path = std::env::temp_dir().join(format!(
            "driftwatch-evidence-{prefix}-{}-{nanos}",
            std::process::id()
        ));
        fs::create_dir_all(&path).expect("temp dir should be created");
        Self { path }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.path.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("parent dir should be created");
        }
        fs::write(&path, contents).expect("fixture file should be written");
        path
    }
}

impl Drop for TempDirGuard {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

#[test]
fn jsonl_counts_bad_lines_and_buckets_untyped_objects() {
    let tmp = TempDirGuard::new("jsonl");
    let path = tmp.write(
        "session.jsonl",
        concat!(
            "{\"type\":\"message\",\"id\":1,\"text\":\"hi\"}\n",
            "not json at all\n",
            "\n",
            "[1,2,3]\n",
            "{\"role\":\"user\",\"content\":\"x\"}\n",
            "{\"payload\":{}}\n",
        ),
    );

    let extraction = extract_jsonl(ProducerFamily::Codex, &path, 100);
    let fp = extraction.fingerprint();
    assert_eq!(fp.parse_errors, 1);
    assert_eq!(fp.parsed_count, 3);
    assert_eq!(
        fp.type_keys.keys().cloned().collect::<Vec<_>>(),
        vec![MISSING_TYPE.to_string(), "message".to_string(), "user".to_string()]
    );
    assert!(fp.type_keys["message"].contains("text"));
}

#[test]
fn jsonl_reads_only_the_tail() {
    let tmp = TempDirGuard::new("tail");
    let path = tmp.write(
        "session.jsonl",
        "{\"type\":\"old\"}\n{\"type\":\"mid\"}\n{\"type\":\"new\"}\n",
    );
    let fp = extract_jsonl(ProducerFamily::Claude, &path, 2).fingerprint();
    assert!(!fp.type_keys.contains_key("old"));
    assert!(fp.type_keys.contains_key("mid"));
    assert!(fp.type_keys.contains_key("new"));
}

#[test]
fn session_document_has_root_and_capped_messages() {
    let tmp = TempDirGuard::new("session");
    let path = tmp.write(
        "session-1.json",
        r#"{"sessionId":"s","messages":[
            {"type":"user","content":"a"},
            {"type":"gemini","content":"b","thoughts":[]},
            {"type":"info","content":"c"}
        ]}"#,
    );
    let fp = extract_session_json(ProducerFamily::Gemini, &path, 2).fingerprint();
    assert_eq!(fp.type_counts.get("root"), Some(&1));
    assert!(fp.type_keys["root"].contains("messages"));
    assert!(fp.type_keys.contains_key("user"));
    assert!(fp.type_keys["gemini"].contains("thoughts"));
    assert!(!fp.type_keys.contains_key("info"));

    let broken = tmp.write("broken.json", "{ nope");
    let fp = extract_session_json(ProducerFamily::Gemini, &broken, 10).fingerprint();
    assert_eq!(fp.parse_errors, 1);
    assert!(fp.is_empty());
}

fn write_tree(tmp: &TempDirGuard) -> PathBuf {
    let session = tmp.write(
        "storage/session/proj/ses_1.json",
        r#"{"id":"ses_1","title":"t","time":{}}"#,
    );
    tmp.write(
        "storage/message/ses_1/msg_a.json",
        r#"{"id":"msg_a","role":"user","sessionID":"ses_1"}"#,
    );
    tmp.write(
        "storage/message/ses_1/msg_b.json",
        r#"{"id":"msg_b","role":"assistant","modelID":"m"}"#,
    );
    tmp.write("storage/part/msg_a/prt_1.json", r#"{"type":"text","text":"x"}"#);
    tmp.write("storage/part/msg_b/prt_2.json", "{ broken");
    tmp.write(
        "storage/part/msg_b/prt_3.json",
        r#"{"type":"tool","tool":"bash","state":{}}"#,
    );
    session
}

#[test]
fn storage_tree_walks_session_messages_and_parts() {
    let tmp = TempDirGuard::new("tree");
    let session = write_tree(&tmp);

    let extraction = extract_storage_tree(ProducerFamily::Opencode, &session, 10, 10);
    assert_eq!(extraction.warning, None);
    assert_eq!(extraction.message_files_parsed, 2);
    assert_eq!(extraction.part_files_parsed, 2);

    let fp = extraction.fingerprint();
    assert_eq!(fp.parse_errors, 1);
    for expected in ["session", "message.user", "message.assistant", "part.text", "part.tool"] {
        assert!(fp.type_keys.contains_key(expected), "missing {expected}");
    }
}

#[test]
fn storage_tree_part_budget_counts_broken_files() {
    let tmp = TempDirGuard::new("budget");
    let session = write_tree(&tmp);

    // prt_1 and the broken prt_2 use up the budget before prt_3.
    let extraction = extract_storage_tree(ProducerFamily::Opencode, &session, 10, 2);
    assert_eq!(extraction.part_files_parsed, 1);
    assert_eq!(extraction.parse_errors, 1);
    assert!(!extraction.fingerprint().type_keys.contains_key("part.tool"));
}

#[test]
fn storage_tree_warnings_keep_partial_results() {
    let tmp = TempDirGuard::new("partial");
    let loose = tmp.write("loose/ses_9.json", r#"{"id":"ses_9","title":"t"}"#);
    let extraction = extract_storage_tree(ProducerFamily::Opencode, &loose, 10, 10);
    assert_eq!(extraction.warning, Some(ExtractionWarning::StorageRootNotFound));
    assert!(extraction.fingerprint().type_keys.contains_key("session"));

    let session = write_tree(&tmp);
    let orphan = tmp.write("storage/session/proj/ses_2.json", r#"{"id":"ses_2"}"#);
    let extraction = extract_storage_tree(ProducerFamily::Opencode, &orphan, 10, 10);
    assert_eq!(extraction.warning, Some(ExtractionWarning::MessageDirNotFound));
    assert_eq!(extraction.records.len(), 1);
    assert!(session.exists());
}

#[test]
fn tree_fixture_files_are_typed_by_directory() {
    let tmp = TempDirGuard::new("fixture");
    let message = tmp.write(
        "agents/opencode/storage_v2/message/ses_1/msg_1.json",
        r#"{"id":"msg_1","role":"assistant"}"#,
    );
    let part = tmp.write(
        "agents/opencode/storage_v2/part/msg_1/prt_1.json",
        r#"{"type":"reasoning","text":"x"}"#,
    );
    let other = tmp.write("agents/opencode/export.json", r#"{"info":{}}"#);

    let types = |path: &Path| {
        extract_tree_fixture_file(ProducerFamily::Opencode, path)
            .fingerprint()
            .type_keys
            .into_keys()
            .collect::<Vec<_>>()
    };
    assert_eq!(types(&message), vec!["message.assistant".to_string()]);
    assert_eq!(types(&part), vec!["part.reasoning".to_string()]);
    assert_eq!(types(&other), vec!["opencode_json".to_string()]);
}

#[test]
fn baseline_skips_drift_fixtures_and_wrong_extensions() {
    let tmp = TempDirGuard::new("baseline");
    tmp.write("agents/codex/ok.jsonl", "{\"type\":\"event_msg\",\"payload\":{}}\n");
    tmp.write(
        "agents/codex/schema_drift/new.jsonl",
        "{\"type\":\"event_msg\",\"payload\":{},\"brand_new\":1}\n",
    );
    tmp.write("agents/codex/notes.json", "{\"type\":\"ignored\"}");

    let fixtures = vec![
        "agents/codex/ok.jsonl".to_string(),
        "agents/codex/schema_drift/new.jsonl".to_string(),
        "agents/codex/notes.json".to_string(),
        "agents/codex/gone.jsonl".to_string(),
    ];
    let baseline = build_baseline(ProducerFamily::Codex, &fixtures, tmp.path());

    assert_eq!(baseline.fixtures.len(), 3);
    assert_eq!(baseline.missing, vec!["agents/codex/gone.jsonl".to_string()]);
    assert_eq!(baseline.fingerprint.type_keys.len(), 1);
    assert!(!baseline.fingerprint.type_keys["event_msg"].contains("brand_new"));
}

#[test]
fn required_types_pick_a_qualifying_file() {
    let tmp = TempDirGuard::new("required");
    let qualified = tmp.write("a.jsonl", "{\"type\":\"session_start\"}\n{\"type\":\"tool_call\"}\n");
    tmp.write("b.jsonl", "{\"type\":\"session_start\"}\n");

    let roots = vec![tmp.path().to_path_buf()];
    let picked = newest_file_with_types(&roots, "*.jsonl", &["tool_call".to_string()], 400)
        .expect("listing should succeed");
    assert_eq!(picked, Some(qualified));
}

#[test]
fn scan_local_reports_missing_files() {
    let tmp = TempDirGuard::new("nofiles");
    let spec = LocalSchemaSpec {
        kind: ScanKind::JsonlNewest,
        roots: vec![tmp.path().display().to_string()],
        glob: "*.jsonl".to_string(),
        max_lines: None,
        max_messages: None,
        max_parts: None,
        required_types: Vec::new(),
    };
    let scan = scan_local(ProducerFamily::Droid, &spec).expect("scan should succeed");
    assert!(matches!(scan, LocalScan::NoFilesFound { .. }));

    tmp.write("nested/deep/s.jsonl", "{\"type\":\"x\"}\n");
    let recursive = LocalSchemaSpec {
        glob: "**/*.jsonl".to_string(),
        ..spec
    };
    let scan = scan_local(ProducerFamily::Droid, &recursive).expect("scan should succeed");
    let LocalScan::Extracted(extraction) = scan else {
        panic!("expected an extraction");
    };
    assert!(extraction.fingerprint().type_keys.contains_key("x"));
}
