//! Rendering a snapshot loaded from a manifest on disk

use pretty_assertions::assert_eq;
use std::fs;
use tempfile::TempDir;

use vadscope::render::{self, Format, ProcessView};
use vadscope::snapshot::{MemorySnapshot, ProcessFilter, ProcessSource};
use vadscope::{Address, RecordMaterializer, RegionInspector, WalkLimits};

const MANIFEST: &str = r#"{
    "image": "physmem.raw",
    "processes": [
        {
            "pid": 1044,
            "name": "explorer.exe",
            "offset": "0x81f5e020",
            "vad_root": "0x81f3b008",
            "pages": [{"vaddr": "0x81f5e000", "paddr": "0x2000"}]
        },
        {"pid": 4, "name": "System", "offset": "0x823c8830", "vad_root": "0x0"}
    ],
    "vads": [
        {
            "offset": "0x81f3b008",
            "tag": "Vad ",
            "start": "0x7c900000",
            "end": "0x7c9affff",
            "left": "0x81f3b0a0",
            "flags": {
                "raw": 125829120,
                "commit_charge": 5,
                "protection": 7,
                "private_memory": false,
                "legacy": {"image_map": true}
            },
            "long": {
                "control_area": "0x823e2b58",
                "first_prototype_pte": "0xe1720d78",
                "last_contiguous_pte": "0xfffffffc",
                "flags2": 0
            }
        },
        {
            "offset": "0x81f3b0a0",
            "tag": "VadS",
            "start": "0x10000",
            "end": "0x10fff",
            "parent": "0x81f3b008",
            "flags": {"commit_charge": 1, "protection": 4, "private_memory": true}
        }
    ],
    "control_areas": [
        {
            "offset": "0x823e2b58",
            "segment": "0xe1720d38",
            "dereference_list": {"flink": "0x0", "blink": "0x0"},
            "number_of_section_references": 1,
            "number_of_pfn_references": 58,
            "number_of_mapped_views": 21,
            "number_of_user_references": 22,
            "waiting_for_deletion": "0x0",
            "flags": 557184,
            "file_object": {
                "offset": "0x823e5918",
                "name_buffer": "0xe17210a8",
                "name": "\\WINDOWS\\system32\\ntdll.dll"
            }
        }
    ]
}"#;

fn open() -> (TempDir, MemorySnapshot) {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("physmem.raw"), vec![0u8; 0x3000]).unwrap();
    fs::write(dir.path().join("case.json"), MANIFEST).unwrap();
    let snapshot = MemorySnapshot::open(dir.path().join("case.json")).unwrap();
    (dir, snapshot)
}

fn views(snapshot: &MemorySnapshot, filter: &ProcessFilter) -> Vec<ProcessView> {
    filter
        .apply(snapshot.processes().unwrap())
        .iter()
        .map(|process| ProcessView::collect(process, snapshot, WalkLimits::default()))
        .collect()
}

fn render_to_string(format: Format, views: &[ProcessView], snapshot: &MemorySnapshot) -> String {
    let mut out = Vec::new();
    render::render(&mut out, format, views, snapshot).unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn test_vadinfo_for_legacy_image_mapping() {
    let (_dir, snapshot) = open();
    let filter = ProcessFilter {
        pids: vec![1044],
        name: None,
    };
    let text = render_to_string(Format::Info, &views(&snapshot, &filter), &snapshot);

    let expected = format!(
        "{}\n\
         Pid:   1044\n\
         VAD node @81f3b008 Start 7c900000 End 7c9affff Tag Vad \n\
         Flags: CommitCharge: 5, Protection: 7, PrivateMemory: 0, ImageMap: 1\n\
         Protection: PAGE_EXECUTE_WRITECOPY\n\
         ControlArea @823e2b58 Segment e1720d38\n\
         Dereference list: Flink 00000000, Blink 00000000\n\
         NumberOfSectionReferences:          1 NumberOfPfnReferences:          58\n\
         NumberOfMappedViews:               21 NumberOfUserReferences:         22\n\
         WaitingForDeletion Event:  00000000\n\
         Control Flags: 0x88080\n\
         FileObject @823e5918 FileBuffer @ e17210a8          , Name: \\WINDOWS\\system32\\ntdll.dll\n\
         First prototype PTE: e1720d78 Last contiguous PTE: fffffffc\n\
         Flags2: 0x0\n\
         \n\
         VAD node @81f3b0a0 Start 00010000 End 00010fff Tag VadS\n\
         Flags: CommitCharge: 1, Protection: 4, PrivateMemory: 1\n\
         Protection: PAGE_READWRITE\n\
         \n",
        "*".repeat(72)
    );
    assert_eq!(text, expected);
}

#[test]
fn test_null_root_process_renders_empty() {
    let (_dir, snapshot) = open();
    let filter = ProcessFilter {
        pids: Vec::new(),
        name: Some("system".to_string()),
    };
    let views = views(&snapshot, &filter);
    assert_eq!(views.len(), 1);
    assert!(views[0].entries.is_empty());

    let text = render_to_string(Format::Tree, &views, &snapshot);
    assert_eq!(text, format!("{}\nPid:      4\n", "*".repeat(72)));
}

#[test]
fn test_tree_and_json_agree_on_depths() {
    let (_dir, snapshot) = open();
    let views = views(&snapshot, &ProcessFilter::default());

    let tree = render_to_string(Format::Tree, &views[..1], &snapshot);
    assert!(tree.ends_with("7c900000 - 7c9affff\n 00010000 - 00010fff\n"));

    let json = render_to_string(Format::Json, &views, &snapshot);
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    let regions = value[0]["regions"].as_array().unwrap();
    assert_eq!(regions[0]["depth"], 0);
    assert_eq!(regions[1]["depth"], 1);
    assert_eq!(regions[0]["legacy_type_flags"][0], "ImageMap");
    assert_eq!(
        regions[0]["control_area"]["file_object"]["name"],
        "\\WINDOWS\\system32\\ntdll.dll"
    );
    assert!(regions[1].get("extended").is_none());
    assert_eq!(value[1]["regions"].as_array().unwrap().len(), 0);
}

#[test]
fn test_inspector_over_manifest_records() {
    let (_dir, snapshot) = open();
    let inspector = RegionInspector::new(&snapshot);

    let long = snapshot.materialize(Address::new(0x81f3b008)).unwrap();
    let description = inspector.inspect(&long);
    assert_eq!(description.layout, "long/legacy");
    assert_eq!(description.vad_type, None);
    assert_eq!(description.flags_raw, 125829120);
    assert!(description.control_area.is_some());

    let short = snapshot.materialize(Address::new(0x81f3b0a0)).unwrap();
    let description = inspector.inspect(&short);
    assert_eq!(description.layout, "short/legacy");
    assert_eq!(description.legacy_type_flags, Some(Vec::new()));
    assert!(description.control_area.is_none());
    assert!(description.extended.is_none());
}
