mod test_support;

use serde_json::json;
use std::fs::File;
use std::io::Read;
use test_support::{open_workspace, request_err, request_ok, spawn_sidecar, temp_dir};

#[test]
fn export_then_import_restores_workspace_state() {
    let (_child, mut stdin, mut reader, workspace) = open_workspace("tutord-backup-src");
    let out_dir = temp_dir("tutord-backup-out");
    let bundle = out_dir.join("workspace.zip");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "students.create",
        json!({ "name": "Before Backup", "hourlyRate": 35 }),
    );
    let exported = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "backup.exportWorkspace",
        json!({ "outPath": bundle.to_string_lossy() }),
    );
    assert_eq!(exported["bundleFormat"], "tutord-workspace-v1");
    assert_eq!(exported["entryCount"], 2);
    let checksum = exported["dbSha256"].as_str().expect("checksum").to_string();
    assert_eq!(checksum.len(), 64);

    let mut archive = zip::ZipArchive::new(File::open(&bundle).expect("open bundle"))
        .expect("open zip archive");
    let mut manifest = String::new();
    archive
        .by_name("manifest.json")
        .expect("manifest entry")
        .read_to_string(&mut manifest)
        .expect("read manifest");
    assert!(manifest.contains("tutord-workspace-v1"));
    assert!(manifest.contains(&checksum));
    archive
        .by_name("db/tutord.sqlite3")
        .expect("database entry in bundle");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "students.create",
        json!({ "name": "After Backup" }),
    );
    let imported = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "backup.importWorkspace",
        json!({ "inPath": bundle.to_string_lossy() }),
    );
    assert_eq!(imported["bundleFormatDetected"], "tutord-workspace-v1");
    assert_eq!(imported["dbSha256"], checksum.as_str());

    let students = request_ok(&mut stdin, &mut reader, "5", "students.list", json!({}));
    let names: Vec<&str> = students["students"]
        .as_array()
        .map(|a| a.iter().filter_map(|s| s["name"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(names, vec!["Before Backup"]);

    // A second sidecar restores the bundle into an empty workspace.
    let (_child2, mut stdin2, mut reader2, workspace2) = open_workspace("tutord-backup-dst");
    let _ = request_ok(
        &mut stdin2,
        &mut reader2,
        "1",
        "backup.importWorkspace",
        json!({ "inPath": bundle.to_string_lossy() }),
    );
    let restored = request_ok(&mut stdin2, &mut reader2, "2", "students.list", json!({}));
    assert_eq!(restored["students"][0]["hourlyRate"], "35.00");

    let _ = std::fs::remove_dir_all(workspace);
    let _ = std::fs::remove_dir_all(workspace2);
    let _ = std::fs::remove_dir_all(out_dir);
}

#[test]
fn import_rejects_missing_and_invalid_bundles() {
    let (_child, mut stdin, mut reader, workspace) = open_workspace("tutord-backup-bad");

    let missing = request_err(
        &mut stdin,
        &mut reader,
        "1",
        "backup.importWorkspace",
        json!({ "inPath": workspace.join("nope.zip").to_string_lossy() }),
    );
    assert_eq!(missing["code"], "not_found");

    let bogus = workspace.join("bogus.zip");
    std::fs::write(&bogus, b"not a bundle").expect("write bogus");
    let rejected = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "backup.importWorkspace",
        json!({ "inPath": bogus.to_string_lossy() }),
    );
    assert_eq!(rejected["code"], "backup_failed");

    // The workspace stays usable after a failed import.
    let _ = request_ok(&mut stdin, &mut reader, "3", "students.list", json!({}));

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn workspace_data_persists_across_sidecar_restarts() {
    let workspace = temp_dir("tutord-persist");
    {
        let (mut child, mut stdin, mut reader) = spawn_sidecar();
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            "1",
            "workspace.select",
            json!({ "path": workspace.to_string_lossy() }),
        );
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            "2",
            "profile.update",
            json!({ "patch": { "tutorName": "Robin", "defaultHourlyRate": "55.5" } }),
        );
        drop(stdin);
        let _ = child.wait();
    }

    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let selected = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    assert_eq!(selected["mode"], "workspace");
    let profile = request_ok(&mut stdin, &mut reader, "2", "profile.get", json!({}));
    assert_eq!(profile["profile"]["tutorName"], "Robin");
    assert_eq!(profile["profile"]["defaultHourlyRate"], "55.50");
    let revision = request_ok(&mut stdin, &mut reader, "3", "sync.revision", json!({}));
    assert!(revision["revision"].as_i64().unwrap_or(0) >= 1);

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
