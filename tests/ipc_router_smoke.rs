mod test_support;

use serde_json::json;
use test_support::{open_workspace, request, request_ok, spawn_sidecar, str_at};

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let (mut child, mut stdin, mut reader, workspace) = open_workspace("tutord-router-smoke");
    let csv_out = workspace.join("exports").join("smoke.csv");
    let invoice_out = workspace.join("exports").join("smoke-invoice.html");
    let bundle_out = workspace.join("smoke-backup.zip");

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(health["mode"], "workspace");

    let _ = request_ok(&mut stdin, &mut reader, "2", "profile.get", json!({}));
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "profile.update",
        json!({ "patch": { "businessName": "Smoke Tutoring", "currency": "EUR" } }),
    );
    let student = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "students.create",
        json!({ "name": "Smoke Student", "hourlyRate": 45 }),
    );
    let student_id = str_at(&student, "/studentId").to_string();
    let _ = request_ok(&mut stdin, &mut reader, "5", "students.list", json!({}));
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "students.update",
        json!({ "studentId": student_id, "patch": { "subject": "Math" } }),
    );
    let class = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "schedules.create",
        json!({ "studentId": student_id, "dayOfWeek": 1, "startTime": "16:00", "durationMinutes": 60 }),
    );
    let class_id = str_at(&class, "/scheduledClassId").to_string();
    let _ = request_ok(&mut stdin, &mut reader, "8", "schedules.list", json!({}));
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "schedules.forDay",
        json!({ "date": "2024-01-08" }),
    );
    let logged = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "schedules.log",
        json!({ "scheduledClassId": class_id, "date": "2024-01-08" }),
    );
    let session_id = str_at(&logged, "/sessionId").to_string();
    let _ = request_ok(&mut stdin, &mut reader, "11", "sessions.list", json!({}));
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "12",
        "sessions.get",
        json!({ "sessionId": session_id }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "13",
        "sessions.setPaid",
        json!({ "sessionIds": [session_id], "paid": true }),
    );

    for (i, method) in [
        "stats.overview",
        "stats.revenueByMonth",
        "stats.weeklyHours",
        "stats.payments",
        "stats.cancellations",
        "stats.durationHistogram",
        "stats.students",
        "stats.summary",
    ]
    .iter()
    .enumerate()
    {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("s{}", i),
            method,
            json!({ "period": "all", "today": "2024-01-10" }),
        );
    }

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "14",
        "calendar.month",
        json!({ "year": 2024, "month": 1 }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "15",
        "calendar.week",
        json!({ "date": "2024-01-10" }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "16",
        "exports.sessionsCsv",
        json!({ "outPath": csv_out.to_string_lossy() }),
    );
    assert!(csv_out.is_file());
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "17",
        "exports.invoiceHtml",
        json!({ "studentId": student_id, "outPath": invoice_out.to_string_lossy() }),
    );
    assert!(invoice_out.is_file());
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "18",
        "backup.exportWorkspace",
        json!({ "outPath": bundle_out.to_string_lossy() }),
    );
    let _ = request_ok(&mut stdin, &mut reader, "19", "sync.revision", json!({}));
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "20",
        "sessions.delete",
        json!({ "sessionId": session_id }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "21",
        "schedules.delete",
        json!({ "scheduledClassId": class_id }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "22",
        "students.delete",
        json!({ "studentId": student_id }),
    );

    let unknown = request(&mut stdin, &mut reader, "23", "grades.compute", json!({}));
    assert_eq!(unknown["ok"], false);
    assert_eq!(unknown["error"]["code"], "not_implemented");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn requests_before_a_workspace_report_no_workspace() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert!(health["mode"].is_null());

    let resp = request(&mut stdin, &mut reader, "2", "students.list", json!({}));
    assert_eq!(resp["ok"], false);
    assert_eq!(resp["error"]["code"], "no_workspace");
    assert!(resp["error"]["details"].is_null());

    drop(stdin);
    let _ = child.wait();
}
