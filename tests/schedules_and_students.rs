mod test_support;

use serde_json::json;
use test_support::{open_workspace, request_err, request_ok, str_at};

#[test]
fn logging_a_scheduled_class_inherits_current_rate_and_slot() {
    let (_child, mut stdin, mut reader, workspace) = open_workspace("tutord-schedules-log");

    let student = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "students.create",
        json!({ "name": "Emma Stone", "hourlyRate": 40, "subject": "Chemistry" }),
    );
    let student_id = str_at(&student, "/studentId").to_string();
    let class = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "schedules.create",
        json!({
            "studentId": student_id,
            "dayOfWeek": 1,
            "startTime": "16:00",
            "durationMinutes": 90
        }),
    );
    let class_id = str_at(&class, "/scheduledClassId").to_string();
    assert_eq!(class["scheduledClass"]["studentName"], "Emma Stone");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "students.update",
        json!({ "studentId": student_id, "patch": { "hourlyRate": 60 } }),
    );

    // 2024-01-08 is a Monday.
    let before = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "schedules.forDay",
        json!({ "date": "2024-01-08" }),
    );
    assert_eq!(before["classes"].as_array().map(|a| a.len()), Some(1));
    assert_eq!(before["classes"][0]["logged"], false);

    let logged = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "schedules.log",
        json!({ "scheduledClassId": class_id, "date": "2024-01-08" }),
    );
    let session = &logged["session"];
    assert_eq!(session["hourlyRate"], "60.00");
    assert_eq!(session["totalAmount"], "90.00");
    assert_eq!(session["startTime"], "16:00");
    assert_eq!(session["endTime"], "17:30");
    assert_eq!(session["durationMinutes"], 90);
    assert_eq!(session["scheduledClassId"], class_id.as_str());
    assert_eq!(session["paymentStatus"], "pending");

    let after = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "schedules.forDay",
        json!({ "date": "2024-01-08" }),
    );
    assert_eq!(after["classes"][0]["logged"], true);
    assert_eq!(after["classes"][0]["loggedSessionId"], logged["sessionId"]);

    let tuesday = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "schedules.forDay",
        json!({ "date": "2024-01-09" }),
    );
    assert_eq!(tuesday["classes"].as_array().map(|a| a.len()), Some(0));

    let off_day = request_err(
        &mut stdin,
        &mut reader,
        "7b",
        "schedules.log",
        json!({ "scheduledClassId": class_id, "date": "2024-01-09" }),
    );
    assert_eq!(off_day["code"], "bad_params");
    assert_eq!(off_day["details"]["dayOfWeek"], 1);
    assert_eq!(off_day["details"]["date"], "2024-01-09");

    let again = request_err(
        &mut stdin,
        &mut reader,
        "8",
        "schedules.log",
        json!({ "scheduledClassId": class_id, "date": "2024-01-08" }),
    );
    assert_eq!(again["code"], "session_exists");

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn schedule_validation_and_updates() {
    let (_child, mut stdin, mut reader, workspace) = open_workspace("tutord-schedules-validate");

    let student = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "students.create",
        json!({ "name": "Lena Fox" }),
    );
    let student_id = str_at(&student, "/studentId").to_string();

    let bad_day = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "schedules.create",
        json!({ "studentId": student_id, "dayOfWeek": 7, "startTime": "10:00" }),
    );
    assert_eq!(bad_day["code"], "bad_params");
    let bad_time = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "schedules.create",
        json!({ "studentId": student_id, "dayOfWeek": 6, "startTime": "25:00" }),
    );
    assert_eq!(bad_time["code"], "bad_params");
    let too_long = request_err(
        &mut stdin,
        &mut reader,
        "3b",
        "schedules.create",
        json!({ "studentId": student_id, "dayOfWeek": 6, "startTime": "10:00", "durationMinutes": 100_000 }),
    );
    assert_eq!(too_long["code"], "bad_params");

    let class = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "schedules.create",
        json!({ "studentId": student_id, "dayOfWeek": 0, "startTime": "10:00" }),
    );
    assert_eq!(class["scheduledClass"]["durationMinutes"], 60);
    let class_id = str_at(&class, "/scheduledClassId").to_string();

    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "schedules.update",
        json!({ "scheduledClassId": class_id, "patch": { "isActive": false, "startTime": "11:30" } }),
    );
    assert_eq!(updated["scheduledClass"]["startTime"], "11:30");
    assert_eq!(updated["scheduledClass"]["isActive"], false);

    // 2024-01-07 is a Sunday; inactive slots do not occur.
    let sunday = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "schedules.forDay",
        json!({ "date": "2024-01-07" }),
    );
    assert_eq!(sunday["classes"].as_array().map(|a| a.len()), Some(0));
    let inactive = request_err(
        &mut stdin,
        &mut reader,
        "6b",
        "schedules.log",
        json!({ "scheduledClassId": class_id, "date": "2024-01-07" }),
    );
    assert_eq!(inactive["code"], "bad_params");
    let none_logged = request_ok(&mut stdin, &mut reader, "6c", "sessions.list", json!({}));
    assert_eq!(none_logged["count"], 0);

    let active_only = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "schedules.list",
        json!({ "includeInactive": false }),
    );
    assert_eq!(
        active_only["scheduledClasses"].as_array().map(|a| a.len()),
        Some(0)
    );

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn deleting_a_student_removes_sessions_and_schedules() {
    let (_child, mut stdin, mut reader, workspace) = open_workspace("tutord-students-cascade");

    let keep = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "students.create",
        json!({ "name": "Keep Me", "hourlyRate": 40 }),
    );
    let doomed = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "students.create",
        json!({ "name": "Remove Me", "hourlyRate": 40 }),
    );
    let keep_id = str_at(&keep, "/studentId").to_string();
    let doomed_id = str_at(&doomed, "/studentId").to_string();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "schedules.create",
        json!({ "studentId": doomed_id, "dayOfWeek": 2, "startTime": "15:00" }),
    );
    for (i, (student, date)) in [
        (&doomed_id, "2024-01-02"),
        (&doomed_id, "2024-01-09"),
        (&keep_id, "2024-01-02"),
    ]
    .iter()
    .enumerate()
    {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("s{}", i),
            "sessions.create",
            json!({ "studentId": student, "date": date, "durationMinutes": 60 }),
        );
    }

    let deleted = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "students.delete",
        json!({ "studentId": doomed_id }),
    );
    assert_eq!(deleted["deleted"]["sessionsDeleted"], 2);
    assert_eq!(deleted["deleted"]["scheduledClassesDeleted"], 1);

    let sessions = request_ok(&mut stdin, &mut reader, "5", "sessions.list", json!({}));
    assert_eq!(sessions["count"], 1);
    assert_eq!(sessions["sessions"][0]["studentId"], keep_id.as_str());
    let schedules = request_ok(&mut stdin, &mut reader, "6", "schedules.list", json!({}));
    assert_eq!(
        schedules["scheduledClasses"].as_array().map(|a| a.len()),
        Some(0)
    );

    let gone = request_err(
        &mut stdin,
        &mut reader,
        "7",
        "students.get",
        json!({ "studentId": doomed_id }),
    );
    assert_eq!(gone["code"], "not_found");

    let students = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "students.list",
        json!({ "search": "keep" }),
    );
    assert_eq!(students["students"].as_array().map(|a| a.len()), Some(1));
    assert_eq!(students["activeCount"], 1);

    let _ = std::fs::remove_dir_all(workspace);
}
