mod test_support;

use serde_json::json;
use test_support::{open_workspace, request_err, request_ok, str_at};

#[test]
fn sessions_csv_and_invoice_for_january() {
    let (_child, mut stdin, mut reader, workspace) = open_workspace("tutord-exports");
    let csv_out = workspace.join("out").join("january.csv");
    let invoice_out = workspace.join("out").join("invoice.html");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "profile.update",
        json!({ "patch": { "businessName": "Bright Minds", "tutorName": "Sam Lee", "currency": "EUR" } }),
    );
    let student = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "students.create",
        json!({
            "name": "Doe, Jane",
            "parentName": "Pat <Parent>",
            "subject": "Math",
            "hourlyRate": 40
        }),
    );
    let student_id = str_at(&student, "/studentId").to_string();
    for (id, params) in [
        ("3", json!({ "date": "2024-01-05", "durationMinutes": 60, "paymentStatus": "paid", "notes": "said \"hi\"" })),
        ("4", json!({ "date": "2024-01-12", "durationMinutes": 90 })),
        ("5", json!({ "date": "2024-01-19", "durationMinutes": 60, "paymentStatus": "cancelled", "cancelledBy": "tutor" })),
        ("6", json!({ "date": "2024-02-02", "durationMinutes": 60 })),
    ] {
        let mut params = params;
        params["studentId"] = json!(student_id);
        let _ = request_ok(&mut stdin, &mut reader, id, "sessions.create", params);
    }

    let csv = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "exports.sessionsCsv",
        json!({
            "startDate": "2024-01-01",
            "endDate": "2024-01-31",
            "outPath": csv_out.to_string_lossy()
        }),
    );
    assert_eq!(csv["filename"], "tutoring-sessions-2024-01-01-to-2024-01-31.csv");
    assert_eq!(csv["rowsExported"], 3);
    let text = str_at(&csv, "/csv").to_string();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines[0],
        "Date,Student,Duration (hours),Hourly Rate,Total Amount,Paid Status,Notes"
    );
    assert_eq!(
        lines[1],
        "2024-01-05,\"Doe, Jane\",1.00,40.00,40.00,Paid,\"said \"\"hi\"\"\""
    );
    assert_eq!(lines[2], "2024-01-12,\"Doe, Jane\",1.50,40.00,60.00,Unpaid,");
    assert!(lines[3].contains(",Cancelled,"));
    assert_eq!(std::fs::read_to_string(&csv_out).expect("csv written"), text);

    let all = request_ok(&mut stdin, &mut reader, "8", "exports.sessionsCsv", json!({}));
    assert_eq!(all["filename"], "tutoring-sessions-all-to-all.csv");
    assert_eq!(all["rowsExported"], 4);

    let invoice = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "exports.invoiceHtml",
        json!({
            "studentId": student_id,
            "startDate": "2024-01-01",
            "endDate": "2024-01-31",
            "invoiceNumber": "INV-7",
            "issueDate": "2024-02-01",
            "dueDate": "2024-02-15",
            "outPath": invoice_out.to_string_lossy()
        }),
    );
    assert_eq!(invoice["invoiceNumber"], "INV-7");
    assert_eq!(invoice["total"], "100.00");
    assert_eq!(invoice["amountDue"], "60.00");
    assert_eq!(invoice["lines"].as_array().map(|l| l.len()), Some(2));
    let html = str_at(&invoice, "/html").to_string();
    assert!(html.contains("Bright Minds"));
    assert!(html.contains("INV-7"));
    assert!(html.contains("€100.00"));
    assert!(html.contains("Pat &lt;Parent&gt;"));
    assert!(html.contains("Due Feb 15, 2024"));
    assert!(!html.contains("Jan 19, 2024"), "cancelled sessions never appear");
    assert!(!html.contains("Feb 02, 2024"));
    assert!(html.contains("window.print()"));
    assert_eq!(std::fs::read_to_string(&invoice_out).expect("invoice written"), html);

    let unpaid = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "exports.invoiceHtml",
        json!({ "studentId": student_id, "period": "all", "unpaidOnly": true }),
    );
    assert_eq!(unpaid["lines"].as_array().map(|l| l.len()), Some(2));
    assert_eq!(unpaid["total"], "100.00");
    assert_eq!(unpaid["amountDue"], "100.00");

    let missing = request_err(
        &mut stdin,
        &mut reader,
        "11",
        "exports.invoiceHtml",
        json!({ "studentId": "missing" }),
    );
    assert_eq!(missing["code"], "not_found");

    let _ = std::fs::remove_dir_all(workspace);
}
