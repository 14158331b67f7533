mod test_support;

use serde_json::json;
use test_support::{event_ids, request_err_code, request_ok, spawn_sidecar};

#[test]
fn expand_caller_classes_without_workspace() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let res = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "schedule.expand",
        json!({
            "month": "2024-01-15",
            "classes": [
                { "classId": 1, "startDate": "2024-01-01", "endDate": "2024-01-31", "recurringDays": "2,4" }
            ]
        }),
    );
    assert_eq!(
        event_ids(&res),
        vec![
            "1-20240102",
            "1-20240104",
            "1-20240109",
            "1-20240111",
            "1-20240116",
            "1-20240118",
            "1-20240123",
            "1-20240125",
            "1-20240130",
        ]
    );
}

#[test]
fn sunday_codes_and_filters() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let week = json!([
        { "classId": "eight", "startDate": "2024-03-04", "endDate": "2024-03-10", "recurringDays": "8", "teacherId": "T1" },
        { "classId": "seven", "startDate": "2024-03-04", "endDate": "2024-03-10", "recurringDays": [7], "teacherId": "T1" }
    ]);
    let res = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "schedule.expand",
        json!({ "month": "2024-03", "classes": week }),
    );
    assert_eq!(event_ids(&res), vec!["eight-20240310", "seven-20240310"]);

    let res = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "schedule.expand",
        json!({ "month": "2024-03", "classes": week, "teacherId": "T2" }),
    );
    assert!(event_ids(&res).is_empty());

    // Blank filters behave like no filter.
    let res = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "schedule.expand",
        json!({ "month": "2024-03", "classes": week, "teacherId": "", "roomId": null }),
    );
    assert_eq!(event_ids(&res).len(), 2);
}

#[test]
fn malformed_classes_are_skipped_not_fatal() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let res = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "schedule.expand",
        json!({
            "month": "2024-01",
            "includeSkipped": true,
            "classes": [
                "not a class",
                { "classId": "noend", "startDate": "2024-01-01", "recurringDays": "2" },
                { "classId": "a", "startDate": "2024-01-01", "endDate": "2024-01-07", "recurringDays": "1" },
                { "classId": "b", "startDate": "2024-01-01", "endDate": "2024-01-07", "recurringDays": "1" },
                { "classId": "junk", "startDate": "2024-01-01", "endDate": "2024-01-07", "recurringDays": "x,99" }
            ]
        }),
    );

    // Same day, two classes, two distinct ids.
    assert_eq!(event_ids(&res), vec!["a-20240101", "b-20240101"]);
    assert_eq!(res["events"][0]["date"], res["events"][1]["date"]);

    let skipped: Vec<(u64, String)> = res["skipped"]
        .as_array()
        .expect("skipped")
        .iter()
        .map(|s| {
            (
                s["index"].as_u64().expect("index"),
                s["reason"].as_str().expect("reason").to_string(),
            )
        })
        .collect();
    assert_eq!(
        skipped,
        vec![
            (0, "unreadable".to_string()),
            (1, "missingEndDate".to_string()),
            (4, "noValidDayCodes".to_string()),
        ]
    );
}

#[test]
fn expand_is_repeatable_and_validates_params() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let params = json!({
        "month": "2024-01",
        "classes": [
            { "classId": 9, "startDate": "2023-12-01", "endDate": "2024-02-29", "recurringDays": "1,3,5", "name": "Chem" }
        ]
    });
    let first = request_ok(&mut stdin, &mut reader, "1", "schedule.expand", params.clone());
    let second = request_ok(&mut stdin, &mut reader, "2", "schedule.expand", params);
    assert_eq!(first, second);
    assert_eq!(first["events"][0]["name"], json!("Chem"));
    assert_eq!(first["events"][0]["id"], json!("9-20231225"));

    let narrow = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "schedule.expand",
        json!({
            "month": "2024-01",
            "paddingDays": 0,
            "classes": [
                { "classId": 9, "startDate": "2023-12-01", "endDate": "2024-02-29", "recurringDays": "1" }
            ]
        }),
    );
    assert_eq!(event_ids(&narrow).first().map(String::as_str), Some("9-20240101"));

    let code = request_err_code(
        &mut stdin,
        &mut reader,
        "4",
        "schedule.expand",
        json!({ "month": "January", "classes": [] }),
    );
    assert_eq!(code, "bad_params");
    let code = request_err_code(
        &mut stdin,
        &mut reader,
        "5",
        "schedule.expand",
        json!({ "month": "2024-01", "classes": {} }),
    );
    assert_eq!(code, "bad_params");
    let code = request_err_code(
        &mut stdin,
        &mut reader,
        "6",
        "schedule.expand",
        json!({ "month": "2024-01", "classes": [], "paddingDays": 99 }),
    );
    assert_eq!(code, "bad_params");
}
