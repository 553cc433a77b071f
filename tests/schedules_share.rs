mod test_support;

use serde_json::json;
use test_support::{temp_workspace, Sidecar};

fn session(subject: &str, day: &str, start: &str, end: &str) -> serde_json::Value {
    json!({ "subject": subject, "day": day, "startTime": start, "endTime": end })
}

#[test]
fn save_and_get_own_schedule() {
    let workspace = temp_workspace();
    let mut sidecar = Sidecar::with_workspace(workspace.path());

    let empty = sidecar.ok("schedules.get", json!({ "userId": "alice" }));
    assert_eq!(empty["sessions"], json!([]));
    assert_eq!(empty["updatedAt"], json!(null));

    let saved = sidecar.ok(
        "schedules.save",
        json!({
            "userId": "alice",
            "sessions": [
                session("Math", "monday", "09:00", "10:00"),
                session("History", "Friday", "14:00", "15:30"),
            ],
        }),
    );
    let ids: Vec<&str> = saved["sessions"]
        .as_array()
        .expect("sessions")
        .iter()
        .filter_map(|s| s["id"].as_str())
        .collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.iter().all(|id| !id.is_empty()));
    assert_eq!(saved["sessions"][1]["day"], json!("friday"));

    let fetched = sidecar.ok("schedules.get", json!({ "userId": "alice" }));
    assert_eq!(fetched["sessions"], saved["sessions"]);

    for bad in [
        session("Math", "someday", "09:00", "10:00"),
        session("Math", "monday", "10:00", "09:00"),
        session(" ", "monday", "09:00", "10:00"),
    ] {
        assert_eq!(
            sidecar.err_code("schedules.save", json!({ "userId": "alice", "sessions": [bad] })),
            "bad_params"
        );
    }
}

#[test]
fn friends_share_and_copy_schedules() {
    let workspace = temp_workspace();
    let mut sidecar = Sidecar::with_workspace(workspace.path());
    for name in ["alice", "bob", "eve"] {
        sidecar.upsert_user(name);
    }
    sidecar.ok(
        "schedules.save",
        json!({ "userId": "bob", "sessions": [session("Physics", "tuesday", "08:00", "09:00")] }),
    );
    sidecar.ok(
        "schedules.save",
        json!({ "userId": "alice", "sessions": [session("Math", "monday", "09:00", "10:00")] }),
    );

    assert_eq!(
        sidecar.err_code(
            "schedules.getFriend",
            json!({ "userId": "alice", "friendUserId": "bob" })
        ),
        "forbidden"
    );
    sidecar.befriend("alice", "bob");
    sidecar.befriend("alice", "eve");

    let theirs = sidecar.ok(
        "schedules.getFriend",
        json!({ "userId": "alice", "friendUserId": "bob" }),
    );
    assert_eq!(theirs["sessions"][0]["subject"], json!("Physics"));
    let bob_session_id = theirs["sessions"][0]["id"].clone();

    let appended = sidecar.ok(
        "schedules.copyFromFriend",
        json!({ "userId": "alice", "friendUserId": "bob", "mode": "append" }),
    );
    assert_eq!(appended["sessions"].as_array().map(|a| a.len()), Some(2));
    assert_ne!(appended["sessions"][1]["id"], bob_session_id);

    let replaced = sidecar.ok(
        "schedules.copyFromFriend",
        json!({ "userId": "alice", "friendUserId": "bob", "mode": "replace" }),
    );
    assert_eq!(replaced["sessions"].as_array().map(|a| a.len()), Some(1));
    assert_eq!(replaced["sessions"][0]["subject"], json!("Physics"));

    assert_eq!(
        sidecar.err_code(
            "schedules.copyFromFriend",
            json!({ "userId": "alice", "friendUserId": "eve" })
        ),
        "not_found"
    );
    assert_eq!(
        sidecar.err_code(
            "schedules.copyFromFriend",
            json!({ "userId": "alice", "friendUserId": "bob", "mode": "merge" })
        ),
        "bad_params"
    );
}

#[test]
fn padded_user_ids_address_the_same_schedule() {
    let workspace = temp_workspace();
    let mut sidecar = Sidecar::with_workspace(workspace.path());
    for name in ["alice", "bob"] {
        sidecar.upsert_user(name);
    }

    let saved = sidecar.ok(
        "schedules.save",
        json!({ "userId": " alice ", "sessions": [session("Math", "monday", "09:00", "10:00")] }),
    );
    for user_id in ["alice", " alice", "alice\t"] {
        let fetched = sidecar.ok("schedules.get", json!({ "userId": user_id }));
        assert_eq!(fetched["sessions"], saved["sessions"], "userId {user_id:?}");
    }

    sidecar.befriend(" bob", "alice ");
    let theirs = sidecar.ok(
        "schedules.getFriend",
        json!({ "userId": "bob", "friendUserId": " alice" }),
    );
    assert_eq!(theirs["sessions"], saved["sessions"]);
    assert_eq!(
        sidecar.err_code("schedules.get", json!({ "userId": "   " })),
        "bad_params"
    );
}
