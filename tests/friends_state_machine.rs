mod test_support;

use serde_json::json;
use test_support::{temp_workspace, Sidecar};

fn setup(names: &[&str]) -> (tempfile::TempDir, Sidecar) {
    let workspace = temp_workspace();
    let mut sidecar = Sidecar::with_workspace(workspace.path());
    for name in names {
        sidecar.upsert_user(name);
    }
    (workspace, sidecar)
}

fn friend_count(sidecar: &mut Sidecar, user: &str) -> usize {
    sidecar.ok("friends.list", json!({ "userId": user }))["friends"]
        .as_array()
        .map(|a| a.len())
        .unwrap_or(0)
}

#[test]
fn accept_creates_exactly_one_friendship() {
    let (_ws, mut sidecar) = setup(&["alice", "bob"]);
    let request = sidecar.ok(
        "friendRequests.send",
        json!({ "userId": "alice", "toUserId": "bob" }),
    );
    assert_eq!(request["status"], json!("pending"));
    assert_eq!(request["fromUserEmail"], json!("alice@school.test"));

    let incoming = sidecar.ok("friendRequests.incoming", json!({ "userId": "bob" }));
    assert_eq!(incoming["requests"][0]["id"], request["id"]);
    let outgoing = sidecar.ok("friendRequests.outgoing", json!({ "userId": "alice" }));
    assert_eq!(outgoing["requests"][0]["id"], request["id"]);

    // Only the recipient may accept.
    assert_eq!(
        sidecar.err_code(
            "friendRequests.accept",
            json!({ "userId": "alice", "requestId": request["id"] })
        ),
        "forbidden"
    );
    let accepted = sidecar.ok(
        "friendRequests.accept",
        json!({ "userId": "bob", "requestId": request["id"] }),
    );
    assert_eq!(accepted["request"]["status"], json!("accepted"));
    assert_eq!(accepted["friendship"]["userId"], json!("alice"));

    assert_eq!(friend_count(&mut sidecar, "alice"), 1);
    assert_eq!(friend_count(&mut sidecar, "bob"), 1);

    assert_eq!(
        sidecar.err_code(
            "friendRequests.accept",
            json!({ "userId": "bob", "requestId": request["id"] })
        ),
        "conflict"
    );
    assert_eq!(friend_count(&mut sidecar, "alice"), 1);
    let incoming = sidecar.ok("friendRequests.incoming", json!({ "userId": "bob" }));
    assert_eq!(incoming["requests"], json!([]));
}

#[test]
fn decline_and_cancel_create_nothing() {
    let (_ws, mut sidecar) = setup(&["alice", "bob", "carol"]);
    let to_bob = sidecar.ok(
        "friendRequests.send",
        json!({ "userId": "alice", "toUserId": "bob" }),
    );
    let declined = sidecar.ok(
        "friendRequests.decline",
        json!({ "userId": "bob", "requestId": to_bob["id"] }),
    );
    assert_eq!(declined["status"], json!("declined"));
    assert!(declined["respondedAt"].is_string());

    let to_carol = sidecar.ok(
        "friendRequests.send",
        json!({ "userId": "alice", "toUserId": "carol" }),
    );
    assert_eq!(
        sidecar.err_code(
            "friendRequests.cancel",
            json!({ "userId": "carol", "requestId": to_carol["id"] })
        ),
        "forbidden"
    );
    let cancelled = sidecar.ok(
        "friendRequests.cancel",
        json!({ "userId": "alice", "requestId": to_carol["id"] }),
    );
    assert_eq!(cancelled["status"], json!("cancelled"));

    assert_eq!(friend_count(&mut sidecar, "alice"), 0);
    assert_eq!(
        sidecar.err_code(
            "friendRequests.accept",
            json!({ "userId": "carol", "requestId": to_carol["id"] })
        ),
        "conflict"
    );

    // A declined pair may try again.
    sidecar.ok(
        "friendRequests.send",
        json!({ "userId": "alice", "toUserId": "bob" }),
    );
}

#[test]
fn send_guards() {
    let (_ws, mut sidecar) = setup(&["alice", "bob", "carol"]);
    assert_eq!(
        sidecar.err_code(
            "friendRequests.send",
            json!({ "userId": "alice", "toUserId": "alice" })
        ),
        "bad_params"
    );
    assert_eq!(
        sidecar.err_code(
            "friendRequests.send",
            json!({ "userId": "alice", "toUserId": "nobody" })
        ),
        "not_found"
    );

    sidecar.ok(
        "friendRequests.send",
        json!({ "userId": "alice", "toUserId": "bob" }),
    );
    assert_eq!(
        sidecar.err_code(
            "friendRequests.send",
            json!({ "userId": "alice", "toUserId": "bob" })
        ),
        "conflict"
    );
    assert_eq!(
        sidecar.err_code(
            "friendRequests.send",
            json!({ "userId": "bob", "toUserId": "alice" })
        ),
        "conflict"
    );

    sidecar.befriend("alice", "carol");
    assert_eq!(
        sidecar.err_code(
            "friendRequests.send",
            json!({ "userId": "carol", "toUserId": "alice" })
        ),
        "conflict"
    );
}

#[test]
fn removal_by_participant_only_then_request_again() {
    let (_ws, mut sidecar) = setup(&["alice", "bob", "mallory"]);
    let friendship = sidecar.befriend("alice", "bob");

    assert_eq!(
        sidecar.err_code(
            "friends.remove",
            json!({ "userId": "mallory", "friendshipId": friendship })
        ),
        "forbidden"
    );
    let removed = sidecar.ok(
        "friends.remove",
        json!({ "userId": "bob", "friendshipId": friendship }),
    );
    assert_eq!(removed["removedUserId"], json!("alice"));
    assert_eq!(friend_count(&mut sidecar, "alice"), 0);
    assert_eq!(
        sidecar.err_code(
            "friends.remove",
            json!({ "userId": "bob", "friendshipId": friendship })
        ),
        "not_found"
    );

    sidecar.ok(
        "friendRequests.send",
        json!({ "userId": "bob", "toUserId": "alice" }),
    );
}

#[test]
fn search_reports_relation() {
    let (_ws, mut sidecar) = setup(&["alice", "bob", "carol", "dave", "erin"]);
    sidecar.befriend("alice", "bob");
    sidecar.ok(
        "friendRequests.send",
        json!({ "userId": "alice", "toUserId": "carol" }),
    );
    sidecar.ok(
        "friendRequests.send",
        json!({ "userId": "dave", "toUserId": "alice" }),
    );

    let hits = sidecar.ok(
        "users.search",
        json!({ "userId": "alice", "term": "SCHOOL.TEST" }),
    );
    let hits = hits["users"].as_array().expect("users").clone();
    assert_eq!(hits.len(), 4);
    let relation = |uid: &str| {
        hits.iter()
            .find(|h| h["uid"] == json!(uid))
            .map(|h| h["relation"].clone())
    };
    assert_eq!(relation("alice"), None);
    assert_eq!(relation("bob"), Some(json!("friend")));
    assert_eq!(relation("carol"), Some(json!("pendingSent")));
    assert_eq!(relation("dave"), Some(json!("pendingReceived")));
    assert_eq!(relation("erin"), Some(json!("none")));

    let blank = sidecar.ok("users.search", json!({ "userId": "alice", "term": "  " }));
    assert_eq!(blank["users"], json!([]));
}

#[test]
fn profiles_upsert_in_place() {
    let (_ws, mut sidecar) = setup(&[]);
    let created = sidecar.upsert_user("zoe");
    assert_eq!(created["displayName"], json!("zoe@school.test"));
    assert_eq!(created["username"], json!("zoe"));

    let updated = sidecar.ok(
        "users.upsert",
        json!({ "uid": "zoe", "email": "zoe@school.test", "displayName": "Zoe Q", "username": "zq" }),
    );
    assert_eq!(updated["displayName"], json!("Zoe Q"));
    assert_eq!(sidecar.ok("users.get", json!({ "uid": "zoe" })), updated);
    assert_eq!(sidecar.err_code("users.get", json!({ "uid": "nobody" })), "not_found");
}
