mod test_support;

use serde_json::json;
use test_support::{temp_workspace, Sidecar};

fn sample_quiz(sidecar: &mut Sidecar, creator: &str) -> serde_json::Value {
    sidecar.ok(
        "quizzes.create",
        json!({
            "title": "Cells",
            "subject": "Biology",
            "creator": creator,
            "questions": [
                { "question": "Powerhouse of the cell?", "options": ["Nucleus", "Mitochondria", "Ribosome"], "correctAnswer": 1 },
                { "question": "DNA lives in the?", "options": ["Nucleus", "Membrane"], "correctAnswer": 0 },
            ],
        }),
    )
}

#[test]
fn code_lookup_hides_answers() {
    let workspace = temp_workspace();
    let mut sidecar = Sidecar::with_workspace(workspace.path());

    let quiz = sample_quiz(&mut sidecar, "ms-lee");
    let code = quiz["code"].as_str().expect("code").to_string();
    assert_eq!(code.len(), 8);
    assert_eq!(code, code.to_ascii_uppercase());
    assert_eq!(quiz["questions"][0]["correctAnswer"], json!(1));

    let taker = sidecar.ok("quizzes.getByCode", json!({ "code": code.to_ascii_lowercase() }));
    assert_eq!(taker["id"], quiz["id"]);
    assert_eq!(taker["questions"].as_array().map(|a| a.len()), Some(2));
    assert!(taker["questions"][0].get("correctAnswer").is_none());

    assert_eq!(
        sidecar.err_code("quizzes.getByCode", json!({ "code": "ZZZZZZZZ" })),
        "not_found"
    );
    let listed = sidecar.ok("quizzes.list", json!({}));
    assert_eq!(listed["quizzes"][0]["code"], json!(code));
    assert!(listed["quizzes"][0]["questions"][0].get("correctAnswer").is_none());
}

#[test]
fn answers_are_shown_only_to_creator_and_admin() {
    let workspace = temp_workspace();
    let mut sidecar = Sidecar::with_workspace(workspace.path());
    let quiz = sample_quiz(&mut sidecar, "ms-lee");
    let id = quiz["id"].clone();

    let anyone = sidecar.ok("quizzes.get", json!({ "id": id }));
    assert_eq!(anyone["title"], json!("Cells"));
    assert!(anyone["questions"][0].get("correctAnswer").is_none());
    let stranger = sidecar.ok("quizzes.get", json!({ "id": id, "requestedBy": "sam" }));
    assert!(stranger["questions"][1].get("correctAnswer").is_none());

    let creator = sidecar.ok("quizzes.get", json!({ "id": id, "requestedBy": " ms-lee " }));
    assert_eq!(creator, quiz);

    sidecar.login_admin();
    let admin = sidecar.ok("quizzes.get", json!({ "id": id }));
    assert_eq!(admin["questions"][1]["correctAnswer"], json!(0));
    let listed = sidecar.ok("quizzes.list", json!({}));
    assert!(listed["quizzes"][0]["questions"][0].get("correctAnswer").is_none());
}

#[test]
fn attempts_are_graded_and_summarized() {
    let workspace = temp_workspace();
    let mut sidecar = Sidecar::with_workspace(workspace.path());
    let quiz = sample_quiz(&mut sidecar, "ms-lee");

    let perfect = sidecar.ok(
        "quizAttempts.create",
        json!({ "quizId": quiz["id"], "participantName": "Ana", "answers": [1, 0] }),
    );
    assert_eq!(perfect["score"], json!(2));
    assert_eq!(perfect["totalQuestions"], json!(2));

    let partial = sidecar.ok(
        "quizAttempts.create",
        json!({ "quizId": quiz["id"], "participantName": "Ben", "answers": [null, 0] }),
    );
    assert_eq!(partial["score"], json!(1));
    assert_eq!(partial["answers"], json!([null, 0]));

    assert_eq!(
        sidecar.err_code(
            "quizAttempts.create",
            json!({ "quizId": quiz["id"], "participantName": "Cy", "answers": [1] })
        ),
        "bad_params"
    );
    assert_eq!(
        sidecar.err_code(
            "quizAttempts.create",
            json!({ "quizId": quiz["id"], "participantName": "Cy", "answers": [7, 0] })
        ),
        "bad_params"
    );

    let results = sidecar.ok("quizzes.results", json!({ "quizId": quiz["id"] }));
    assert_eq!(results["attemptCount"], json!(2));
    assert_eq!(results["bestScore"], json!(2));
    assert_eq!(results["averagePercent"], json!(75.0));

    let attempts = sidecar.ok("quizAttempts.list", json!({ "quizId": quiz["id"] }));
    assert_eq!(attempts["attempts"].as_array().map(|a| a.len()), Some(2));
}

#[test]
fn only_creator_or_admin_deletes_and_attempts_cascade() {
    let workspace = temp_workspace();
    let mut sidecar = Sidecar::with_workspace(workspace.path());
    let quiz = sample_quiz(&mut sidecar, "ms-lee");
    sidecar.ok(
        "quizAttempts.create",
        json!({ "quizId": quiz["id"], "participantName": "Ana", "answers": [1, 1] }),
    );

    assert_eq!(
        sidecar.err_code("quizzes.delete", json!({ "id": quiz["id"] })),
        "forbidden"
    );
    assert_eq!(
        sidecar.err_code(
            "quizzes.delete",
            json!({ "id": quiz["id"], "requestedBy": "mr-kim" })
        ),
        "forbidden"
    );
    let deleted = sidecar.ok(
        "quizzes.delete",
        json!({ "id": quiz["id"], "requestedBy": "ms-lee" }),
    );
    assert_eq!(deleted["attemptsDeleted"], json!(1));
    assert_eq!(
        sidecar.err_code("quizAttempts.list", json!({ "quizId": quiz["id"] })),
        "not_found"
    );

    let other = sample_quiz(&mut sidecar, "mr-kim");
    sidecar.login_admin();
    sidecar.ok("quizzes.delete", json!({ "id": other["id"] }));
    assert_eq!(sidecar.ok("quizzes.list", json!({}))["quizzes"], json!([]));
}

#[test]
fn malformed_quizzes_are_rejected() {
    let workspace = temp_workspace();
    let mut sidecar = Sidecar::with_workspace(workspace.path());
    let cases = [
        json!({ "title": "t", "subject": "s", "creator": "c", "questions": [] }),
        json!({ "title": "t", "subject": "s", "creator": "c",
                "questions": [{ "question": "q", "options": ["only"], "correctAnswer": 0 }] }),
        json!({ "title": "t", "subject": "s", "creator": "c",
                "questions": [{ "question": "q", "options": ["a", "b"], "correctAnswer": 2 }] }),
        json!({ "title": "t", "subject": "s", "creator": "c" }),
    ];
    for params in cases {
        assert_eq!(sidecar.err_code("quizzes.create", params), "bad_params");
    }
}
