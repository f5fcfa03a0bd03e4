mod common;

use axum::http::{Method, StatusCode, header};
use bizboard_api::Event;
use common::{Harness, domain_error, get, ok, post};
use serde_json::{Value, json};

fn ask(h: &Harness, user: i64, title: &str) -> i64 {
    let body = json!({ "title": title, "content": "details", "category": "tax" });
    let created = ok(&h.community.handle(&post("question", &body).with_user(user)));
    assert!(created["created_at"].is_string());
    created["question_id"].as_i64().unwrap()
}

fn answer(h: &Harness, user: i64, question_id: i64, content: &str) -> i64 {
    let body = json!({ "question_id": question_id, "content": content });
    ok(&h.community.handle(&post("answer", &body).with_user(user)))["answer_id"]
        .as_i64()
        .unwrap()
}

fn toggle(h: &Harness, user: i64, answer_id: i64) -> Value {
    ok(&h.community.handle(&post("like", &json!({ "answer_id": answer_id })).with_user(user)))
}

#[test]
fn test_questions_list_with_answer_counts() {
    let h = Harness::new();
    let author = h.register("author", "author@x.com");

    let older = ask(&h, author, "Which tax regime?");
    let newer = ask(&h, author, "How to hire?");
    answer(&h, author, older, "simplified");

    let listed = ok(&h.community.handle(&get("questions")));
    let questions = listed["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 2);
    assert_eq!(questions[0]["id"], newer);
    assert_eq!(questions[0]["answer_count"], 0);
    assert_eq!(questions[1]["answer_count"], 1);
    assert_eq!(questions[1]["username"], "author");
    assert_eq!(questions[1]["user_id"], author);
}

#[test]
fn test_toggle_like_twice_restores_count() {
    let h = Harness::new();
    let author = h.register("author", "author@x.com");
    let fan = h.register("fan", "fan@x.com");
    let question = ask(&h, author, "q");
    let reply = answer(&h, author, question, "a");

    toggle(&h, author, reply);
    let before = h.count("SELECT COUNT(*) FROM answer_likes", []);

    let first = toggle(&h, fan, reply);
    assert_eq!(first["action"], "added");
    assert_eq!(first["like_count"], before + 1);

    let second = toggle(&h, fan, reply);
    assert_eq!(second["action"], "removed");
    assert_eq!(second["like_count"], before);

    assert_eq!(toggle(&h, fan, reply)["action"], "added");
}

#[test]
fn test_answers_ranked_by_likes() {
    let h = Harness::new();
    let author = h.register("author", "author@x.com");
    let fans: Vec<i64> = (0..5)
        .map(|i| h.register(&format!("fan{i}"), &format!("fan{i}@x.com")))
        .collect();

    let question = ask(&h, author, "Best bank?");
    let three = answer(&h, author, question, "three likes");
    let five = answer(&h, author, question, "five likes");
    let none = answer(&h, author, question, "no likes");

    for fan in &fans[..3] {
        toggle(&h, *fan, three);
    }
    for fan in &fans {
        toggle(&h, *fan, five);
    }

    let detail = ok(&h.community.handle(&get(&format!("question/{question}"))));
    assert_eq!(detail["title"], "Best bank?");
    assert_eq!(detail["username"], "author");

    let answers = detail["answers"].as_array().unwrap();
    let order: Vec<i64> = answers.iter().map(|a| a["id"].as_i64().unwrap()).collect();
    assert_eq!(order, vec![five, three, none]);
    assert_eq!(answers[0]["like_count"], 5);
    assert_eq!(answers[0]["liked_by"], json!(fans));
    assert_eq!(answers[1]["liked_by"], json!(&fans[..3]));
    assert_eq!(answers[2]["liked_by"], json!([]));
}

#[test]
fn test_question_not_found() {
    let h = Harness::new();
    assert_eq!(
        domain_error(&h.community.handle(&get("question/42"))),
        "Question not found"
    );

    let reply = h.community.handle(&get("question/forty-two"));
    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[test]
fn test_writes_require_caller() {
    let h = Harness::new();
    for path in ["question", "answer", "like"] {
        let reply = h.community.handle(&post(path, &json!({})));
        assert_eq!(domain_error(&reply), "User ID required", "path {path}");
    }
}

#[test]
fn test_malformed_body_is_internal_failure() {
    let h = Harness::new();
    for path in ["question", "answer", "like", "user"] {
        let mut event = post(path, &json!({}));
        event.body = Some("{".into());
        let reply = h.community.handle(&event);
        assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR, "path {path}");
    }
}

#[test]
fn test_user_upsert_by_email() {
    let h = Harness::new();

    let first = ok(&h.community.handle(&post(
        "user",
        &json!({ "username": "guest", "email": "guest@x.com", "ip_address": "1.2.3.4" }),
    )));
    assert_eq!(first["success"], true);
    let id = first["user_id"].as_i64().unwrap();

    let second = ok(&h.community.handle(&post(
        "user",
        &json!({ "username": "renamed", "email": "guest@x.com", "avatar_url": "a.png",
                 "is_premium": true }),
    )));
    assert_eq!(second["user_id"], id);
    assert_eq!(h.count("SELECT COUNT(*) FROM users", []), 1);
    assert_eq!(
        h.count(
            "SELECT COUNT(*) FROM users
             WHERE username = 'renamed' AND is_premium = 1 AND ip_address IS NULL",
            []
        ),
        1
    );
}

#[test]
fn test_routing_envelope() {
    let h = Harness::new();

    let reply = h.community.handle(&Event::new(Method::OPTIONS));
    assert_eq!(
        reply.headers[header::ACCESS_CONTROL_ALLOW_METHODS],
        "GET, POST, PUT, DELETE, OPTIONS"
    );

    assert_eq!(domain_error(&h.community.handle(&get("answers"))), "Invalid path");
    assert_eq!(
        domain_error(&h.community.handle(&post("questions", &json!({})))),
        "Invalid path"
    );
    assert_eq!(
        domain_error(&h.community.handle(&Event::new(Method::PUT).with_path("question"))),
        "Method not allowed"
    );
    assert_eq!(
        domain_error(&h.community.handle(&Event::new(Method::DELETE).with_path("like"))),
        "Method not allowed"
    );
}
