mod common;

use axum::http::{Method, StatusCode, header};
use bizboard_api::Event;
use common::{Harness, domain_error, get, ok, post, put};
use serde_json::{Value, json};

fn create_business(h: &Harness, owner: i64, body: Value) -> Value {
    ok(&h.businesses.handle(&post("business", &body).with_user(owner)))
}

fn new_business(h: &Harness, owner: i64, body: Value) -> i64 {
    create_business(h, owner, body)["business_id"].as_i64().unwrap()
}

fn add_transaction(h: &Harness, user: i64, business_id: i64, kind: &str, amount: f64) {
    let body = json!({
        "business_id": business_id, "type": kind, "amount": amount, "category": "sales",
    });
    ok(&h.businesses.handle(&post("transaction", &body).with_user(user)));
}

#[test]
fn test_create_online_business_auto_joins_owner() {
    let h = Harness::new();
    let owner = h.register("owner", "owner@x.com");

    let created = create_business(&h, owner, json!({ "name": "Shop", "is_online": true }));
    assert_eq!(created["success"], true);
    let code = created["online_code"].as_str().unwrap();
    assert_eq!(code.len(), 20);
    assert!(code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));

    let reply = h.businesses.handle(
        &post("join-business", &json!({ "online_code": code })).with_user(owner),
    );
    assert_eq!(domain_error(&reply), "Вы уже участник этого бизнеса");
    assert_eq!(h.count("SELECT COUNT(*) FROM business_members", []), 1);
}

#[test]
fn test_offline_business_defaults() {
    let h = Harness::new();
    let owner = h.register("owner", "owner@x.com");

    let created = create_business(&h, owner, json!({ "name": "Garage" }));
    assert!(created["online_code"].is_null());
    let id = created["business_id"].as_i64().unwrap();

    let detail = ok(&h.businesses.handle(&get(&format!("business/{id}"))));
    assert_eq!(detail["name"], "Garage");
    assert_eq!(detail["description"], "");
    assert_eq!(detail["icon"], "💼");
    assert_eq!(detail["color"], "blue");
    assert_eq!(detail["member_count"], 0);
    assert_eq!(detail["members"], json!([]));
    assert!(detail["note"].is_null());
}

#[test]
fn test_join_flow() {
    let h = Harness::new();
    let owner = h.register("owner", "owner@x.com");
    let guest = h.register("guest", "guest@x.com");

    let created = create_business(&h, owner, json!({ "name": "Cafe", "is_online": true }));
    let code = created["online_code"].as_str().unwrap().to_string();
    let id = created["business_id"].as_i64().unwrap();

    let reply = h.businesses.handle(
        &post("join-business", &json!({ "online_code": "NOPE" })).with_user(guest),
    );
    assert_eq!(domain_error(&reply), "Бизнес с таким кодом не найден");

    let joined = ok(&h.businesses.handle(
        &post("join-business", &json!({ "online_code": code })).with_user(guest),
    ));
    assert_eq!(joined["business_id"], id);
    assert_eq!(joined["business_name"], "Cafe");

    let reply = h.businesses.handle(
        &post("join-business", &json!({ "online_code": code })).with_user(guest),
    );
    assert_eq!(domain_error(&reply), "Вы уже участник этого бизнеса");
    assert_eq!(
        h.count(
            "SELECT COUNT(*) FROM business_members WHERE user_id = ?1",
            [guest]
        ),
        1
    );

    add_transaction(&h, guest, id, "income", 40.0);

    // Two members must not double the balance.
    let detail = ok(&h.businesses.handle(&get(&format!("business/{id}"))));
    assert_eq!(detail["member_count"], 2);
    assert_eq!(detail["balance"], 40.0);
    let roles: Vec<(&str, &str)> = detail["members"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| (m["username"].as_str().unwrap(), m["role"].as_str().unwrap()))
        .collect();
    assert_eq!(roles, vec![("owner", "owner"), ("guest", "member")]);

    let listed = ok(&h.businesses.handle(&get("businesses").with_user(guest)));
    assert_eq!(listed["businesses"][0]["my_role"], "member");
    let listed = ok(&h.businesses.handle(&get("businesses").with_user(owner)));
    assert_eq!(listed["businesses"][0]["my_role"], "owner");
}

#[test]
fn test_list_aggregates_and_hides_archived() {
    let h = Harness::new();
    let owner = h.register("owner", "owner@x.com");

    let first = new_business(&h, owner, json!({ "name": "First" }));
    let second = new_business(&h, owner, json!({ "name": "Second", "is_online": true }));

    add_transaction(&h, owner, first, "income", 100.0);
    add_transaction(&h, owner, first, "expense", 30.0);
    add_transaction(&h, owner, first, "income", 5.5);

    let listed = ok(&h.businesses.handle(&get("businesses").with_user(owner)));
    let businesses = listed["businesses"].as_array().unwrap();
    assert_eq!(businesses.len(), 2);
    assert_eq!(businesses[0]["id"], second);
    assert_eq!(businesses[0]["transaction_count"], 0);
    assert_eq!(businesses[1]["transaction_count"], 3);
    assert_eq!(businesses[1]["balance"], 75.5);

    ok(&h.businesses.handle(
        &put("archive-business", &json!({ "business_id": second })).with_user(owner),
    ));
    let listed = ok(&h.businesses.handle(&get("businesses").with_user(owner)));
    assert_eq!(listed["businesses"].as_array().unwrap().len(), 1);

    let detail = ok(&h.businesses.handle(&get(&format!("business/{first}"))));
    assert_eq!(detail["balance"], 75.5);
}

#[test]
fn test_ownership_scoped_mutations() {
    let h = Harness::new();
    let owner = h.register("owner", "owner@x.com");
    let other = h.register("other", "other@x.com");
    let id = new_business(&h, owner, json!({ "name": "Mine", "color": "red" }));

    let reply = h.businesses.handle(
        &put("archive-business", &json!({ "business_id": id })).with_user(other),
    );
    assert_eq!(domain_error(&reply), "Business not found or access denied");
    assert_eq!(
        h.count("SELECT is_archived FROM businesses WHERE id = ?1", [id]),
        0
    );

    let reply = h.businesses.handle(
        &put("business", &json!({ "business_id": id, "name": "Stolen" })).with_user(other),
    );
    assert_eq!(domain_error(&reply), "Business not found or access denied");

    let reply = h.businesses.handle(
        &put("business", &json!({ "business_id": id + 50, "name": "Ghost" })).with_user(owner),
    );
    assert_eq!(domain_error(&reply), "Business not found or access denied");

    let reply = h.businesses.handle(
        &put("business", &json!({ "business_id": id, "name": "Renamed" })).with_user(owner),
    );
    assert_eq!(ok(&reply)["success"], true);

    let detail = ok(&h.businesses.handle(&get(&format!("business/{id}"))));
    assert_eq!(detail["name"], "Renamed");
    assert_eq!(detail["color"], "red");
}

#[test]
fn test_caller_identity_required() {
    let h = Harness::new();

    for (event, path) in [
        (get("businesses"), "businesses"),
        (post("business", &json!({ "name": "x" })), "business"),
        (post("transaction", &json!({})), "transaction"),
        (post("note", &json!({})), "note"),
        (post("join-business", &json!({})), "join-business"),
        (post("chat", &json!({})), "chat"),
        (put("business", &json!({})), "business"),
        (put("archive-business", &json!({})), "archive-business"),
    ] {
        let reply = h.businesses.handle(&event);
        assert_eq!(domain_error(&reply), "User ID required", "path {path}");
    }

    let reply = h.businesses.handle(&get("businesses").with_header(
        axum::http::HeaderName::from_static("x-user-id"),
        "not-a-number",
    ));
    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[test]
fn test_malformed_body_fails_before_caller_check() {
    let h = Harness::new();

    for mut event in [
        post("business", &json!({})),
        post("join-business", &json!({})),
        put("archive-business", &json!({})),
    ] {
        event.body = Some("{".into());
        let reply = h.businesses.handle(&event);
        assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(reply.payload().unwrap()["error"].is_string());
    }
    assert_eq!(h.count("SELECT COUNT(*) FROM businesses", []), 0);
}

#[test]
fn test_transactions_newest_date_first() {
    let h = Harness::new();
    let owner = h.register("owner", "owner@x.com");
    let id = new_business(&h, owner, json!({ "name": "Books" }));

    for (date, amount) in [
        ("2024-01-05T10:00:00Z", 1.0),
        ("2024-03-01T10:00:00Z", 2.0),
        ("2024-02-10T10:00:00Z", 3.0),
    ] {
        let body = json!({
            "business_id": id, "type": "expense", "amount": amount,
            "category": "rent", "description": "monthly", "date": date,
        });
        let created = ok(&h.businesses.handle(&post("transaction", &body).with_user(owner)));
        assert!(created["transaction_id"].is_i64());
    }

    let listed = ok(&h.businesses.handle(&get("transactions").with_query("business_id", id)));
    let amounts: Vec<f64> = listed["transactions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["amount"].as_f64().unwrap())
        .collect();
    assert_eq!(amounts, vec![2.0, 3.0, 1.0]);
    assert_eq!(listed["transactions"][0]["type"], "expense");
    assert_eq!(listed["transactions"][0]["username"], "owner");

    let listed = ok(&h.businesses.handle(&get("transactions")));
    assert_eq!(listed["transactions"], json!([]));
}

#[test]
fn test_note_is_created_then_updated() {
    let h = Harness::new();
    let owner = h.register("owner", "owner@x.com");
    let id = new_business(&h, owner, json!({ "name": "Notes" }));

    let first = ok(&h.businesses.handle(
        &post("note", &json!({ "business_id": id, "content": "draft" })).with_user(owner),
    ));
    let second = ok(&h.businesses.handle(
        &post(
            "note",
            &json!({ "business_id": id, "content": "final", "rich_text": { "bold": [0, 5] } }),
        )
        .with_user(owner),
    ));
    assert_eq!(first["note_id"], second["note_id"]);
    assert_eq!(
        h.count("SELECT COUNT(*) FROM business_notes WHERE business_id = ?1", [id]),
        1
    );

    let detail = ok(&h.businesses.handle(&get(&format!("business/{id}"))));
    assert_eq!(detail["note"]["content"], "final");
    assert_eq!(detail["note"]["rich_text"], json!({ "bold": [0, 5] }));
    assert_eq!(detail["note"]["created_by"], owner);
}

#[test]
fn test_chat_in_order() {
    let h = Harness::new();
    let owner = h.register("owner", "owner@x.com");
    let id = new_business(&h, owner, json!({ "name": "Team", "is_online": true }));

    for message in ["hello", "world"] {
        let sent = ok(&h.businesses.handle(
            &post("chat", &json!({ "business_id": id, "message": message })).with_user(owner),
        ));
        assert!(sent["created_at"].is_string());
    }

    let history = ok(&h.businesses.handle(&get("chat").with_query("business_id", id)));
    let messages: Vec<&str> = history["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["message"].as_str().unwrap())
        .collect();
    assert_eq!(messages, vec!["hello", "world"]);
    assert_eq!(history["messages"][0]["username"], "owner");
}

#[test]
fn test_advertisement_most_recent_active() {
    let h = Harness::new();

    let payload = ok(&h.businesses.handle(&get("advertisement")));
    assert!(payload["advertisement"].is_null());

    h.insert_advertisement("old", true, "2024-01-01 00:00:00.000");
    h.insert_advertisement("new", true, "2024-06-01 00:00:00.000");
    h.insert_advertisement("hidden", false, "2024-12-01 00:00:00.000");

    let payload = ok(&h.businesses.handle(&get("advertisement")));
    assert_eq!(payload["advertisement"]["title"], "new");
}

#[test]
fn test_stats() {
    let h = Harness::new();
    let owner = h.register("owner", "owner@x.com");
    let id = new_business(&h, owner, json!({ "name": "Stats" }));

    let empty = ok(&h.businesses.handle(&get("stats").with_query("business_id", id)));
    assert_eq!(empty["days_active"], 0);
    assert_eq!(empty["daily_average"], 0.0);

    add_transaction(&h, owner, id, "income", 150.0);
    add_transaction(&h, owner, id, "expense", 100.0);

    let stats = ok(&h.businesses.handle(&get("stats").with_query("business_id", id)));
    assert_eq!(stats["total_income"], 150.0);
    assert_eq!(stats["total_expenses"], 100.0);
    assert_eq!(stats["profit"], 50.0);
    assert_eq!(stats["profit_margin"], 50.0);
    assert_eq!(stats["status"], "successful");
    assert_eq!(stats["days_active"], 1);
    assert_eq!(stats["yearly_projection"], 50.0 * 365.0);

    let reply = h.businesses.handle(&get("stats").with_query("business_id", id + 9));
    assert_eq!(domain_error(&reply), "Business not found");
}

#[test]
fn test_routing_envelope() {
    let h = Harness::new();

    let reply = h.businesses.handle(&Event::new(Method::OPTIONS));
    assert!(reply.body.is_empty());
    assert_eq!(
        reply.headers[header::ACCESS_CONTROL_ALLOW_HEADERS],
        "Content-Type, X-User-Id"
    );
    assert_eq!(reply.headers[header::ACCESS_CONTROL_MAX_AGE], "86400");

    assert_eq!(domain_error(&h.businesses.handle(&get("business/999"))), "Business not found");
    assert_eq!(domain_error(&h.businesses.handle(&get("unknown"))), "Invalid path");
    assert_eq!(
        domain_error(&h.businesses.handle(&Event::new(Method::DELETE).with_path("business"))),
        "Method not allowed"
    );

    let reply = h.businesses.handle(&get("business/abc"));
    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(reply.headers[header::CONTENT_TYPE], "application/json");
}
