#[macro_use]
extern crate time_test;

use rocket::http::Status;
use rocket::local::asynchronous::Client;
use rocket::tokio;
use serde_json::{Value, json};

use helpdesk_api::orm::testing::{TEST_PASSWORD, test_rocket};

async fn login(client: &Client, email: &str, password: &str) {
    let response = client
        .post("/api/auth/login")
        .json(&json!({ "email": email, "password": password }))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok, "login as {email}");
}

async fn get_json(client: &Client, uri: &str) -> (Status, Value) {
    let response = client.get(uri.to_string()).dispatch().await;
    let status = response.status();
    (status, response.into_json().await.unwrap_or(Value::Null))
}

/// Ids of "Unidade Central" and its "Manutenção" sector.
async fn central_unit(client: &Client) -> (i64, i64) {
    let (_, units) = get_json(client, "/api/units").await;
    let unit_id = units["units"]
        .as_array()
        .unwrap()
        .iter()
        .find(|u| u["name"] == "Unidade Central")
        .unwrap()["id"]
        .as_i64()
        .unwrap();
    let (_, sectors) = get_json(client, &format!("/api/units/{unit_id}/sectors")).await;
    let sector_id = sectors["sectors"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["name"] == "Manutenção")
        .unwrap()["id"]
        .as_i64()
        .unwrap();
    (unit_id, sector_id)
}

async fn ticket_body(client: &Client) -> Value {
    let (unit_id, sector_id) = central_unit(client).await;
    json!({
        "requester_name": "Maria Souza",
        "unit_id": unit_id,
        "sector_id": sector_id,
        "exact_location": "Sala 12",
        "points_quantity": 3,
        "responsible_user": "João",
        "observations": "Tomada solta"
    })
}

async fn open_ticket(client: &Client) -> i64 {
    let body = ticket_body(client).await;
    let response = client.post("/api/tickets").json(&body).dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    let body: Value = response.into_json().await.unwrap();
    assert_eq!(body["success"], true);
    body["ticket_id"].as_i64().unwrap()
}

async fn patch_ticket(client: &Client, id: i64, body: Value) -> (Status, Value) {
    let response = client
        .patch(format!("/api/tickets/{id}"))
        .json(&body)
        .dispatch()
        .await;
    let status = response.status();
    (status, response.into_json().await.unwrap_or(Value::Null))
}

#[tokio::test]
async fn test_requester_opens_ticket_in_aberto() {
    let client = Client::tracked(test_rocket()).await.unwrap();
    time_test!("test_requester_opens_ticket_in_aberto");
    login(&client, "requester@example.com", TEST_PASSWORD).await;

    let id = open_ticket(&client).await;
    let (status, body) = get_json(&client, &format!("/api/tickets/{id}")).await;
    assert_eq!(status, Status::Ok);
    assert_eq!(body["ticket"]["status"], "aberto");
    assert_eq!(body["ticket"]["unit_name"], "Unidade Central");
    assert_eq!(body["ticket"]["sector_name"], "Manutenção");
    assert_eq!(body["ticket"]["creator_name"], "requester");
    assert!(body["ticket"]["completed_at"].is_null());
    assert_eq!(body["history"].as_array().unwrap().len(), 1);
    assert!(body["history"][0]["old_status"].is_null());
    assert_eq!(body["history"][0]["new_status"], "aberto");
    assert_eq!(body["comments"], json!([]));
    assert_eq!(body["attachments"], json!([]));
}

#[tokio::test]
async fn test_missing_field_is_rejected_and_stores_nothing() {
    let client = Client::tracked(test_rocket()).await.unwrap();
    time_test!("test_missing_field_is_rejected_and_stores_nothing");
    login(&client, "requester@example.com", TEST_PASSWORD).await;

    let complete = ticket_body(&client).await;
    for field in [
        "requester_name",
        "unit_id",
        "sector_id",
        "exact_location",
        "points_quantity",
        "responsible_user",
    ] {
        let mut body = complete.clone();
        body.as_object_mut().unwrap().remove(field);
        let response = client.post("/api/tickets").json(&body).dispatch().await;
        assert_eq!(response.status(), Status::BadRequest, "without {field}");
    }

    let (_, list) = get_json(&client, "/api/tickets").await;
    assert_eq!(list["tickets"], json!([]));
}

#[tokio::test]
async fn test_sector_must_belong_to_unit() {
    let client = Client::tracked(test_rocket()).await.unwrap();
    time_test!("test_sector_must_belong_to_unit");
    login(&client, "requester@example.com", TEST_PASSWORD).await;

    let (_, units) = get_json(&client, "/api/units").await;
    let norte = units["units"]
        .as_array()
        .unwrap()
        .iter()
        .find(|u| u["name"] == "Unidade Norte")
        .unwrap()["id"]
        .clone();
    let mut body = ticket_body(&client).await;
    body["unit_id"] = norte;

    let response = client.post("/api/tickets").json(&body).dispatch().await;
    assert_eq!(response.status(), Status::BadRequest);
}

#[tokio::test]
async fn test_requesters_only_see_their_own_tickets() {
    let client = Client::tracked(test_rocket()).await.unwrap();
    time_test!("test_requesters_only_see_their_own_tickets");

    login(&client, "requester@example.com", TEST_PASSWORD).await;
    let first = open_ticket(&client).await;
    let second = open_ticket(&client).await;

    login(&client, "requester2@example.com", TEST_PASSWORD).await;
    let other = open_ticket(&client).await;
    let (_, list) = get_json(&client, "/api/tickets").await;
    let ids: Vec<i64> = list["tickets"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![other]);

    let (status, _) = get_json(&client, &format!("/api/tickets/{first}")).await;
    assert_eq!(status, Status::Forbidden);

    login(&client, "tech@example.com", TEST_PASSWORD).await;
    let (_, list) = get_json(&client, "/api/tickets").await;
    let ids: Vec<i64> = list["tickets"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![other, second, first]);
}

#[tokio::test]
async fn test_ticket_lookup_errors() {
    let client = Client::tracked(test_rocket()).await.unwrap();
    time_test!("test_ticket_lookup_errors");
    login(&client, "tech@example.com", TEST_PASSWORD).await;

    let (status, body) = get_json(&client, "/api/tickets/abc").await;
    assert_eq!(status, Status::BadRequest);
    assert_eq!(body["error"], "Invalid ticket id");

    let (status, body) = get_json(&client, "/api/tickets/9999").await;
    assert_eq!(status, Status::NotFound);
    assert_eq!(body["error"], "Ticket not found");
}

#[tokio::test]
async fn test_requester_patch_is_always_forbidden() {
    let client = Client::tracked(test_rocket()).await.unwrap();
    time_test!("test_requester_patch_is_always_forbidden");
    login(&client, "requester@example.com", TEST_PASSWORD).await;
    let id = open_ticket(&client).await;

    for body in [
        json!({ "status": "concluido" }),
        json!({}),
        json!({ "status": "nonsense", "assigned_to": "x" }),
    ] {
        let (status, _) = patch_ticket(&client, id, body).await;
        assert_eq!(status, Status::Forbidden);
    }
    let (status, _) = patch_ticket(&client, 9999, json!({ "status": "concluido" })).await;
    assert_eq!(status, Status::Forbidden);
}

#[tokio::test]
async fn test_admin_completes_ticket() {
    let client = Client::tracked(test_rocket()).await.unwrap();
    time_test!("test_admin_completes_ticket");
    login(&client, "requester@example.com", TEST_PASSWORD).await;
    let id = open_ticket(&client).await;

    login(&client, "admin@example.com", "admin").await;
    let (status, body) = patch_ticket(&client, id, json!({ "status": "concluido" })).await;
    assert_eq!(status, Status::Ok);
    assert_eq!(body["success"], true);

    let (_, detail) = get_json(&client, &format!("/api/tickets/{id}")).await;
    assert_eq!(detail["ticket"]["status"], "concluido");
    assert!(detail["ticket"]["completed_at"].is_string());
    let history = detail["history"].as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1]["old_status"], "aberto");
    assert_eq!(history[1]["new_status"], "concluido");
    assert_eq!(history[1]["changed_by_name"], "Administrator");

    // Reopening keeps the completion stamp and adds one more history row.
    let (status, _) = patch_ticket(&client, id, json!({ "status": "em_andamento" })).await;
    assert_eq!(status, Status::Ok);
    let (_, detail) = get_json(&client, &format!("/api/tickets/{id}")).await;
    assert!(detail["ticket"]["completed_at"].is_string());
    assert_eq!(detail["history"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_patch_validation() {
    let client = Client::tracked(test_rocket()).await.unwrap();
    time_test!("test_patch_validation");
    login(&client, "requester@example.com", TEST_PASSWORD).await;
    let id = open_ticket(&client).await;
    login(&client, "tech@example.com", TEST_PASSWORD).await;

    let (status, body) = patch_ticket(&client, id, json!({})).await;
    assert_eq!(status, Status::BadRequest);
    assert_eq!(body["error"], "No updates provided");

    let (status, _) = patch_ticket(&client, id, json!({ "status": "aberto" })).await;
    assert_eq!(status, Status::BadRequest);

    let (status, _) = patch_ticket(&client, id, json!({ "status": "fechado" })).await;
    assert_eq!(status, Status::BadRequest);

    let (status, _) = patch_ticket(&client, 9999, json!({ "status": "concluido" })).await;
    assert_eq!(status, Status::NotFound);

    let (_, users) = get_json(&client, "/api/auth/user").await;
    let me = users["user"]["id"].clone();
    let (status, _) = patch_ticket(&client, id, json!({ "assigned_to": me })).await;
    assert_eq!(status, Status::Ok);

    let (_, detail) = get_json(&client, &format!("/api/tickets/{id}")).await;
    assert_eq!(detail["ticket"]["assigned_to_name"], "tech");
    assert_eq!(detail["history"].as_array().unwrap().len(), 1);

    let (status, _) = patch_ticket(&client, id, json!({ "assigned_to": null })).await;
    assert_eq!(status, Status::Ok);
    let (_, detail) = get_json(&client, &format!("/api/tickets/{id}")).await;
    assert!(detail["ticket"]["assigned_to"].is_null());
}

#[tokio::test]
async fn test_tickets_cannot_be_assigned_to_requesters() {
    let client = Client::tracked(test_rocket()).await.unwrap();
    time_test!("test_tickets_cannot_be_assigned_to_requesters");
    login(&client, "requester@example.com", TEST_PASSWORD).await;
    let id = open_ticket(&client).await;
    let (_, me) = get_json(&client, "/api/auth/user").await;
    let requester_id = me["user"]["id"].clone();

    login(&client, "admin@example.com", "admin").await;
    let (status, _) = patch_ticket(&client, id, json!({ "assigned_to": requester_id })).await;
    assert_eq!(status, Status::BadRequest);
}
