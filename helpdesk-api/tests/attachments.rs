#[macro_use]
extern crate time_test;

use rocket::http::{ContentType, Status};
use rocket::local::asynchronous::Client;
use rocket::tokio;
use serde_json::{Value, json};

use helpdesk_api::config::AppConfig;
use helpdesk_api::orm::testing::{TEST_PASSWORD, test_rocket};

const BOUNDARY: &str = "X-HELPDESK-BOUNDARY";

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

async fn open_ticket(client: &Client) -> i64 {
    let (_, units) = get_json(client, "/api/units").await;
    let unit_id = units["units"][0]["id"].as_i64().unwrap();
    let (_, sectors) = get_json(client, &format!("/api/units/{unit_id}/sectors")).await;
    let sector_id = sectors["sectors"][0]["id"].as_i64().unwrap();

    let response = client
        .post("/api/tickets")
        .json(&json!({
            "requester_name": "Maria Souza",
            "unit_id": unit_id,
            "sector_id": sector_id,
            "exact_location": "Sala 7",
            "points_quantity": 1,
            "responsible_user": "Carlos"
        }))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let body: Value = response.into_json().await.unwrap();
    body["ticket_id"].as_i64().unwrap()
}

fn multipart_content_type() -> ContentType {
    ContentType::new("multipart", "form-data").with_params(("boundary", BOUNDARY))
}

fn file_part(field: &str, filename: &str, mime: &str, content: &[u8]) -> Vec<u8> {
    let mut body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
         Content-Type: {mime}\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

async fn upload(client: &Client, ticket_id: i64, body: Vec<u8>) -> (Status, Value) {
    let response = client
        .post(format!("/api/tickets/{ticket_id}/attachments"))
        .header(multipart_content_type())
        .body(body)
        .dispatch()
        .await;
    let status = response.status();
    (status, response.into_json().await.unwrap_or(Value::Null))
}

fn stored_files(client: &Client) -> usize {
    let config = client.rocket().state::<AppConfig>().unwrap();
    std::fs::read_dir(&config.upload_dir)
        .map(|entries| entries.count())
        .unwrap_or(0)
}

#[tokio::test]
async fn test_upload_list_and_download() {
    let client = Client::tracked(test_rocket()).await.unwrap();
    time_test!("test_upload_list_and_download");
    login(&client, "requester@example.com", TEST_PASSWORD).await;
    let ticket_id = open_ticket(&client).await;

    let content = b"%PDF-1.4 fake report";
    let body = file_part("file", "relatorio final (1).pdf", "application/pdf", content);
    let (status, created) = upload(&client, ticket_id, body).await;
    assert_eq!(status, Status::Ok);
    assert_eq!(created["success"], true);
    let attachment = &created["attachment"];
    assert_eq!(attachment["original_filename"], "relatorio final (1).pdf");
    assert_eq!(attachment["mime_type"], "application/pdf");
    assert_eq!(attachment["size"], content.len() as i64);
    let stored_name = attachment["filename"].as_str().unwrap();
    assert!(stored_name.ends_with("-relatorio_final__1_.pdf"));
    assert_eq!(stored_files(&client), 1);

    let (status, list) = get_json(&client, &format!("/api/tickets/{ticket_id}/attachments")).await;
    assert_eq!(status, Status::Ok);
    let attachments = list["attachments"].as_array().unwrap();
    assert_eq!(attachments.len(), 1);
    assert_eq!(attachments[0]["uploaded_by_name"], "requester");
    let attachment_id = attachments[0]["id"].as_i64().unwrap();

    let response = client
        .get(format!(
            "/api/tickets/{ticket_id}/attachments/{attachment_id}/file"
        ))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(response.content_type(), Some(ContentType::PDF));
    assert_eq!(
        response.headers().get_one("Content-Disposition"),
        Some("attachment; filename=\"relatorio final (1).pdf\"")
    );
    assert_eq!(response.into_bytes().await.unwrap(), content.to_vec());

    // Uploads by the requester notify the admin.
    login(&client, "admin@example.com", "admin").await;
    let (_, body) = get_json(&client, "/api/notifications").await;
    assert!(
        body["notifications"]
            .as_array()
            .unwrap()
            .iter()
            .any(|n| n["type"] == "anexo" && n["ticket_id"] == ticket_id)
    );
}

#[tokio::test]
async fn test_empty_upload_is_rejected() {
    let client = Client::tracked(test_rocket()).await.unwrap();
    time_test!("test_empty_upload_is_rejected");
    login(&client, "requester@example.com", TEST_PASSWORD).await;
    let ticket_id = open_ticket(&client).await;

    let empty_file = file_part("file", "empty.txt", "text/plain", b"");
    let (status, body) = upload(&client, ticket_id, empty_file).await;
    assert_eq!(status, Status::BadRequest);
    assert_eq!(body["error"], "No file uploaded");

    let no_file = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"note\"\r\n\r\n\
         hello\r\n--{BOUNDARY}--\r\n"
    )
    .into_bytes();
    let (status, body) = upload(&client, ticket_id, no_file).await;
    assert_eq!(status, Status::BadRequest);
    assert_eq!(body["error"], "No file uploaded");

    let (_, list) = get_json(&client, &format!("/api/tickets/{ticket_id}/attachments")).await;
    assert_eq!(list["attachments"], json!([]));
    assert_eq!(stored_files(&client), 0);
}

#[tokio::test]
async fn test_attachment_access_follows_ticket_access() {
    let client = Client::tracked(test_rocket()).await.unwrap();
    time_test!("test_attachment_access_follows_ticket_access");
    login(&client, "requester@example.com", TEST_PASSWORD).await;
    let ticket_id = open_ticket(&client).await;
    let body = file_part("file", "foto.jpg", "image/jpeg", b"\xff\xd8\xff\xe0");
    let (status, created) = upload(&client, ticket_id, body).await;
    assert_eq!(status, Status::Ok);
    let attachment_id = created["attachment"]["id"].as_i64().unwrap();

    login(&client, "requester2@example.com", TEST_PASSWORD).await;
    let (status, _) = get_json(&client, &format!("/api/tickets/{ticket_id}/attachments")).await;
    assert_eq!(status, Status::Forbidden);
    let response = client
        .get(format!(
            "/api/tickets/{ticket_id}/attachments/{attachment_id}/file"
        ))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Forbidden);

    // Someone else's ticket is refused before the upload is inspected.
    let empty_file = file_part("file", "empty.txt", "text/plain", b"");
    let (status, body) = upload(&client, ticket_id, empty_file).await;
    assert_eq!(status, Status::Forbidden);
    assert_eq!(body["error"], "You do not have access to this ticket");
    let (status, _) = upload(&client, 9999, file_part("file", "a.txt", "text/plain", b"")).await;
    assert_eq!(status, Status::NotFound);

    login(&client, "tech@example.com", TEST_PASSWORD).await;
    let response = client
        .get(format!("/api/tickets/{ticket_id}/attachments/9999/file"))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::NotFound);
}
