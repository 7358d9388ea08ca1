#[allow(dead_code)]
mod common;

use serde_json::{Value, json};

use common::{QUIZ_PRIVATE, QUIZ_SHORT, TestServer, alice, bob, carol, dave};

async fn error_message(resp: reqwest::Response) -> String {
    let body: Value = resp.json().await.unwrap();
    body["error"].as_str().unwrap_or_default().to_string()
}

#[tokio::test]
async fn health_and_readiness() {
    let server = TestServer::new().await;
    let resp = reqwest::get(format!("{}/health", server.base_url()))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["connections"]["sse"], 0);

    let resp = reqwest::get(format!("{}/ready", server.base_url()))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "ready");
}

#[tokio::test]
async fn requests_need_a_valid_identity() {
    let server = TestServer::new().await;
    let client = reqwest::Client::new();
    let url = server.url(&format!("/quiz/{QUIZ_SHORT}/room"));
    let settings = json!({ "playerCount": 2, "gameMode": "scrum" });

    let resp = client.post(&url).json(&settings).send().await.unwrap();
    assert_eq!(resp.status(), 401);

    let resp = client
        .post(&url)
        .bearer_auth("1.deadbeef")
        .json(&settings)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    // Correctly signed, but for a user the store does not know.
    let resp = client
        .post(&url)
        .bearer_auth(server.token(99))
        .json(&settings)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn create_room_validation() {
    let server = TestServer::new().await;
    let scrum = json!({ "playerCount": 2, "gameMode": "scrum" });

    let resp = server.post(&alice(), "/quiz/abc/room", scrum.clone()).await;
    assert_eq!(resp.status(), 400);
    assert!(error_message(resp).await.contains("abc"));

    let resp = server.post(&alice(), "/quiz/99/room", scrum.clone()).await;
    assert_eq!(resp.status(), 404);

    let resp = server
        .post(&alice(), &format!("/quiz/{QUIZ_PRIVATE}/room"), scrum.clone())
        .await;
    assert_eq!(resp.status(), 403);

    let path = format!("/quiz/{QUIZ_SHORT}/room");
    let resp = server
        .post(&alice(), &path, json!({ "playerCount": 0, "gameMode": "scrum" }))
        .await;
    assert_eq!(resp.status(), 400);

    let resp = server
        .post(&alice(), &path, json!({ "playerCount": 2, "gameMode": "team" }))
        .await;
    assert_eq!(resp.status(), 400);

    let resp = server
        .post(&alice(), &path, json!({ "playerCount": 2, "gameMode": "relay" }))
        .await;
    assert_eq!(resp.status(), 400);

    let resp = server.post(&alice(), &path, scrum).await;
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    let id = body["id"].as_str().unwrap();
    assert_eq!(id.split('-').count(), 3);
}

#[tokio::test]
async fn unknown_room_is_404() {
    let server = TestServer::new().await;
    for path in ["/room/no-such-room/question", "/room/no-such-room/scores", "/room/no-such-room/teams"] {
        assert_eq!(server.get(path).await.status(), 404, "{path}");
    }
    assert_eq!(server.start(&alice(), "no-such-room").await.status(), 404);
    assert_eq!(server.answer(&alice(), "no-such-room", "x").await.status(), 404);
    assert_eq!(server.join_team(&alice(), "no-such-room", "Red").await.status(), 404);
}

#[tokio::test]
async fn start_rules() {
    let server = TestServer::new().await;
    let room_id = server
        .create_room(&alice(), QUIZ_SHORT, json!({ "playerCount": 4, "gameMode": "scrum" }))
        .await;
    let _alice_events = server.join(&alice(), &room_id).await;

    assert_eq!(server.start(&alice(), &room_id).await.status(), 403);
    assert_eq!(server.answer(&alice(), &room_id, "A1").await.status(), 403);

    let _bob_events = server.join(&bob(), &room_id).await;
    assert_eq!(server.start(&bob(), &room_id).await.status(), 403);

    let resp = server.start(&alice(), &room_id).await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert!(body["message"].is_string());

    assert_eq!(server.start(&alice(), &room_id).await.status(), 403);
}

#[tokio::test]
async fn answer_rules() {
    let server = TestServer::new().await;
    let room_id = server
        .create_room(&alice(), QUIZ_SHORT, json!({ "playerCount": 3, "gameMode": "scrum" }))
        .await;
    let _a = server.join(&alice(), &room_id).await;
    let _b = server.join(&bob(), &room_id).await;
    let mut carol_events = server.join(&carol(), &room_id).await;
    carol_events.next_of("quizInfos").await;

    let resp = server.answer(&dave(), &room_id, "A1").await;
    assert_eq!(resp.status(), 404);

    let resp = server.answer(&bob(), &room_id, "B1").await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["correctAnswer"], "A1");
    assert_eq!(server.answer(&bob(), &room_id, "A1").await.status(), 403);

    assert_eq!(server.answer(&alice(), &room_id, "A1").await.status(), 200);
    let resp = server.answer(&carol(), &room_id, "A1").await;
    assert_eq!(resp.status(), 403);
    assert!(error_message(resp).await.contains("resolved"));

    let resp = server
        .post(&carol(), &format!("/room/{room_id}/answer"), json!({ "reply": "A1" }))
        .await;
    assert_eq!(resp.status(), 400);
}
