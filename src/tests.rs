//! Integration tests for the Nice Questions backend.

use std::sync::Arc;

use reqwest::Client;
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::clock::{Clock, FixedClock};
use crate::config::QuotaLimits;
use crate::db::{init_database, Repository};
use crate::illustration::testing::ScriptedSource;
use crate::illustration::IllustrationSourcer;
use crate::models::Category;
use crate::moderation::testing::{ScriptedModerator, Verdict};
use crate::pipeline::{PipelineSettings, SubmissionPipeline};
use crate::storage::LocalObjectStore;
use crate::{create_router, AppState};

const DEFAULT_LIMITS: QuotaLimits = QuotaLimits {
    max_attempts: 100,
    max_accepted: 50,
};

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    clock: Arc<FixedClock>,
    _temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        Self::with(Verdict::Accept(Category::BigQuestions), DEFAULT_LIMITS).await
    }

    async fn with(verdict: Verdict, limits: QuotaLimits) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");

        // Initialize database
        let pool = init_database(&db_path).await.expect("Failed to init DB");
        let repo = Arc::new(Repository::new(pool));

        // Bind first so stored images get reachable URLs
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        let store = LocalObjectStore::new(temp_dir.path().join("storage"), &base_url);
        let images_dir = store.images_dir();
        std::fs::create_dir_all(&images_dir).unwrap();

        let clock = Arc::new(FixedClock::at(2026, 10, 19));
        let pipeline = SubmissionPipeline::new(
            repo.clone(),
            Arc::new(ScriptedModerator::new(verdict)),
            IllustrationSourcer::new(Arc::new(ScriptedSource::new([
                "img-1", "img-2", "img-3", "img-4",
            ]))),
            Arc::new(store),
            clock.clone(),
            PipelineSettings {
                limits,
                image_max_retries: 5,
            },
        );

        let state = AppState {
            repo,
            pipeline: Arc::new(pipeline),
        };

        let app = create_router(state, &images_dir);

        // Spawn server
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        TestFixture {
            client: Client::new(),
            base_url,
            clock,
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn submit(&self, text: &str) -> (u16, Value) {
        let resp = self
            .client
            .post(self.url("/api/submit"))
            .json(&json!({ "text": text }))
            .send()
            .await
            .unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    async fn get_json(&self, path: &str) -> (u16, Value) {
        let resp = self.client.get(self.url(path)).send().await.unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

// ==================== SUBMIT TESTS ====================

#[tokio::test]
async fn test_submit_publishes_question() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture.submit("what is love").await;

    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    let question = &body["question"];
    assert_eq!(question["text"], "what is love?");
    assert_eq!(question["category"], "big-questions");
    assert_eq!(question["sourceImageId"], "img-1");
    assert_eq!(question["createdAt"], fixture.clock.now_millis());

    // The stored image is served back
    let image_url = question["imageUrl"].as_str().unwrap();
    assert!(image_url.starts_with(&fixture.url("/images/")));
    let image = fixture.client.get(image_url).send().await.unwrap();
    assert_eq!(image.status(), 200);
    assert_eq!(image.bytes().await.unwrap().as_ref(), b"img-1");

    let (_, limits) = fixture.get_json("/api/limits").await;
    assert_eq!(limits["attempts"], 1);
    assert_eq!(limits["accepted"], 1);
}

#[tokio::test]
async fn test_submit_too_short() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture.submit("hi").await;

    assert_eq!(status, 400);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"], "Question must be at least 10 characters");

    let (_, limits) = fixture.get_json("/api/limits").await;
    assert_eq!(limits["attempts"], 0);
}

#[tokio::test]
async fn test_submit_too_long() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture.submit(&"why ".repeat(60)).await;

    assert_eq!(status, 400);
    assert_eq!(body["error"], "Question must be 200 characters or less");
}

#[tokio::test]
async fn test_submit_rejected() {
    let fixture = TestFixture::with(Verdict::Reject("Not a question"), DEFAULT_LIMITS).await;

    let (status, body) = fixture.submit("buy cheap watches now").await;

    assert_eq!(status, 400);
    assert_eq!(body["rejected"], true);
    assert_eq!(body["reason"], "Not a question");
    assert_eq!(body["code"], "REJECTED");

    let (_, limits) = fixture.get_json("/api/limits").await;
    assert_eq!(limits["attempts"], 1);
    assert_eq!(limits["accepted"], 0);

    let (_, listed) = fixture.get_json("/api/questions").await;
    assert_eq!(listed["questions"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_submit_attempt_limit() {
    let limits = QuotaLimits {
        max_attempts: 2,
        max_accepted: 50,
    };
    let fixture = TestFixture::with(Verdict::Reject("Nope"), limits).await;

    for _ in 0..2 {
        let (status, _) = fixture.submit("is this a question").await;
        assert_eq!(status, 400);
    }
    let (status, body) = fixture.submit("is this a question").await;

    assert_eq!(status, 429);
    assert_eq!(body["code"], "RATE_LIMITED");
    assert_eq!(
        body["error"],
        "Daily submission limit reached. Try again tomorrow!"
    );

    let (_, limits) = fixture.get_json("/api/limits").await;
    assert_eq!(limits["limitReached"], true);
    assert_eq!(limits["attempts"], 2);
}

#[tokio::test]
async fn test_submit_accept_limit() {
    let limits = QuotaLimits {
        max_attempts: 100,
        max_accepted: 1,
    };
    let fixture = TestFixture::with(Verdict::Accept(Category::MeetYourself), limits).await;

    let (status, _) = fixture.submit("first real question").await;
    assert_eq!(status, 200);
    let (status, body) = fixture.submit("second real question").await;

    assert_eq!(status, 429);
    assert_eq!(
        body["error"],
        "Daily acceptance limit reached. Try again tomorrow!"
    );
}

#[tokio::test]
async fn test_submit_moderation_failure_is_generic_500() {
    let fixture = TestFixture::with(Verdict::Fail, DEFAULT_LIMITS).await;

    let (status, body) = fixture.submit("what is love").await;

    assert_eq!(status, 500);
    assert_eq!(body["code"], "UPSTREAM_ERROR");
    assert_eq!(body["error"], "Failed to submit question");
    assert!(body.get("rejected").is_none());
}

// ==================== QUESTION TESTS ====================

#[tokio::test]
async fn test_questions_newest_first_and_filtered() {
    let fixture = TestFixture::with(Verdict::Accept(Category::MakingFriends), DEFAULT_LIMITS).await;

    for text in ["first question here", "second question here"] {
        let (status, _) = fixture.submit(text).await;
        assert_eq!(status, 200);
        fixture.clock.advance(chrono::Duration::seconds(1));
    }

    let (status, body) = fixture.get_json("/api/questions").await;
    assert_eq!(status, 200);
    let questions = body["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 2);
    assert_eq!(questions[0]["text"], "second question here?");
    assert_ne!(questions[0]["sourceImageId"], questions[1]["sourceImageId"]);

    let (_, body) = fixture.get_json("/api/questions?category=making-friends").await;
    assert_eq!(body["questions"].as_array().unwrap().len(), 2);

    let (_, body) = fixture.get_json("/api/questions?category=big-questions").await;
    assert_eq!(body["questions"].as_array().unwrap().len(), 0);

    let (status, body) = fixture.get_json("/api/questions?category=sports").await;
    assert_eq!(status, 200);
    assert_eq!(body["questions"], json!([]));
}

#[tokio::test]
async fn test_get_question_is_idempotent() {
    let fixture = TestFixture::new().await;
    let (_, body) = fixture.submit("what is love").await;
    let id = body["question"]["id"].as_str().unwrap().to_string();

    let (status, first) = fixture.get_json(&format!("/api/question/{}", id)).await;
    let (_, second) = fixture.get_json(&format!("/api/question/{}", id)).await;

    assert_eq!(status, 200);
    assert_eq!(first, second);
    assert_eq!(first["question"], body["question"]);
}

#[tokio::test]
async fn test_get_question_not_found() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture.get_json("/api/question/nonexistent").await;

    assert_eq!(status, 404);
    assert_eq!(body["error"], "Question not found");
}

// ==================== LIMIT TESTS ====================

#[tokio::test]
async fn test_fresh_limits() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture.get_json("/api/limits").await;

    assert_eq!(status, 200);
    assert_eq!(
        body,
        json!({
            "limitReached": false,
            "attempts": 0,
            "maxAttempts": 100,
            "accepted": 0,
            "maxAccepted": 50,
        })
    );
}

#[tokio::test]
async fn test_limits_reset_on_new_day() {
    let fixture = TestFixture::new().await;
    fixture.submit("what is love").await;

    fixture.clock.advance(chrono::Duration::days(1));

    let (_, body) = fixture.get_json("/api/limits").await;
    assert_eq!(body["attempts"], 0);
    assert_eq!(body["accepted"], 0);
}
