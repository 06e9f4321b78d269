use std::sync::{Arc, Mutex};
use std::time::Duration;

use follow_core::{
    Completeness, CooldownSettings, DelayRange, Direction, HarvestSettings, Identifier,
    RateSignalMonitor, TargetProfile,
};
use follow_engine::{
    Credentials, EngineEvent, FailureKind, Humanizer, ListHarvester, ProgressSink, RelationSource,
    SeverStep, TargetDriver, Throttle, WebSession, WebSettings,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct TestSink {
    events: Arc<Mutex<Vec<EngineEvent>>>,
}

impl ProgressSink for TestSink {
    fn emit(&self, event: EngineEvent) {
        self.events.lock().unwrap().push(event);
    }
}

async fn connect(server: &MockServer, csrf: Option<&str>) -> WebSession {
    let settings = WebSettings {
        base_url: server.uri(),
        ..WebSettings::default()
    };
    let credentials = Credentials {
        username: "owner".to_string(),
        session_id: "sess-1".to_string(),
        csrf_token: csrf.map(str::to_string),
    };
    WebSession::connect(settings, credentials).await.unwrap()
}

fn profile(id: &str, private: bool, followed: bool) -> serde_json::Value {
    json!({
        "data": {
            "user": {
                "id": id,
                "is_private": private,
                "followed_by_viewer": followed,
                "edge_follow": { "count": 3 },
                "edge_followed_by": { "count": 120 }
            }
        }
    })
}

async fn mount_profile(server: &MockServer, username: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/api/v1/users/web_profile_info/"))
        .and(query_param("username", username))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

fn quick_settings() -> HarvestSettings {
    let instant = DelayRange::from_millis(0, 0);
    HarvestSettings {
        round_delay: instant,
        settle_delay: instant,
        retry_delay: instant,
        ..HarvestSettings::default()
    }
}

fn quick_throttle() -> Throttle {
    let blink = Duration::from_millis(1);
    Throttle::new(
        RateSignalMonitor::default(),
        CooldownSettings {
            min: blink,
            max: blink,
            tick: blink,
        },
        Humanizer::seeded(3),
    )
}

fn id(handle: &str) -> Identifier {
    Identifier::parse(handle).unwrap()
}

#[tokio::test]
async fn harvests_every_page_of_the_following_list() {
    let server = MockServer::start().await;
    mount_profile(&server, "owner", profile("7", false, false)).await;
    Mock::given(method("GET"))
        .and(path("/api/v1/friendships/7/following/"))
        .and(query_param("max_id", "12"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "users": [{ "username": "carol" }],
            "next_max_id": null
        })))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/friendships/7/following/"))
        .and(query_param("count", "200"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "users": [{ "username": "alice" }, { "username": "Bob" }],
            "next_max_id": "12"
        })))
        .mount(&server)
        .await;

    let mut session = connect(&server, Some("tok")).await;
    let mut throttle = Throttle::new(
        RateSignalMonitor::default(),
        CooldownSettings::default(),
        Humanizer::seeded(9),
    );
    let sink = TestSink::default();

    let harvester = ListHarvester::new(quick_settings());

    let following = harvester
        .harvest(&mut session, &id("owner"), Direction::Following, &mut throttle, &sink)
        .await
        .unwrap();

    assert_eq!(following, Identifier::collect_valid(["alice", "bob", "carol"]));
    assert!(sink.events.lock().unwrap().contains(&EngineEvent::HarvestFinished {
        direction: Direction::Following,
        collected: 3,
        completeness: Completeness::Verified {
            scraped: 3,
            expected: 3
        },
    }));
}

#[tokio::test]
async fn open_reads_the_expected_count_for_the_direction() {
    let server = MockServer::start().await;
    mount_profile(&server, "owner", profile("7", false, false)).await;
    let mut session = connect(&server, Some("tok")).await;

    session.open(&id("owner"), Direction::Followers).await.unwrap();
    assert_eq!(session.expected_count().await, Some(120));
}

#[tokio::test]
async fn visit_reports_privacy_and_relation() {
    let server = MockServer::start().await;
    mount_profile(&server, "dana", profile("42", true, true)).await;
    let mut session = connect(&server, Some("tok")).await;

    session.visit(&id("dana")).await.unwrap();
    let page = session.inspect(&id("dana")).await.unwrap();

    assert_eq!(
        page.profile,
        TargetProfile {
            private: Some(true),
            related: Some(true)
        }
    );
    assert_eq!(page.content, "", "profile payloads are not scanned");
}

#[tokio::test]
async fn unfollow_posts_with_csrf_token_and_session_cookie() {
    let server = MockServer::start().await;
    mount_profile(&server, "erin", profile("42", false, true)).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/friendships/destroy/42/"))
        .and(header("x-csrftoken", "tok"))
        .and(header("cookie", "sessionid=sess-1; csrftoken=tok"))
        .and(body_string_contains("user_id=42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })))
        .expect(1)
        .mount(&server)
        .await;
    let mut session = connect(&server, Some("tok")).await;

    session.visit(&id("erin")).await.unwrap();
    assert_eq!(session.begin_sever(&id("erin")).await.unwrap(), SeverStep::Done);
    session.confirm_sever(&id("erin")).await.unwrap();
}

#[tokio::test]
async fn refused_unfollow_is_an_interaction_failure() {
    let server = MockServer::start().await;
    mount_profile(&server, "erin", profile("42", false, true)).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/friendships/destroy/42/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "status": "fail", "message": "feedback_required" })),
        )
        .mount(&server)
        .await;
    let mut session = connect(&server, Some("tok")).await;

    session.visit(&id("erin")).await.unwrap();
    let err = session.begin_sever(&id("erin")).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::InteractionFailed);
    assert_eq!(err.message, "feedback_required");
}

#[tokio::test]
async fn csrf_token_is_picked_up_from_the_landing_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "csrftoken=fresh; Path=/; Secure"),
        )
        .mount(&server)
        .await;
    mount_profile(&server, "erin", profile("42", false, true)).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/friendships/destroy/42/"))
        .and(header("x-csrftoken", "fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })))
        .expect(1)
        .mount(&server)
        .await;
    let mut session = connect(&server, None).await;

    session.visit(&id("erin")).await.unwrap();
    session.begin_sever(&id("erin")).await.unwrap();
}

#[tokio::test]
async fn unauthorized_and_login_redirects_mean_the_session_expired() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/users/web_profile_info/"))
        .and(query_param("username", "gone"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/users/web_profile_info/"))
        .and(query_param("username", "moved"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("location", "/accounts/login/?next=%2F"),
        )
        .mount(&server)
        .await;
    let mut session = connect(&server, Some("tok")).await;

    assert!(session.visit(&id("gone")).await.unwrap_err().is_unauthenticated());
    assert!(session.visit(&id("moved")).await.unwrap_err().is_unauthenticated());
}

#[tokio::test]
async fn throttled_visit_exposes_a_rate_limit_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/users/web_profile_info/"))
        .respond_with(ResponseTemplate::new(429).set_body_string("{}"))
        .mount(&server)
        .await;
    let mut session = connect(&server, Some("tok")).await;

    session.visit(&id("fred")).await.unwrap();
    let page = session.inspect(&id("fred")).await.unwrap();

    assert_eq!(page.profile, TargetProfile::default());
    assert!(RateSignalMonitor::default().detect(&page.content));
}

#[tokio::test]
async fn empty_and_missing_profiles_are_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/users/web_profile_info/"))
        .and(query_param("username", "blank"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    mount_profile(&server, "nobody", json!({ "data": { "user": null } })).await;
    let mut session = connect(&server, Some("tok")).await;

    let blank = session.visit(&id("blank")).await.unwrap_err();
    assert_eq!(blank.kind, FailureKind::EmptyResponse);
    let nobody = session.visit(&id("nobody")).await.unwrap_err();
    assert_eq!(nobody.kind, FailureKind::ContainerMissing);
}

#[tokio::test]
async fn oversized_bodies_are_rejected() {
    let server = MockServer::start().await;
    mount_profile(&server, "huge", profile(&"9".repeat(4096), false, true)).await;
    let settings = WebSettings {
        base_url: server.uri(),
        max_bytes: 1024,
        ..WebSettings::default()
    };
    let credentials = Credentials {
        username: "owner".to_string(),
        session_id: "sess-1".to_string(),
        csrf_token: Some("tok".to_string()),
    };
    let mut session = WebSession::connect(settings, credentials).await.unwrap();

    let err = session.visit(&id("huge")).await.unwrap_err();
    assert!(matches!(err.kind, FailureKind::TooLarge { max_bytes: 1024, .. }));
}

#[tokio::test]
async fn display_names_on_the_last_page_do_not_stall_the_harvest() {
    let server = MockServer::start().await;
    mount_profile(
        &server,
        "owner",
        json!({ "data": { "user": { "id": "7", "edge_follow": { "count": 2 } } } }),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/friendships/7/following/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "users": [
                { "username": "alice", "full_name": "Alice" },
                { "username": "bob", "full_name": "Please slow down" }
            ],
            "next_max_id": null,
            "status": "ok"
        })))
        .mount(&server)
        .await;
    let mut session = connect(&server, Some("tok")).await;
    let mut throttle = quick_throttle();
    let sink = TestSink::default();
    let harvester = ListHarvester::new(HarvestSettings {
        max_rounds: 50,
        ..quick_settings()
    });

    let following = harvester
        .harvest(&mut session, &id("owner"), Direction::Following, &mut throttle, &sink)
        .await
        .unwrap();

    assert_eq!(following, Identifier::collect_valid(["alice", "bob"]));
    assert_eq!(throttle.cooldown.cycles(), 0);
    let rounds = sink
        .events
        .lock()
        .unwrap()
        .iter()
        .filter(|e| matches!(e, EngineEvent::HarvestRound { .. }))
        .count();
    assert!(rounds < 10, "converged after {rounds} rounds");
}

#[tokio::test]
async fn biography_text_is_not_a_rate_signal() {
    let server = MockServer::start().await;
    mount_profile(
        &server,
        "gail",
        json!({
            "data": {
                "user": {
                    "id": "51",
                    "is_private": false,
                    "followed_by_viewer": true,
                    "full_name": "Action Blocked (the band)",
                    "biography": "Sold out tonight, try again later!"
                }
            },
            "status": "ok"
        }),
    )
    .await;
    let mut session = connect(&server, Some("tok")).await;

    session.visit(&id("gail")).await.unwrap();
    let page = session.inspect(&id("gail")).await.unwrap();

    assert!(!RateSignalMonitor::default().detect(&page.content));
    assert_eq!(page.profile.related, Some(true));
}

#[tokio::test]
async fn platform_notice_on_a_refused_unfollow_is_a_rate_signal() {
    let server = MockServer::start().await;
    mount_profile(&server, "erin", profile("42", false, true)).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/friendships/destroy/42/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "fail",
            "message": "feedback_required",
            "feedback_title": "Try Again Later",
            "feedback_message": "We restrict certain activity to protect our community."
        })))
        .mount(&server)
        .await;
    let mut session = connect(&server, Some("tok")).await;

    session.visit(&id("erin")).await.unwrap();
    assert!(session.begin_sever(&id("erin")).await.is_err());
    let content = session.current_content().await.unwrap();

    assert!(RateSignalMonitor::default().detect(&content));
}
