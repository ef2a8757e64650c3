use super::*;
use shared::domain::END_DEST;

fn sample_exploration(id: &str) -> Exploration {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "title": "A title",
        "category": "A category",
        "init_state_name": "First",
        "states": {
            "First": {
                "content": [{ "type": "text", "value": "Hello" }],
                "widget": {
                    "widget_id": "Continue",
                    "handlers": [{
                        "name": "submit",
                        "rule_specs": [{ "definition": { "rule": "Default" }, "dest": END_DEST }]
                    }]
                }
            }
        }
    }))
    .expect("exploration")
}

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn saving_twice_bumps_version_and_keeps_rights() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let owner = storage.create_user("owner@example.com").await.expect("user");
    let mut exploration = sample_exploration("eid");

    assert_eq!(
        storage
            .save_exploration(&exploration, Some(owner), false)
            .await
            .expect("save"),
        1
    );
    exploration.title = "Renamed".into();
    assert_eq!(
        storage
            .save_exploration(&exploration, None, true)
            .await
            .expect("save"),
        2
    );

    let stored = storage
        .get_exploration(&exploration.id)
        .await
        .expect("load")
        .expect("exists");
    assert_eq!(stored.exploration.title, "Renamed");
    assert_eq!(stored.owner_user_id, Some(owner));
    assert!(!stored.is_public);
    assert_eq!(stored.version, 2);
}

#[tokio::test]
async fn public_listing_is_ordered_by_id() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    for id in ["2", "0", "1"] {
        storage
            .save_exploration(&sample_exploration(id), None, true)
            .await
            .expect("save");
    }
    storage
        .save_exploration(&sample_exploration("private"), None, false)
        .await
        .expect("save");

    let ids: Vec<_> = storage
        .list_public_explorations()
        .await
        .expect("list")
        .into_iter()
        .map(|(id, _)| id.0)
        .collect();
    assert_eq!(ids, vec!["0", "1", "2"]);

    assert!(storage
        .publish_exploration(&ExplorationId::new("private"))
        .await
        .expect("publish"));
    assert_eq!(storage.list_public_explorations().await.expect("list").len(), 4);
}

#[tokio::test]
async fn deleting_an_exploration_drops_its_editors() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let editor = storage.create_user("editor@example.com").await.expect("user");
    let exploration = sample_exploration("eid");
    storage
        .save_exploration(&exploration, None, false)
        .await
        .expect("save");
    storage.add_editor(&exploration.id, editor).await.expect("editor");
    assert!(storage.is_editor(&exploration.id, editor).await.expect("check"));

    assert!(storage.delete_exploration(&exploration.id).await.expect("delete"));
    assert!(storage.get_exploration(&exploration.id).await.expect("load").is_none());
    assert!(!storage.is_editor(&exploration.id, editor).await.expect("check"));
}

#[tokio::test]
async fn usernames_are_unique_ignoring_case() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let alice = storage.create_user("alice@example.com").await.expect("user");
    let bob = storage.create_user("bob@example.com").await.expect("user");

    assert_eq!(
        storage.complete_onboarding(alice, Some("Alice")).await.expect("claim"),
        UsernameClaim::Claimed
    );
    assert_eq!(
        storage.complete_onboarding(bob, Some("alice")).await.expect("claim"),
        UsernameClaim::Taken
    );
    assert_eq!(
        storage.complete_onboarding(alice, Some("ALICE")).await.expect("claim"),
        UsernameClaim::Claimed
    );

    let user = storage.get_user(alice).await.expect("load").expect("exists");
    assert_eq!(user.username.as_deref(), Some("ALICE"));
    assert!(user.agreed_to_terms);
}

#[tokio::test]
async fn clashing_username_leaves_terms_unaccepted() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let first = storage.create_user("first@example.com").await.expect("user");
    let second = storage.create_user("second@example.com").await.expect("user");

    assert_eq!(
        storage.complete_onboarding(first, Some("Bob")).await.expect("claim"),
        UsernameClaim::Claimed
    );
    assert_eq!(
        storage.complete_onboarding(second, Some("BOB")).await.expect("clash is not an error"),
        UsernameClaim::Taken
    );

    let user = storage.get_user(second).await.expect("load").expect("exists");
    assert!(user.username.is_none());
    assert!(!user.agreed_to_terms);
}

#[tokio::test]
async fn terms_alone_keep_the_existing_username() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let user_id = storage.create_user("editor@example.com").await.expect("user");
    storage
        .complete_onboarding(user_id, Some("Editor"))
        .await
        .expect("claim");
    assert_eq!(
        storage.complete_onboarding(user_id, None).await.expect("terms"),
        UsernameClaim::Claimed
    );

    let user = storage.get_user(user_id).await.expect("load").expect("exists");
    assert_eq!(user.username.as_deref(), Some("Editor"));
    assert!(user.agreed_to_terms);
}

#[tokio::test]
async fn create_user_is_idempotent_per_email() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let first = storage.create_user("same@example.com").await.expect("user");
    let second = storage.create_user("same@example.com").await.expect("user");
    assert_eq!(first, second);
    assert_eq!(
        storage
            .user_id_for_email("same@example.com")
            .await
            .expect("lookup"),
        Some(first)
    );
}

#[tokio::test]
async fn state_hits_are_grouped_per_state() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let id = ExplorationId::new("eid");
    storage.record_state_hit(&id, "First", true).await.expect("hit");
    storage.record_state_hit(&id, "First", false).await.expect("hit");
    storage.record_state_hit(&id, END_DEST, true).await.expect("hit");

    let counts = storage.state_hit_counts(&id).await.expect("counts");
    assert_eq!(counts.len(), 2);
    assert_eq!(counts[0].state_name, END_DEST);
    assert_eq!(counts[1].state_name, "First");
    assert_eq!(counts[1].first_hits, 1);
    assert_eq!(counts[1].total_hits, 2);
}

#[tokio::test]
async fn answers_and_feedback_are_logged_in_order() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let id = ExplorationId::new("eid");
    storage
        .record_answer_submitted(&id, "First", "submit", "Default", "<p>a</p>")
        .await
        .expect("answer");
    storage
        .record_answer_submitted(&id, "First", "submit", "Equals(1)", "<p>b</p>")
        .await
        .expect("answer");
    storage
        .record_reader_feedback(&id, "First", "too hard", &["First".into(), "First".into()])
        .await
        .expect("feedback");

    let answers = storage.list_answers(&id, "First").await.expect("answers");
    assert_eq!(
        answers.iter().map(|a| a.rule.as_str()).collect::<Vec<_>>(),
        vec!["Default", "Equals(1)"]
    );

    let feedback = storage.list_reader_feedback(&id).await.expect("feedback");
    assert_eq!(feedback.len(), 1);
    assert_eq!(feedback[0].feedback, "too hard");
    assert_eq!(feedback[0].state_history, vec!["First", "First"]);
}
