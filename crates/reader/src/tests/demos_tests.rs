use super::*;

#[tokio::test]
async fn every_bundled_demo_is_valid() {
    let ctx = crate::test_context().await;
    for id in demo_ids() {
        let exploration = parse_demo(&ExplorationId::new(id)).expect("demo parses");
        validate_exploration(&ctx, &exploration).expect("demo validates");
    }
}

#[tokio::test]
async fn loading_missing_demos_is_idempotent() {
    let ctx = crate::test_context().await;
    assert_eq!(load_missing_demos(&ctx).await.expect("load"), 3);
    assert_eq!(load_missing_demos(&ctx).await.expect("reload"), 0);

    let stored = ctx
        .storage
        .get_exploration(&ExplorationId::new("0"))
        .await
        .expect("get")
        .expect("welcome demo");
    assert!(stored.is_public);
    assert_eq!(stored.owner_user_id, None);
    assert_eq!(stored.exploration.title, "Welcome to Oppia!");
}

#[tokio::test]
async fn deleted_demos_can_be_reloaded() {
    let ctx = crate::test_context().await;
    let id = ExplorationId::new("6");
    load_demo(&ctx, &id).await.expect("load");
    delete_demo(&ctx, &id).await.expect("delete");
    assert!(ctx.storage.get_exploration(&id).await.expect("get").is_none());
    assert_eq!(load_missing_demos(&ctx).await.expect("load"), 3);
}

#[tokio::test]
async fn only_bundled_ids_are_demos() {
    let ctx = crate::test_context().await;
    let err = delete_demo(&ctx, &ExplorationId::new("42"))
        .await
        .expect_err("not a demo");
    assert_eq!(err.code, shared::error::ErrorCode::NotFound);
    assert!(parse_demo(&ExplorationId::new("42")).is_err());
}
