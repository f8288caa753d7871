// tests/post_api.rs

mod common;

use forum_core::{auth::Viewer, error::ForumError, models::Visibility};

use common::helpers::{create_test_category, create_test_topic, TestSetup};

// --- Post Tests ---

#[tokio::test]
async fn test_append_post_allocates_next_floor() {
    let setup = TestSetup::new().await;
    let category = create_test_category(&setup.forum, "general", Visibility::Normal).await;
    let created = create_test_topic(&setup.forum, category.id, "thread", "op").await;
    let topic_id = created.topic.id;

    for expected in 2..=4 {
        let post = setup
            .forum
            .append_post(Viewer::Admin, topic_id, &format!("floor {expected}"))
            .await
            .unwrap();
        assert_eq!(post.topic_id, topic_id);
        assert_eq!(post.floor, expected);
        assert_eq!(setup.floor_count(topic_id).await, expected);
    }

    assert_eq!(setup.floors(topic_id).await, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn test_append_post_missing_topic() {
    let setup = TestSetup::new().await;

    let result = setup.forum.posts.append(77, "hello?").await;

    assert!(matches!(result, Err(ForumError::NotFound("topic"))));
    assert_eq!(setup.post_count().await, 0);
}

#[tokio::test]
async fn test_append_post_empty_content() {
    let setup = TestSetup::new().await;
    let category = create_test_category(&setup.forum, "general", Visibility::Normal).await;
    let created = create_test_topic(&setup.forum, category.id, "thread", "op").await;

    let result = setup.forum.posts.append(created.topic.id, " \t ").await;

    assert!(matches!(result, Err(ForumError::Validation(_))));
    assert_eq!(setup.floor_count(created.topic.id).await, 1);
}

#[tokio::test]
async fn test_append_post_content_too_long() {
    let setup = TestSetup::with_config(|config| config.max_content_length = 8).await;
    let category = create_test_category(&setup.forum, "general", Visibility::Normal).await;
    let created = create_test_topic(&setup.forum, category.id, "thread", "op").await;

    let result = setup.forum.posts.append(created.topic.id, "way past the limit").await;

    assert!(matches!(result, Err(ForumError::Validation(_))));
    assert_eq!(setup.floors(created.topic.id).await, vec![1]);
}

#[tokio::test]
async fn test_get_post_by_floor() {
    let setup = TestSetup::new().await;
    let category = create_test_category(&setup.forum, "general", Visibility::Normal).await;
    let created = create_test_topic(&setup.forum, category.id, "thread", "op").await;
    let reply = setup.forum.posts.append(created.topic.id, "reply").await.unwrap();

    let fetched = setup.forum.posts.get(created.topic.id, 2).await.unwrap().unwrap();
    assert_eq!(fetched, reply);

    let opening = setup.forum.posts.get(created.topic.id, 1).await.unwrap().unwrap();
    assert_eq!(opening, created.post);

    assert!(setup.forum.posts.get(created.topic.id, 3).await.unwrap().is_none());
}

#[tokio::test]
async fn test_update_post_content() {
    let setup = TestSetup::new().await;
    let category = create_test_category(&setup.forum, "general", Visibility::Normal).await;
    let created = create_test_topic(&setup.forum, category.id, "thread", "op").await;
    let reply = setup.forum.posts.append(created.topic.id, "typo").await.unwrap();

    let updated = setup
        .forum
        .update_post(Viewer::Admin, created.topic.id, 2, "fixed")
        .await
        .unwrap();

    assert_eq!(updated.id, reply.id);
    assert_eq!(updated.floor, 2);
    assert_eq!(updated.topic_id, created.topic.id);
    assert_eq!(updated.content, "fixed");
    assert!(updated.updated_at >= reply.updated_at);
    // Other floors are untouched
    let opening = setup.forum.posts.get(created.topic.id, 1).await.unwrap().unwrap();
    assert_eq!(opening.content, "op");
}

#[tokio::test]
async fn test_update_post_not_found() {
    let setup = TestSetup::new().await;
    let category = create_test_category(&setup.forum, "general", Visibility::Normal).await;
    let created = create_test_topic(&setup.forum, category.id, "thread", "op").await;

    let wrong_floor = setup.forum.posts.update(created.topic.id, 9, "nope").await;
    let wrong_topic = setup.forum.posts.update(created.topic.id + 1, 1, "nope").await;

    assert!(matches!(wrong_floor, Err(ForumError::NotFound("post"))));
    assert!(matches!(wrong_topic, Err(ForumError::NotFound("post"))));
}

#[tokio::test]
async fn test_update_post_empty_content() {
    let setup = TestSetup::new().await;
    let category = create_test_category(&setup.forum, "general", Visibility::Normal).await;
    let created = create_test_topic(&setup.forum, category.id, "thread", "op").await;

    let result = setup.forum.posts.update(created.topic.id, 1, "").await;

    assert!(matches!(result, Err(ForumError::Validation(_))));
}

#[tokio::test]
async fn test_delete_post_leaves_permanent_gap() {
    let setup = TestSetup::new().await;
    let category = create_test_category(&setup.forum, "general", Visibility::Normal).await;
    let created = create_test_topic(&setup.forum, category.id, "thread", "op").await;
    let topic_id = created.topic.id;
    setup.forum.posts.append(topic_id, "two").await.unwrap();
    setup.forum.posts.append(topic_id, "three").await.unwrap();

    setup.forum.delete_post(Viewer::Admin, topic_id, 2).await.unwrap();

    assert_eq!(setup.floors(topic_id).await, vec![1, 3]);
    assert_eq!(setup.floor_count(topic_id).await, 3);
    let third = setup.forum.posts.get(topic_id, 3).await.unwrap().unwrap();
    assert_eq!(third.content, "three");

    // The freed floor is never handed out again
    let next = setup.forum.posts.append(topic_id, "four").await.unwrap();
    assert_eq!(next.floor, 4);
    assert_eq!(setup.floors(topic_id).await, vec![1, 3, 4]);
}

#[tokio::test]
async fn test_delete_latest_post_does_not_reuse_floor() {
    let setup = TestSetup::new().await;
    let category = create_test_category(&setup.forum, "general", Visibility::Normal).await;
    let created = create_test_topic(&setup.forum, category.id, "thread", "op").await;
    let topic_id = created.topic.id;
    setup.forum.posts.append(topic_id, "two").await.unwrap();

    setup.forum.posts.delete(topic_id, 2).await.unwrap();
    let next = setup.forum.posts.append(topic_id, "again").await.unwrap();

    assert_eq!(next.floor, 3);
}

#[tokio::test]
async fn test_delete_post_not_found() {
    let setup = TestSetup::new().await;
    let category = create_test_category(&setup.forum, "general", Visibility::Normal).await;
    let created = create_test_topic(&setup.forum, category.id, "thread", "op").await;

    let result = setup.forum.posts.delete(created.topic.id, 2).await;
    assert!(matches!(result, Err(ForumError::NotFound("post"))));

    setup.forum.posts.delete(created.topic.id, 1).await.unwrap();
    let again = setup.forum.posts.delete(created.topic.id, 1).await;
    assert!(matches!(again, Err(ForumError::NotFound("post"))));
}

#[tokio::test]
async fn test_append_conflict_is_retried_once_then_surfaced() {
    let setup = TestSetup::new().await;
    let category = create_test_category(&setup.forum, "general", Visibility::Normal).await;
    let created = create_test_topic(&setup.forum, category.id, "thread", "op").await;
    let topic_id = created.topic.id;

    // Squat on the next two floors behind the counter's back
    for floor in [2, 3] {
        sqlx::query(
            "INSERT INTO posts (topic_id, floor, updated_at, content) VALUES (?1, ?2, '2024-01-01T00:00:00Z', 'squatter')",
        )
        .bind(topic_id)
        .bind(floor)
        .execute(&setup.pool)
        .await
        .unwrap();
    }

    let result = setup.forum.posts.append(topic_id, "blocked").await;

    assert!(matches!(result, Err(ForumError::Conflict { .. })));
    // Both attempts rolled back their increments
    assert_eq!(setup.floor_count(topic_id).await, 1);
    assert_eq!(
        setup
            .count_where("SELECT COUNT(*) FROM posts WHERE content = 'blocked' AND topic_id = ?1", topic_id)
            .await,
        0
    );
}

#[tokio::test]
async fn test_append_continues_from_counter_after_concurrent_commit() {
    let setup = TestSetup::new().await;
    let category = create_test_category(&setup.forum, "general", Visibility::Normal).await;
    let created = create_test_topic(&setup.forum, category.id, "thread", "op").await;
    let topic_id = created.topic.id;

    // A post on floor 2 with the counter already moved past it: the state a
    // committed concurrent append leaves behind.
    sqlx::query(
        "INSERT INTO posts (topic_id, floor, updated_at, content) VALUES (?1, 2, '2024-01-01T00:00:00Z', 'earlier')",
    )
    .bind(topic_id)
    .execute(&setup.pool)
    .await
    .unwrap();
    sqlx::query("UPDATE topics SET floor_count = 2 WHERE id = ?1")
        .bind(topic_id)
        .execute(&setup.pool)
        .await
        .unwrap();

    let post = setup.forum.posts.append(topic_id, "next").await.unwrap();

    assert_eq!(post.floor, 3);
    assert_eq!(setup.floors(topic_id).await, vec![1, 2, 3]);
    assert_eq!(setup.floor_count(topic_id).await, 3);
}
