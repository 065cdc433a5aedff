//! Delivery resource cache tests

use serde_json::json;
use sqlx::SqlitePool;
use tempfile::TempDir;
use ump_common::catalogue::{create_media_item, get_media_item, NewMediaItem};
use ump_common::db::init_database;
use ump_common::delivery::{
    cache_resource, cache_video, cached_video, mark_resource_deleted, video_for_item,
    DeliveryVideo, ResourceType,
};
use ump_common::sync::{ExternalId, JWP_VIDEOS};
use ump_common::Permission;

async fn test_pool() -> (TempDir, SqlitePool) {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("ump.db")).await.unwrap();
    (dir, pool)
}

fn mock_video() -> DeliveryVideo {
    serde_json::from_value(json!({
        "key": "mock1",
        "title": "Mock 1",
        "description": "Description for mock 1",
        "date": 1234567,
        "duration": 54,
        "sms_acl": "acl:WORLD:",
        "sms_media_id": "media:1234:",
        "sources": [
            {"type": "video/mp4", "width": 1920, "height": 1080, "file": "http://cdn.invalid/vid1.mp4"},
            {"type": "video/mp4", "width": 720, "height": 406, "file": "http://cdn.invalid/vid2.mp4"}
        ]
    }))
    .unwrap()
}

#[tokio::test]
async fn test_cache_roundtrip_and_soft_delete() {
    let (_dir, pool) = test_pool().await;
    let video = mock_video();

    cache_video(&pool, &video).await.unwrap();
    assert_eq!(cached_video(&pool, "mock1").await.unwrap(), Some(video.clone()));

    assert!(mark_resource_deleted(&pool, "mock1").await.unwrap());
    assert!(!mark_resource_deleted(&pool, "mock1").await.unwrap());
    assert!(cached_video(&pool, "mock1").await.unwrap().is_none());

    // Re-caching revives the resource
    cache_video(&pool, &video).await.unwrap();
    assert!(cached_video(&pool, "mock1").await.unwrap().is_some());
}

#[tokio::test]
async fn test_channel_resource_is_not_a_video() {
    let (_dir, pool) = test_pool().await;
    cache_resource(&pool, "chan1", ResourceType::Channel, &json!({"key": "chan1"}))
        .await
        .unwrap();
    assert!(cached_video(&pool, "chan1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_video_for_item_follows_jwp_bridge() {
    let (_dir, pool) = test_pool().await;
    let item = create_media_item(&pool, &NewMediaItem::titled("x"), Permission::public())
        .await
        .unwrap();
    assert!(video_for_item(&pool, &item).await.unwrap().is_none());

    cache_video(&pool, &mock_video()).await.unwrap();
    JWP_VIDEOS
        .upsert(&pool, &ExternalId::Jwp("mock1".into()), None, Some(&item.id))
        .await
        .unwrap();

    let item = get_media_item(&pool, &item.id).await.unwrap();
    let video = video_for_item(&pool, &item).await.unwrap().unwrap();
    assert_eq!(video.sources.len(), 2);
    assert_eq!(
        video.best_download_source().unwrap().file,
        "http://cdn.invalid/vid1.mp4"
    );
}
