//! Remote tree client tests against a mocked Box API

use wiremock::matchers::{
    body_partial_json, body_string_contains, header, method, path, query_param,
};
use wiremock::{Mock, ResponseTemplate};

use boxsync_api::provider::BoxRemoteTree;
use boxsync_core::domain::{NodeKind, RemoteError, RemoteId};
use boxsync_core::ports::IRemoteTree;

use crate::common::*;

const SHA_A: &str = "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed";
const SHA_B: &str = "0a4d55a8d778e5022fab701977c5d840bbc486d0";

fn id(s: &str) -> RemoteId {
    RemoteId::new(s.to_string()).unwrap()
}

#[tokio::test]
async fn test_list_children_paginates() {
    let env = setup_box_mock().await;
    let tree = BoxRemoteTree::new(env.client.clone()).with_page_size(2);

    Mock::given(method("GET"))
        .and(path("/folders/0/items"))
        .and(query_param("offset", "0"))
        .and(query_param("limit", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "total_count": 4,
            "entries": [folder_json("5", "Photos"), file_json("11", "a.txt", SHA_A)],
            "offset": 0,
            "limit": 2
        })))
        .expect(1)
        .mount(&env.server)
        .await;

    Mock::given(method("GET"))
        .and(path("/folders/0/items"))
        .and(query_param("offset", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "total_count": 4,
            "entries": [
                file_json("12", "b.txt", SHA_B),
                { "type": "web_link", "id": "99", "name": "Bookmark" }
            ],
            "offset": 2,
            "limit": 2
        })))
        .expect(1)
        .mount(&env.server)
        .await;

    let children = tree.list_children(&RemoteId::root()).await.unwrap();
    let names: Vec<&str> = children.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(names, vec!["Photos", "a.txt", "b.txt"]);
    assert_eq!(children[0].kind, NodeKind::Folder);
    assert_eq!(children[1].content_hash.as_ref().unwrap().as_str(), SHA_A);
}

#[tokio::test]
async fn test_list_children_survives_expired_token() {
    let env = setup_box_mock().await;
    let tree = BoxRemoteTree::new(env.client.clone());

    Mock::given(method("GET"))
        .and(path("/folders/0/items"))
        .and(header("authorization", format!("Bearer {INITIAL_ACCESS}").as_str()))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&env.server)
        .await;

    Mock::given(method("GET"))
        .and(path("/folders/0/items"))
        .and(header("authorization", format!("Bearer {FRESH_ACCESS}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "total_count": 1,
            "entries": [file_json("11", "a.txt", SHA_A)],
            "offset": 0,
            "limit": 1000
        })))
        .expect(1)
        .mount(&env.server)
        .await;

    mount_refresh_endpoint(&env.server, 1).await;

    let children = tree.list_children(&RemoteId::root()).await.unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].name, "a.txt");
    assert_eq!(env.session.access_token().await.unwrap(), FRESH_ACCESS);
}

#[tokio::test]
async fn test_get_info_folder_includes_children() {
    let env = setup_box_mock().await;
    let tree = BoxRemoteTree::new(env.client.clone());

    Mock::given(method("GET"))
        .and(path("/folders/5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "type": "folder",
            "id": "5",
            "name": "Photos",
            "item_collection": {
                "total_count": 1,
                "entries": [file_json("21", "cat.jpg", SHA_A)]
            }
        })))
        .mount(&env.server)
        .await;

    let node = tree.get_info(&id("5"), NodeKind::Folder).await.unwrap();
    assert_eq!(node.name, "Photos");
    let children = node.children.unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].name, "cat.jpg");
}

#[tokio::test]
async fn test_get_info_truncated_collection_falls_back_to_listing() {
    let env = setup_box_mock().await;
    let tree = BoxRemoteTree::new(env.client.clone());

    Mock::given(method("GET"))
        .and(path("/folders/5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "type": "folder",
            "id": "5",
            "name": "Photos",
            "item_collection": {
                "total_count": 2,
                "entries": [file_json("21", "cat.jpg", SHA_A)]
            }
        })))
        .mount(&env.server)
        .await;

    Mock::given(method("GET"))
        .and(path("/folders/5/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "total_count": 2,
            "entries": [file_json("21", "cat.jpg", SHA_A), file_json("22", "dog.jpg", SHA_B)]
        })))
        .expect(1)
        .mount(&env.server)
        .await;

    let node = tree.get_info(&id("5"), NodeKind::Folder).await.unwrap();
    assert_eq!(node.children.unwrap().len(), 2);
}

#[tokio::test]
async fn test_get_info_ill_formed_id_is_parameter_error() {
    let env = setup_box_mock().await;
    let tree = BoxRemoteTree::new(env.client.clone());

    Mock::given(method("GET"))
        .and(path("/files/abc"))
        .respond_with(ResponseTemplate::new(405))
        .mount(&env.server)
        .await;

    let err = tree.get_info(&id("abc"), NodeKind::File).await.unwrap_err();
    assert!(matches!(err, RemoteError::Parameter(ref m) if m == "id(abc) is ill-formed"));
}

#[tokio::test]
async fn test_get_info_missing_item() {
    let env = setup_box_mock().await;
    let tree = BoxRemoteTree::new(env.client.clone());

    Mock::given(method("GET"))
        .and(path("/files/404"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&env.server)
        .await;

    let err = tree.get_info(&id("404"), NodeKind::File).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_create_folder_and_conflict() {
    let env = setup_box_mock().await;
    let tree = BoxRemoteTree::new(env.client.clone());

    Mock::given(method("POST"))
        .and(path("/folders"))
        .and(body_partial_json(serde_json::json!({
            "name": "Docs",
            "parent": { "id": "0" }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(folder_json("31", "Docs")))
        .mount(&env.server)
        .await;

    Mock::given(method("POST"))
        .and(path("/folders"))
        .and(body_partial_json(serde_json::json!({ "name": "Photos" })))
        .respond_with(ResponseTemplate::new(409).set_body_json(serde_json::json!({
            "type": "error",
            "status": 409,
            "code": "item_name_in_use",
            "message": "Item with the same name already exists"
        })))
        .mount(&env.server)
        .await;

    let created = tree.create_folder("Docs", &RemoteId::root()).await.unwrap();
    assert_eq!(created.id.as_str(), "31");
    assert!(created.is_folder());

    let err = tree
        .create_folder("Photos", &RemoteId::root())
        .await
        .unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn test_delete_folder_recursively() {
    let env = setup_box_mock().await;
    let tree = BoxRemoteTree::new(env.client.clone());

    Mock::given(method("DELETE"))
        .and(path("/folders/5"))
        .and(query_param("recursive", "true"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&env.server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/files/11"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&env.server)
        .await;

    tree.delete(&id("5"), NodeKind::Folder, true).await.unwrap();
    tree.delete(&id("11"), NodeKind::File, false).await.unwrap();
}

#[tokio::test]
async fn test_upload_new_file_and_version() {
    let env = setup_box_mock().await;
    let tree = BoxRemoteTree::new(env.client.clone());

    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("hello.txt");
    std::fs::write(&local, "hello world").unwrap();

    Mock::given(method("POST"))
        .and(path("/files/content"))
        .and(body_string_contains("name=\"attributes\""))
        .and(body_string_contains("\"parent\":{\"id\":\"5\"}"))
        .and(body_string_contains("hello world"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "total_count": 1,
            "entries": [file_json("41", "hello.txt", SHA_A)]
        })))
        .expect(1)
        .mount(&env.server)
        .await;

    Mock::given(method("POST"))
        .and(path("/files/41/content"))
        .and(body_string_contains("hello world"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "total_count": 1,
            "entries": [file_json("41", "hello.txt", SHA_B)]
        })))
        .expect(1)
        .mount(&env.server)
        .await;

    let created = tree.upload_file(&local, &id("5"), None).await.unwrap();
    assert_eq!(created.id.as_str(), "41");
    assert_eq!(created.content_hash.unwrap().as_str(), SHA_A);

    let version = tree
        .upload_file(&local, &id("5"), Some(&id("41")))
        .await
        .unwrap();
    assert_eq!(version.content_hash.unwrap().as_str(), SHA_B);
}

#[tokio::test]
async fn test_rename_and_move() {
    let env = setup_box_mock().await;
    let tree = BoxRemoteTree::new(env.client.clone());

    Mock::given(method("PUT"))
        .and(path("/files/11"))
        .and(body_partial_json(serde_json::json!({ "name": "b.txt" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(file_json("11", "b.txt", SHA_A)))
        .mount(&env.server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/folders/5"))
        .and(body_partial_json(serde_json::json!({ "parent": { "id": "31" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(folder_json("5", "Photos")))
        .mount(&env.server)
        .await;

    let renamed = tree.rename(&id("11"), NodeKind::File, "b.txt").await.unwrap();
    assert_eq!(renamed.name, "b.txt");

    let moved = tree
        .move_to(&id("5"), NodeKind::Folder, &id("31"))
        .await
        .unwrap();
    assert_eq!(moved.id.as_str(), "5");
}

#[tokio::test]
async fn test_download_uses_content_disposition() {
    let env = setup_box_mock().await;
    let tree = BoxRemoteTree::new(env.client.clone());
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/files/11/content"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-disposition", "attachment; filename=\"report.txt\"")
                .set_body_bytes(b"quarterly numbers".to_vec()),
        )
        .mount(&env.server)
        .await;

    let written = tree.download_file(&id("11"), dir.path()).await.unwrap();
    assert_eq!(written, dir.path().join("report.txt"));
    assert_eq!(std::fs::read(&written).unwrap(), b"quarterly numbers");
}

#[tokio::test]
async fn test_download_falls_back_to_item_name() {
    let env = setup_box_mock().await;
    let tree = BoxRemoteTree::new(env.client.clone());
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/files/12/content"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"bytes".to_vec()))
        .mount(&env.server)
        .await;

    Mock::given(method("GET"))
        .and(path("/files/12"))
        .respond_with(ResponseTemplate::new(200).set_body_json(file_json("12", "notes.md", SHA_B)))
        .expect(1)
        .mount(&env.server)
        .await;

    let written = tree
        .download_file(&id("12"), &dir.path().join("nested"))
        .await
        .unwrap();
    assert_eq!(written, dir.path().join("nested").join("notes.md"));
    assert_eq!(std::fs::read(&written).unwrap(), b"bytes");
}
