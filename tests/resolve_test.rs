//! End-to-end resolution tests against a mocked Dropbox API.

use folder_links::listing::{build_link_index, list_all_files, LinkIndex};
use folder_links::materialize::materialize_links;
use folder_links::models::{FileEntry, MediaType};
use folder_links::resolver::resolve_folder_path;
use folder_links::{Config, DropboxClient, FolderLinkService, LinkError};
use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::json;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

const SHARED_URL: &str = "https://www.dropbox.com/scl/fo/abc123/xyz?rlkey=k&dl=0";

fn config(server: &ServerGuard) -> Config {
    Config {
        access_token: Some("legacy".to_string()),
        api_base: server.url(),
        ..Config::default()
    }
}

fn client(server: &ServerGuard) -> DropboxClient {
    DropboxClient::new(config(server)).unwrap()
}

fn entry(name: &str) -> FileEntry {
    FileEntry {
        id: format!("id:{}", name),
        name: name.to_string(),
        path: format!("/order-42/{}", name.to_lowercase()),
        path_display: format!("/Order-42/{}", name),
    }
}

fn shared_url_for(name: &str) -> String {
    format!("https://www.dropbox.com/s/{}/{}?dl=0", name.len(), name)
}

fn direct_url_for(name: &str) -> String {
    format!("https://dl.dropboxusercontent.com/s/{}/{}?dl=1", name.len(), name)
}

async fn create_link_mock(server: &mut ServerGuard, file: &FileEntry, hits: usize) -> Mock {
    server
        .mock("POST", "/sharing/create_shared_link_with_settings")
        .match_body(Matcher::PartialJson(json!({"path": file.path_display})))
        .with_status(200)
        .with_body(json!({"url": shared_url_for(&file.name)}).to_string())
        .expect(hits)
        .create_async()
        .await
}

async fn link_exists_mock(server: &mut ServerGuard, file: &FileEntry) -> Mock {
    server
        .mock("POST", "/sharing/create_shared_link_with_settings")
        .match_body(Matcher::PartialJson(json!({"path": file.path_display})))
        .with_status(409)
        .with_body(json!({"error_summary": "shared_link_already_exists/metadata/.."}).to_string())
        .create_async()
        .await
}

async fn folder_scenario(server: &mut ServerGuard) -> Vec<Mock> {
    let metadata = server
        .mock("POST", "/sharing/get_shared_link_metadata")
        .match_body(Matcher::Json(json!({"url": SHARED_URL})))
        .with_body(json!({".tag": "folder", "name": "Order-42", "url": SHARED_URL}).to_string())
        .create_async()
        .await;
    let folders = server
        .mock("POST", "/sharing/list_folders")
        .with_body(
            json!({"entries": [
                {"name": "order-42", "shared_folder_id": "42", "path_lower": "/order-42"}
            ]})
            .to_string(),
        )
        .create_async()
        .await;
    vec![metadata, folders]
}

mod end_to_end {
    use super::*;

    #[tokio::test]
    async fn resolves_folder_into_direct_links() {
        let mut server = Server::new_async().await;
        let _folder = folder_scenario(&mut server).await;
        let _mock = server
            .mock("POST", "/files/list_folder")
            .match_body(Matcher::PartialJson(json!({"path": "/order-42", "recursive": true})))
            .with_body(
                json!({
                    "entries": [
                        {".tag": "file", "id": "id:a.mp4", "name": "a.mp4", "path_lower": "/order-42/a.mp4", "path_display": "/Order-42/a.mp4"},
                        {".tag": "file", "id": "id:b.jpg", "name": "b.jpg", "path_lower": "/order-42/b.jpg", "path_display": "/Order-42/b.jpg"}
                    ],
                    "cursor": "c1",
                    "has_more": false
                })
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;
        let _mock = server
            .mock("POST", "/sharing/list_shared_links")
            .match_body(Matcher::Json(json!({})))
            .with_body(json!({"links": [], "has_more": false}).to_string())
            .create_async()
            .await;
        let create_a = create_link_mock(&mut server, &entry("a.mp4"), 1).await;
        let create_b = create_link_mock(&mut server, &entry("b.jpg"), 1).await;
        let mount = server
            .mock("POST", "/sharing/mount_folder")
            .expect(0)
            .create_async()
            .await;

        let service = FolderLinkService::new(config(&server)).unwrap();
        let mut folder = service.resolve_folder(SHARED_URL).await.unwrap();
        folder.files.sort_by(|a, b| a.name.cmp(&b.name));

        assert_eq!(folder.job_code, "Order-42");
        assert_eq!(folder.order_from, "dropbox");
        assert_eq!(folder.files.len(), 2);
        assert_eq!(folder.files[0].kind, MediaType::Video);
        assert_eq!(folder.files[0].name, "a.mp4");
        assert_eq!(folder.files[0].url, direct_url_for("a.mp4"));
        assert_eq!(folder.files[1].kind, MediaType::Image);
        assert_eq!(folder.files[1].name, "b.jpg");
        assert_eq!(folder.files[1].url, direct_url_for("b.jpg"));
        assert!(folder.files.iter().all(|f| !f.accepted));

        create_a.assert_async().await;
        create_b.assert_async().await;
        mount.assert_async().await;
    }

    #[tokio::test]
    async fn media_only_skips_other_files() {
        let mut server = Server::new_async().await;
        let _folder = folder_scenario(&mut server).await;
        let _mock = server
            .mock("POST", "/files/list_folder")
            .with_body(
                json!({
                    "entries": [
                        {".tag": "file", "id": "id:a.mp4", "name": "a.mp4", "path_lower": "/order-42/a.mp4", "path_display": "/Order-42/a.mp4"},
                        {".tag": "file", "id": "id:notes.txt", "name": "notes.txt", "path_lower": "/order-42/notes.txt", "path_display": "/Order-42/notes.txt"}
                    ],
                    "cursor": "c1",
                    "has_more": false
                })
                .to_string(),
            )
            .create_async()
            .await;
        let _mock = server
            .mock("POST", "/sharing/list_shared_links")
            .with_body(json!({"links": [], "has_more": false}).to_string())
            .create_async()
            .await;
        let _created = create_link_mock(&mut server, &entry("a.mp4"), 1).await;
        let create_txt = create_link_mock(&mut server, &entry("notes.txt"), 0).await;

        let service = FolderLinkService::new(Config {
            media_only: true,
            ..config(&server)
        })
        .unwrap();
        let folder = service.resolve_folder(SHARED_URL).await.unwrap();

        assert_eq!(folder.files.len(), 1);
        assert_eq!(folder.files[0].name, "a.mp4");
        create_txt.assert_async().await;
    }

    #[tokio::test]
    async fn keeps_non_media_files_by_default() {
        let mut server = Server::new_async().await;
        let _folder = folder_scenario(&mut server).await;
        let _mock = server
            .mock("POST", "/files/list_folder")
            .with_body(
                json!({
                    "entries": [
                        {".tag": "file", "id": "id:notes.txt", "name": "notes.txt", "path_lower": "/order-42/notes.txt", "path_display": "/Order-42/notes.txt"}
                    ],
                    "cursor": "c1",
                    "has_more": false
                })
                .to_string(),
            )
            .create_async()
            .await;
        let _mock = server
            .mock("POST", "/sharing/list_shared_links")
            .with_body(json!({"links": [], "has_more": false}).to_string())
            .create_async()
            .await;
        let _created = create_link_mock(&mut server, &entry("notes.txt"), 1).await;

        let service = FolderLinkService::new(config(&server)).unwrap();
        let folder = service.resolve_folder(SHARED_URL).await.unwrap();

        assert_eq!(folder.files.len(), 1);
        assert_eq!(folder.files[0].kind, MediaType::File);
    }

    #[tokio::test]
    async fn cancelled_before_start() {
        let mut server = Server::new_async().await;
        let metadata = server
            .mock("POST", "/sharing/get_shared_link_metadata")
            .expect(0)
            .create_async()
            .await;

        let cancel = CancellationToken::new();
        cancel.cancel();

        let service = FolderLinkService::new(config(&server)).unwrap();
        let err = service
            .resolve_folder_with_cancel(SHARED_URL, &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, LinkError::Cancelled));
        metadata.assert_async().await;
    }

    #[tokio::test]
    async fn cancelled_during_a_batch() {
        let mut server = Server::new_async().await;
        let _folder = folder_scenario(&mut server).await;
        let _mock = server
            .mock("POST", "/files/list_folder")
            .with_body(
                json!({
                    "entries": [
                        {".tag": "file", "id": "id:a.mp4", "name": "a.mp4", "path_lower": "/order-42/a.mp4", "path_display": "/Order-42/a.mp4"},
                        {".tag": "file", "id": "id:b.jpg", "name": "b.jpg", "path_lower": "/order-42/b.jpg", "path_display": "/Order-42/b.jpg"}
                    ],
                    "cursor": "c1",
                    "has_more": false
                })
                .to_string(),
            )
            .create_async()
            .await;
        let _mock = server
            .mock("POST", "/sharing/list_shared_links")
            .match_body(Matcher::Json(json!({})))
            .with_body(json!({"links": [], "has_more": false}).to_string())
            .create_async()
            .await;

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let create_a = server
            .mock("POST", "/sharing/create_shared_link_with_settings")
            .match_body(Matcher::PartialJson(json!({"path": "/Order-42/a.mp4"})))
            .with_body_from_request(move |_| {
                trigger.cancel();
                json!({"url": shared_url_for("a.mp4")}).to_string().into_bytes()
            })
            .expect(1)
            .create_async()
            .await;
        let create_b = create_link_mock(&mut server, &entry("b.jpg"), 0).await;

        let service = FolderLinkService::new(Config {
            batch_size: 1,
            ..config(&server)
        })
        .unwrap();
        let err = service
            .resolve_folder_with_cancel(SHARED_URL, &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, LinkError::Cancelled));
        create_a.assert_async().await;
        create_b.assert_async().await;
    }
}

mod folder_resolution {
    use super::*;

    #[tokio::test]
    async fn folder_not_found_makes_no_mount_call() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/sharing/get_shared_link_metadata")
            .with_body(json!({".tag": "folder", "name": "Order-99"}).to_string())
            .create_async()
            .await;
        let _mock = server
            .mock("POST", "/sharing/list_folders")
            .with_body(json!({"entries": [{"name": "Order-42", "shared_folder_id": "42", "path_lower": "/order-42"}]}).to_string())
            .create_async()
            .await;
        let _mock = server
            .mock("POST", "/sharing/list_mountable_folders")
            .with_body(json!({"entries": [{"name": "Order-7", "shared_folder_id": "7"}]}).to_string())
            .create_async()
            .await;
        let mount = server
            .mock("POST", "/sharing/mount_folder")
            .expect(0)
            .create_async()
            .await;

        let err = resolve_folder_path(&client(&server), SHARED_URL)
            .await
            .unwrap_err();

        match err {
            LinkError::FolderNotFound(name) => assert_eq!(name, "Order-99"),
            other => panic!("unexpected error: {other:?}"),
        }
        mount.assert_async().await;
    }

    #[tokio::test]
    async fn duplicate_names_resolve_to_first_match() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/sharing/get_shared_link_metadata")
            .with_body(json!({".tag": "folder", "name": "Order-1"}).to_string())
            .create_async()
            .await;
        let _mock = server
            .mock("POST", "/sharing/list_folders")
            .with_body(
                json!({"entries": [
                    {"name": "order-1", "shared_folder_id": "1", "path_lower": "/order-1"},
                    {"name": "ORDER-1", "shared_folder_id": "2", "path_lower": "/order-1 (1)"}
                ]})
                .to_string(),
            )
            .create_async()
            .await;

        let resolved = resolve_folder_path(&client(&server), SHARED_URL).await.unwrap();
        assert_eq!(resolved.path, "/order-1");
    }
}

mod pagination {
    use super::*;

    fn page(range: std::ops::Range<usize>, cursor: &str, has_more: bool) -> String {
        let mut entries: Vec<serde_json::Value> = range
            .map(|i| {
                json!({
                    ".tag": "file",
                    "id": format!("id:{}", i),
                    "name": format!("clip-{}.mp4", i),
                    "path_lower": format!("/order-42/clip-{}.mp4", i),
                })
            })
            .collect();
        entries.push(json!({".tag": "folder", "name": "sub", "path_lower": "/order-42/sub"}));

        json!({"entries": entries, "cursor": cursor, "has_more": has_more}).to_string()
    }

    #[tokio::test]
    async fn follows_every_page_exactly_once() {
        let mut server = Server::new_async().await;
        let first = server
            .mock("POST", "/files/list_folder")
            .match_body(Matcher::PartialJson(json!({"path": "/order-42", "limit": 2000})))
            .with_body(page(0..4, "c1", true))
            .expect(1)
            .create_async()
            .await;
        let second = server
            .mock("POST", "/files/list_folder/continue")
            .match_body(Matcher::Json(json!({"cursor": "c1"})))
            .with_body(page(4..8, "c2", true))
            .expect(1)
            .create_async()
            .await;
        let third = server
            .mock("POST", "/files/list_folder/continue")
            .match_body(Matcher::Json(json!({"cursor": "c2"})))
            .with_body(page(8..10, "c3", false))
            .expect(1)
            .create_async()
            .await;

        let files = list_all_files(&client(&server), "/order-42").await.unwrap();

        assert_eq!(files.len(), 10);
        let mut ids: Vec<&str> = files.iter().map(|f| f.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 10);

        first.assert_async().await;
        second.assert_async().await;
        third.assert_async().await;
    }
}

mod materialization {
    use super::*;

    #[tokio::test]
    async fn repeated_materialization_yields_same_url() {
        let mut server = Server::new_async().await;
        let file = entry("a.mp4");
        let created = create_link_mock(&mut server, &file, 1).await;
        let _exists = link_exists_mock(&mut server, &file).await;
        let lookup = server
            .mock("POST", "/sharing/list_shared_links")
            .match_body(Matcher::Json(json!({"path": file.path_display, "direct_only": true})))
            .with_body(
                json!({"links": [{"url": shared_url_for(&file.name), "path_lower": file.path}], "has_more": false})
                    .to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        let client = client(&server);
        let index = LinkIndex::new();
        let files = vec![file.clone()];

        let first = materialize_links(&client, &files, &index, 10).await.unwrap();
        let second = materialize_links(&client, &files, &index, 10).await.unwrap();

        assert_eq!(first.files.len(), 1);
        assert_eq!(second.files.len(), 1);
        assert_eq!(first.files[0].url, direct_url_for("a.mp4"));
        assert_eq!(first.files[0].url, second.files[0].url);
        created.assert_async().await;
        lookup.assert_async().await;
    }

    #[tokio::test]
    async fn one_failure_does_not_sink_the_batch() {
        for batch_size in [1, 2, 3, 10, 15] {
            let mut server = Server::new_async().await;
            let names = ["a.mp4", "b.jpg", "c.mov", "d.png"];
            let files: Vec<FileEntry> = names.iter().map(|n| entry(n)).collect();

            let mut ok_mocks = Vec::new();
            for file in files.iter().filter(|f| f.name != "c.mov") {
                ok_mocks.push(create_link_mock(&mut server, file, 1).await);
            }
            // Initial attempt plus the single retry.
            let failing = server
                .mock("POST", "/sharing/create_shared_link_with_settings")
                .match_body(Matcher::PartialJson(json!({"path": "/Order-42/c.mov"})))
                .with_status(500)
                .with_body("internal error")
                .expect(2)
                .create_async()
                .await;

            let result = materialize_links(&client(&server), &files, &LinkIndex::new(), batch_size)
                .await
                .unwrap();

            assert_eq!(result.files.len(), 4, "batch size {}", batch_size);
            assert_eq!(result.failed_count(), 1, "batch size {}", batch_size);
            let failed = result.files.iter().find(|f| f.name == "c.mov").unwrap();
            assert!(failed.url.is_empty());

            let ok = result.successful();
            assert_eq!(ok.len(), 3, "batch size {}", batch_size);
            assert!(ok.iter().all(|f| f.name != "c.mov"));
            assert!(ok.iter().all(|f| f.url.starts_with("https://dl.dropboxusercontent.com/")));

            for mock in &ok_mocks {
                mock.assert_async().await;
            }
            failing.assert_async().await;
        }
    }

    #[tokio::test]
    async fn later_batch_waits_for_earlier_batch_to_settle() {
        let mut server = Server::new_async().await;
        let log = Arc::new(Mutex::new(Vec::<String>::new()));
        let files: Vec<FileEntry> = ["a.mp4", "b.jpg", "c.mov", "d.png"]
            .iter()
            .map(|n| entry(n))
            .collect();

        // a.mp4 settles through the already-exists lookup.
        let _exists = link_exists_mock(&mut server, &files[0]).await;
        let lookup_log = Arc::clone(&log);
        let _lookup = server
            .mock("POST", "/sharing/list_shared_links")
            .match_body(Matcher::PartialJson(json!({"path": files[0].path_display})))
            .with_body_from_request(move |_| {
                lookup_log.lock().unwrap().push("lookup:a.mp4".to_string());
                json!({
                    "links": [{"url": shared_url_for("a.mp4"), "path_lower": "/order-42/a.mp4"}],
                    "has_more": false
                })
                .to_string()
                .into_bytes()
            })
            .create_async()
            .await;

        let mut created = Vec::new();
        for file in &files[1..] {
            let log = Arc::clone(&log);
            let name = file.name.clone();
            let mock = server
                .mock("POST", "/sharing/create_shared_link_with_settings")
                .match_body(Matcher::PartialJson(json!({"path": file.path_display})))
                .with_body_from_request(move |_| {
                    log.lock().unwrap().push(format!("create:{}", name));
                    json!({"url": shared_url_for(&name)}).to_string().into_bytes()
                })
                .expect(1)
                .create_async()
                .await;
            created.push(mock);
        }

        let result = materialize_links(&client(&server), &files, &LinkIndex::new(), 2)
            .await
            .unwrap();
        assert_eq!(result.successful().len(), 4);

        let events = log.lock().unwrap().clone();
        let at = |event: &str| events.iter().position(|e| e == event).unwrap();
        let first_settled = at("lookup:a.mp4").max(at("create:b.jpg"));
        let second_started = at("create:c.mov").min(at("create:d.png"));
        assert!(first_settled < second_started, "events: {:?}", events);

        for mock in &created {
            mock.assert_async().await;
        }
    }

    #[tokio::test]
    async fn indexed_files_skip_creation() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/sharing/list_shared_links")
            .match_body(Matcher::Json(json!({})))
            .with_body(
                json!({
                    "links": [{"url": shared_url_for("a.mp4"), "path_lower": "/order-42/a.mp4"}],
                    "has_more": false
                })
                .to_string(),
            )
            .create_async()
            .await;
        let create_a = create_link_mock(&mut server, &entry("a.mp4"), 0).await;
        let create_b = create_link_mock(&mut server, &entry("b.jpg"), 1).await;

        let client = client(&server);
        let index = build_link_index(&client).await.unwrap();
        let files = vec![entry("a.mp4"), entry("b.jpg")];
        let result = materialize_links(&client, &files, &index, 15).await.unwrap();

        assert_eq!(result.successful().len(), 2);
        create_a.assert_async().await;
        create_b.assert_async().await;
    }

    #[tokio::test]
    async fn link_exists_without_lookup_result_is_soft_failure() {
        let mut server = Server::new_async().await;
        let file = entry("a.mp4");
        let _exists = link_exists_mock(&mut server, &file).await;
        let _mock = server
            .mock("POST", "/sharing/list_shared_links")
            .with_body(json!({"links": [], "has_more": false}).to_string())
            .create_async()
            .await;

        let result =
            materialize_links(&client(&server), &[file], &LinkIndex::new(), 5)
                .await
                .unwrap();

        assert_eq!(result.failed_count(), 1);
        assert!(result.successful().is_empty());
    }
}

mod reclaim {
    use super::*;

    #[tokio::test]
    async fn counts_only_successful_unmounts() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/sharing/list_folders")
            .with_body(
                json!({"entries": [
                    {"name": "A", "shared_folder_id": "1", "path_lower": "/a"},
                    {"name": "B", "shared_folder_id": "2", "path_lower": "/b"},
                    {"name": "C", "shared_folder_id": "3", "path_lower": "/c"},
                    {"name": "D", "shared_folder_id": "4"}
                ]})
                .to_string(),
            )
            .create_async()
            .await;
        let mut unmounted = Vec::new();
        for id in ["1", "3"] {
            let mock = server
                .mock("POST", "/sharing/unmount_folder")
                .match_body(Matcher::Json(json!({"shared_folder_id": id})))
                .with_body("null")
                .expect(1)
                .create_async()
                .await;
            unmounted.push(mock);
        }
        let _mock = server
            .mock("POST", "/sharing/unmount_folder")
            .match_body(Matcher::Json(json!({"shared_folder_id": "2"})))
            .with_status(409)
            .with_body(r#"{"error_summary": "access_error/.."}"#)
            .create_async()
            .await;
        let never = server
            .mock("POST", "/sharing/unmount_folder")
            .match_body(Matcher::Json(json!({"shared_folder_id": "4"})))
            .expect(0)
            .create_async()
            .await;

        let service = FolderLinkService::new(config(&server)).unwrap();
        let count = service.reclaim_quota().await.unwrap();

        assert_eq!(count, 2);
        for mock in &unmounted {
            mock.assert_async().await;
        }
        never.assert_async().await;
    }
}

mod account {
    use super::*;

    #[tokio::test]
    async fn email_is_fetched_once() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/users/get_current_account")
            .with_body(json!({"email": "api@example.com", "account_id": "dbid:1"}).to_string())
            .expect(1)
            .create_async()
            .await;

        let service = FolderLinkService::new(config(&server)).unwrap();

        assert_eq!(service.account_email().await.unwrap(), "api@example.com");
        assert_eq!(service.account_email().await.unwrap(), "api@example.com");
        mock.assert_async().await;
    }
}
