//! HTTP-level tests against a mocked store
//!
//! Run with: cargo test --package reeak-client --test http_tests

use futures::StreamExt;
use reeak_client::{
    ClientError, Config, Connection, Link, ReadOptions, SaveOptions, SaveResult, SiblingRecord,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use wiremock::matchers::{body_json, body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn connect(server: &MockServer) -> Connection {
    Connection::new(Config::new(server.address().to_string())).unwrap()
}

fn header_is(name: &'static str, expected: &'static str) -> impl Fn(&Request) -> bool + Send + Sync {
    move |req: &Request| {
        req.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v == expected)
            .unwrap_or(false)
    }
}

fn header_absent(name: &'static str) -> impl Fn(&Request) -> bool + Send + Sync {
    move |req: &Request| req.headers.get(name).is_none()
}

#[derive(Debug, Deserialize, PartialEq)]
struct User {
    name: String,
    visits: u32,
}

// ==================== get ====================

#[tokio::test]
async fn test_get_returns_body_and_metadata() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/buckets/users/keys/ana"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-Riak-Vclock", "a85hYGBgzGDKBVIcypz")
                .insert_header("X-Riak-Meta-Author", "ana")
                .set_body_raw(r#"{"name":"Ana","visits":3}"#, "application/json"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let users = connect(&server).bucket("users");
    let fetched = users.get("ana", &ReadOptions::new()).await.unwrap();

    assert_eq!(fetched.meta.status, 200);
    assert_eq!(fetched.meta.vclock(), Some("a85hYGBgzGDKBVIcypz"));
    assert_eq!(fetched.meta.user_meta().get("author").map(String::as_str), Some("ana"));
    assert_eq!(fetched.data.as_deref(), Some(&br#"{"name":"Ana","visits":3}"#[..]));
}

#[tokio::test]
async fn test_get_json_decodes_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/buckets/users/keys/ana"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "Ana", "visits": 3})))
        .mount(&server)
        .await;

    let fetched = connect(&server)
        .bucket("users")
        .get_json::<User>("ana", &ReadOptions::new())
        .await
        .unwrap();
    assert_eq!(fetched.data, Some(User { name: "Ana".to_string(), visits: 3 }));
}

#[tokio::test]
async fn test_get_missing_key_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/buckets/users/keys/missing-key"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found\n"))
        .mount(&server)
        .await;

    let fetched = connect(&server)
        .bucket("users")
        .get("missing-key", &ReadOptions::new())
        .await
        .unwrap();
    assert!(fetched.is_missing());
    assert_eq!(fetched.meta.status, 404);
}

#[tokio::test]
async fn test_get_multiple_choices_is_not_implemented() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/buckets/users/keys/ana"))
        .respond_with(ResponseTemplate::new(300).set_body_string("Siblings:\n1a\n2b\n"))
        .mount(&server)
        .await;

    let err = connect(&server)
        .bucket("users")
        .get("ana", &ReadOptions::new())
        .await
        .unwrap_err();
    assert!(err.is_multiple_choices());
    assert!(!matches!(err, ClientError::Protocol { .. }));
}

#[tokio::test]
async fn test_get_unexpected_status_is_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = connect(&server)
        .bucket("users")
        .get("ana", &ReadOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Protocol { operation: "Get", status: 503 }));
}

#[tokio::test]
async fn test_get_advertises_siblings_and_passes_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/buckets/users/keys/ana"))
        .and(query_param("r", "2"))
        .and(header_is("accept", "multipart/mixed;q=0.9,application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let options = ReadOptions::new().with_query("r", "2").accepting_siblings();
    let fetched = connect(&server).bucket("users").get("ana", &options).await.unwrap();
    assert_eq!(fetched.data.as_deref(), Some(&b"ok"[..]));
}

#[tokio::test]
async fn test_namespace_prefixes_every_path() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/riak/buckets/users/keys/ana"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let conn = Connection::new(Config::new(server.address().to_string()).with_namespace("riak")).unwrap();
    conn.bucket("users").get("ana", &ReadOptions::new()).await.unwrap();
}

// ==================== save ====================

#[tokio::test]
async fn test_save_put_sends_all_header_kinds() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/buckets/users/keys/ana"))
        .and(query_param("returnbody", "true"))
        .and(header("content-type", "application/json"))
        .and(header("x-request-source", "tests"))
        .and(header("x-riak-vclock", "a85hYGBg"))
        .and(header("x-riak-meta-author", "ana"))
        .and(header("x-riak-index-city_bin", "lisbon"))
        .and(header("x-riak-index-age_int", "31"))
        .and(header_is("link", r#"</riak/users/bob>; riaktag="friend""#))
        .and(body_json(json!({"name": "Ana", "visits": 4})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(r#"{"name":"Ana","visits":4}"#, "application/json"))
        .expect(1)
        .mount(&server)
        .await;

    let options = SaveOptions::new()
        .header("X-Request-Source", "tests")
        .vclock("a85hYGBg")
        .meta("author", "ana")
        .index("city", "lisbon")
        .index("age", 31)
        .link(Link::new("friend", "users", "bob"));
    let query = vec![("returnbody".to_string(), "true".to_string())];

    let result = connect(&server)
        .bucket("users")
        .save(Some("ana"), json!({"name": "Ana", "visits": 4}), &options, &query)
        .await
        .unwrap();

    match result {
        SaveResult::Stored { body } => assert_eq!(&body[..], br#"{"name":"Ana","visits":4}"#),
        other => panic!("Expected Stored, got {:?}", other),
    }
}

#[tokio::test]
async fn test_save_post_returns_location() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/buckets/users/keys"))
        .respond_with(ResponseTemplate::new(201).insert_header("Location", "/buckets/users/keys/Zq8b2"))
        .expect(1)
        .mount(&server)
        .await;

    let result = connect(&server)
        .bucket("users")
        .save_json(None, &json!({"name": "Bob"}), &SaveOptions::new())
        .await
        .unwrap();
    assert_eq!(result.created_key(), Some("Zq8b2"));
}

#[tokio::test]
async fn test_save_raw_payload_passes_through() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/buckets/notes/keys/n1"))
        .and(header_absent("content-type"))
        .and(wiremock::matchers::body_string("just text"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let result = connect(&server)
        .bucket("notes")
        .save(Some("n1"), "just text", &SaveOptions::new(), &[])
        .await
        .unwrap();
    assert_eq!(result, SaveResult::Stored { body: bytes::Bytes::new() });
}

#[tokio::test]
async fn test_save_caller_content_type_wins() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/buckets/notes/keys/n1"))
        .and(header("content-type", "application/vnd.notes+json"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let options = SaveOptions::new().header("Content-Type", "application/vnd.notes+json");
    connect(&server)
        .bucket("notes")
        .save(Some("n1"), json!({"text": "hi"}), &options, &[])
        .await
        .unwrap();
}

#[tokio::test]
async fn test_save_multiple_choices() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(300))
        .mount(&server)
        .await;

    let err = connect(&server)
        .bucket("users")
        .save_json(Some("ana"), &json!({}), &SaveOptions::new())
        .await
        .unwrap_err();
    assert!(err.is_multiple_choices());
}

// ==================== delete ====================

#[tokio::test]
async fn test_delete_is_idempotent() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/buckets/users/keys/ana"))
        .respond_with(ResponseTemplate::new(204))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/buckets/users/keys/ana"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let users = connect(&server).bucket("users");
    assert!(users.delete("ana", &[]).await.unwrap());
    assert!(!users.delete("ana", &[]).await.unwrap());
}

#[tokio::test]
async fn test_delete_unexpected_status() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = connect(&server).bucket("users").delete("ana", &[]).await.unwrap_err();
    assert_eq!(err.status(), Some(500));
}

// ==================== indexes ====================

#[tokio::test]
async fn test_keys_from_index() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/buckets/users/index/city_bin/lisbon"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"keys": ["ana", "rui"]})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/buckets/users/index/age_int/31"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"keys": ["ana"]})))
        .expect(1)
        .mount(&server)
        .await;

    let users = connect(&server).bucket("users");
    let by_city = users.keys_from_index("city", "lisbon", &ReadOptions::new()).await.unwrap();
    assert_eq!(by_city.data, Some(vec!["ana".to_string(), "rui".to_string()]));

    let by_age = users.keys_from_index("age", 31, &ReadOptions::new()).await.unwrap();
    assert_eq!(by_age.data, Some(vec!["ana".to_string()]));
}

#[tokio::test]
async fn test_objects_from_index_resolves_siblings() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/mapred"))
        .and(header("content-type", "application/json"))
        .and(body_partial_json(json!({
            "inputs": {"bucket": "users", "index": "city_bin", "key": "lisbon"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"bucket": "users", "key": "ana", "vclock": "v1", "values": [
                {"metadata": {}, "data": "{\"name\":\"Ana\",\"visits\":3}"},
                {"metadata": {}, "data": "{\"name\":\"Ana\",\"visits\":7}"}
            ]},
            {"bucket": "users", "key": "rui", "vclock": "v2", "values": [
                {"metadata": {}, "data": "{\"name\":\"Rui\",\"visits\":1}"}
            ]}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let calls = AtomicUsize::new(0);
    let most_visits = |record: &SiblingRecord| -> User {
        calls.fetch_add(1, Ordering::SeqCst);
        record
            .values
            .iter()
            .filter_map(|v| v.decode::<User>().ok())
            .max_by_key(|u| u.visits)
            .unwrap()
    };

    let fetched = connect(&server)
        .bucket("users")
        .objects_from_index("city", "lisbon", &ReadOptions::new(), &most_visits)
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        fetched.data,
        Some(vec![
            User { name: "Ana".to_string(), visits: 7 },
            User { name: "Rui".to_string(), visits: 1 },
        ])
    );
}

#[tokio::test]
async fn test_objects_from_index_multiple_choices() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/mapred"))
        .respond_with(ResponseTemplate::new(300))
        .mount(&server)
        .await;

    let err = connect(&server)
        .bucket("users")
        .objects_from_index("city", "lisbon", &ReadOptions::new(), &|_: &SiblingRecord| 0u32)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::MultipleChoices { operation: "Index Query" }));
}

#[tokio::test]
async fn test_index_reads_on_missing_index_are_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/buckets/users/index/city_bin/porto"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/mapred"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let users = connect(&server).bucket("users");
    let keys = users.keys_from_index("city", "porto", &ReadOptions::new()).await.unwrap();
    assert!(keys.is_missing());

    let objects = users
        .objects_from_index("city", "porto", &ReadOptions::new(), &|_: &SiblingRecord| 0u32)
        .await
        .unwrap();
    assert!(objects.is_missing());
}

// ==================== listing ====================

#[tokio::test]
async fn test_all_keys_buffered() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/buckets/users/keys"))
        .and(query_param("keys", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"keys": ["ana", "bob"]})))
        .mount(&server)
        .await;

    let keys = connect(&server).bucket("users").all_keys().await.unwrap();
    assert_eq!(keys, vec!["ana", "bob"]);
}

#[tokio::test]
async fn test_all_keys_rejects_non_json() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/buckets/users/keys"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("ana\nbob\n", "text/plain"))
        .mount(&server)
        .await;

    let err = connect(&server).bucket("users").all_keys().await.unwrap_err();
    assert!(matches!(err, ClientError::Protocol { operation: "List Keys", status: 200 }));
}

#[tokio::test]
async fn test_list_buckets() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/buckets"))
        .and(query_param("buckets", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"buckets": ["users", "notes"]})))
        .mount(&server)
        .await;

    let names = connect(&server).buckets().list().await.unwrap();
    assert_eq!(names, vec!["users", "notes"]);
}

// ==================== streaming ====================

fn mount_stream(body: &'static str) -> Mock {
    Mock::given(method("GET"))
        .and(path("/buckets/users/keys"))
        .and(query_param("keys", "stream"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/json"))
}

#[tokio::test]
async fn test_stream_keys_yields_non_empty_batches() {
    let server = MockServer::start().await;
    mount_stream("{\"keys\":[\"ana\",\"bob\"]}{\"keys\":[]}\n{\"keys\":[\"rui\"]}{\"keys\":[]}")
        .mount(&server)
        .await;

    let mut stream = connect(&server).bucket("users").stream_keys();
    let mut batches = Vec::new();
    while let Some(batch) = stream.next().await {
        batches.push(batch.unwrap());
    }
    assert_eq!(batches, vec![vec!["ana", "bob"], vec!["rui"]]);
}

#[tokio::test]
async fn test_stream_keys_with_callbacks() {
    let server = MockServer::start().await;
    mount_stream("{\"keys\":[\"ana\"]}{\"keys\":[\"bob\",\"rui\"]}").mount(&server).await;

    let (seen, error, ends) = listen(connect(&server)).await;

    assert!(error.is_none());
    assert_eq!(ends, 1);
    assert_eq!(seen, vec![vec!["ana".to_string()], vec!["bob".to_string(), "rui".to_string()]]);
    assert!(seen.iter().all(|batch| !batch.is_empty()));
}

#[tokio::test]
async fn test_stream_keys_error_status_ends_with_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/buckets/users/keys"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let (done_tx, done_rx) = oneshot::channel();
    let data_calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&data_calls);
    let handle = connect(&server).bucket("users").stream_keys_with(
        move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        },
        move |error| {
            let _ = done_tx.send(error);
        },
    );

    let error = done_rx.await.unwrap().expect("stream should fail");
    handle.join().await.unwrap();
    assert!(matches!(error, ClientError::Protocol { operation: "Stream Keys", status: 500 }));
    assert_eq!(data_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_stream_collect_keys() {
    let server = MockServer::start().await;
    mount_stream("{\"keys\":[\"a\"]}{\"keys\":[\"b\"]}").mount(&server).await;

    let keys = connect(&server).bucket("users").stream_keys().collect_keys().await.unwrap();
    assert_eq!(keys, vec!["a", "b"]);
}

/// Runs a key listing through the callback form and returns the batches seen,
/// the end result and how many times `on_end` fired.
async fn listen(connection: Connection) -> (Vec<Vec<String>>, Option<ClientError>, usize) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let ends = Arc::new(AtomicUsize::new(0));
    let (done_tx, done_rx) = oneshot::channel();

    let handle = {
        let seen = Arc::clone(&seen);
        let ends = Arc::clone(&ends);
        connection.bucket("users").stream_keys_with(
            move |keys| seen.lock().unwrap().push(keys),
            move |error| {
                ends.fetch_add(1, Ordering::SeqCst);
                let _ = done_tx.send(error);
            },
        )
    };

    let error = done_rx.await.unwrap();
    handle.join().await.unwrap();
    let seen = seen.lock().unwrap().clone();
    (seen, error, ends.load(Ordering::SeqCst))
}

#[tokio::test]
async fn test_stream_error_object_after_batches() {
    let server = MockServer::start().await;
    mount_stream("{\"keys\":[\"ana\",\"bob\"]}{\"error\":\"timeout\"}").mount(&server).await;

    let (seen, error, ends) = listen(connect(&server)).await;
    assert_eq!(seen, vec![vec!["ana".to_string(), "bob".to_string()]]);
    assert!(matches!(error, Some(ClientError::InvalidResponse(_))));
    assert_eq!(ends, 1);
}

#[tokio::test]
async fn test_stream_connection_lost_after_batches() {
    // One complete chunk, then the connection drops before the terminating chunk
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 4096];
        let _ = socket.read(&mut request).await.unwrap();

        let batch = r#"{"keys":["ana","bob"]}"#;
        let response = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ntransfer-encoding: chunked\r\n\r\n{:x}\r\n{}\r\n",
            batch.len(),
            batch
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.flush().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    });

    let connection = Connection::new(Config::new(addr.to_string())).unwrap();
    let (seen, error, ends) = listen(connection).await;
    assert_eq!(seen, vec![vec!["ana".to_string(), "bob".to_string()]]);
    assert!(error.expect("stream should fail").is_transport());
    assert_eq!(ends, 1);
}

// ==================== transport ====================

#[tokio::test]
async fn test_transport_failure_is_surfaced() {
    // Nothing listens on port 1
    let conn = Connection::new(Config::new("127.0.0.1:1")).unwrap();
    let err = conn.bucket("users").get("ana", &ReadOptions::new()).await.unwrap_err();
    assert!(err.is_transport());

    let err = conn.bucket("users").stream_keys().collect_keys().await.unwrap_err();
    assert!(err.is_transport());
}
