//! End-to-end round trips through the reqwest transport against a mock server.

use graphtx_client::{
    ClientConfig, Error, GraphClient, Statement, TransactionState, TransportError,
};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const EXPIRES: &str = "Fri, 14 Oct 2016 15:20:38 +0000";

fn client(server: &MockServer) -> GraphClient {
    let config = ClientConfig::builder()
        .base_url(format!("{}/db/data", server.uri()))
        .credentials("neo4j", "secret")
        .build();
    GraphClient::from_config(&config).unwrap()
}

fn open_body(server: &MockServer, n: u32) -> serde_json::Value {
    json!({
        "commit": format!("{}/db/data/transaction/{}/commit", server.uri(), n),
        "transaction": {"expires": EXPIRES},
        "results": [{"columns": ["1"], "data": [{"row": [1]}]}],
        "errors": []
    })
}

#[tokio::test]
async fn atomic_commit_sends_auth_and_stream_headers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/db/data/transaction/commit"))
        .and(header("authorization", "Basic bmVvNGo6c2VjcmV0"))
        .and(header("x-stream", "true"))
        .and(header_exists("user-agent"))
        .and(body_json(json!({
            "statements": [{
                "statement": "RETURN 1",
                "parameters": {},
                "resultDataContents": ["row"],
                "includeStats": false
            }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"columns": ["1"], "data": [{"row": [1]}]}],
            "errors": []
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client(&mock_server);
    let mut tx = client.atomic();
    let one = tx.add(Statement::row("RETURN 1")).unwrap();
    tx.commit().await.unwrap();

    let rows = one.row_set().unwrap();
    assert_eq!(rows.columns(), &["1"]);
    assert_eq!(rows.row(0).unwrap().int(0).unwrap(), 1);
}

#[tokio::test]
async fn stream_header_can_be_disabled() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/db/data/transaction/commit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": [], "errors": []})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = ClientConfig::builder()
        .base_url(format!("{}/db/data", mock_server.uri()))
        .stream_results(false)
        .build();
    let client = GraphClient::from_config(&config).unwrap();
    client.atomic().commit().await.unwrap();

    let requests = mock_server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("x-stream").is_none());
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn long_running_rotates_then_commits() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/db/data/transaction"))
        .respond_with(ResponseTemplate::new(201).set_body_json(open_body(&mock_server, 12)))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/db/data/transaction/12/commit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"columns": ["name"], "data": [{"row": ["Ada"]}]}],
            "errors": []
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client(&mock_server);
    let mut tx = client.detached();
    tx.begin().unwrap();
    let first = tx.add(Statement::row("RETURN 1")).unwrap();
    tx.flush().await.unwrap();

    assert_eq!(
        tx.endpoint(),
        format!("{}/db/data/transaction/12", mock_server.uri())
    );
    assert_eq!(tx.expiry().unwrap().to_rfc2822(), EXPIRES);

    let second = tx
        .add(Statement::row("MATCH (n {name: $name}) RETURN n.name").with_param("name", "Ada"))
        .unwrap();
    tx.commit().await.unwrap();

    assert!(first.is_resolved());
    assert_eq!(second.row_set().unwrap().row(0).unwrap().string(0).unwrap(), "Ada");
    assert_eq!(tx.state(), TransactionState::Committed);
}

#[tokio::test]
async fn rollback_deletes_current_endpoint() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/db/data/transaction"))
        .respond_with(ResponseTemplate::new(201).set_body_json(open_body(&mock_server, 4)))
        .mount(&mock_server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/db/data/transaction/4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": [], "errors": []})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client(&mock_server);
    let mut tx = client.detached();
    tx.begin().unwrap();
    tx.add(Statement::row("RETURN 1")).unwrap();
    tx.flush().await.unwrap();
    tx.rollback().await.unwrap();

    assert_eq!(tx.state(), TransactionState::RolledBack);
}

#[tokio::test]
async fn non_success_status_is_a_transport_fault() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/db/data/transaction/commit"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .mount(&mock_server)
        .await;

    let client = client(&mock_server);
    let mut tx = client.atomic();
    tx.add(Statement::row("RETURN 1")).unwrap();
    let err = tx.commit().await.unwrap_err();

    match &err {
        Error::Transport(TransportError::Status { status, body }) => {
            assert_eq!(*status, 401);
            assert_eq!(body, "Unauthorized");
        }
        other => panic!("expected status error, got {:?}", other),
    }
    assert!(!err.is_remote());
    assert_eq!(tx.state(), TransactionState::Failed);
}

#[tokio::test]
async fn slow_server_times_out() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/db/data/transaction/commit"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"results": [], "errors": []}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;

    let config = ClientConfig::builder()
        .base_url(format!("{}/db/data", mock_server.uri()))
        .timeout(Duration::from_secs(1))
        .build();
    let client = GraphClient::from_config(&config).unwrap();

    let err = client.atomic().commit().await.unwrap_err();
    assert!(matches!(err, Error::Transport(TransportError::Timeout)));
}

#[tokio::test]
async fn server_errors_in_body_are_remote_faults() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/db/data/transaction/commit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [],
            "errors": [
                {"code": "Neo.ClientError.Statement.SyntaxError", "message": "Invalid input 'RETUR'"},
                {"code": "Neo.ClientError.Statement.ParameterMissing", "message": "Expected parameter: name"}
            ]
        })))
        .mount(&mock_server)
        .await;

    let client = client(&mock_server);
    let err = client
        .execute(Statement::row("RETUR $name"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::RemoteMulti(ref errors) if errors.len() == 2));
    assert_eq!(
        err.server_errors()[1].code,
        "Neo.ClientError.Statement.ParameterMissing"
    );
}
