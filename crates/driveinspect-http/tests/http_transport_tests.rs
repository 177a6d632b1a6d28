mod common;

use common::{Canned, TOKEN, serve};
use driveinspect_core::node::NodeId;
use driveinspect_core::remote::{DriveService, ListQuery, RemoteAccess, RemoteError, RemoteOp};
use driveinspect_http::{DriveHttpService, HttpConfig};
use secrecy::SecretString;

fn service(base_url: String) -> DriveHttpService {
    let config = HttpConfig {
        base_url,
        page_size: 2,
    };
    DriveHttpService::new(config, SecretString::from(TOKEN.to_string())).unwrap()
}

#[test]
fn test_get_decodes_node() {
    let (base, server) = serve(vec![Canned::ok(
        r#"{"id": "abc", "name": "report.txt", "parents": ["0root"], "mimeType": "text/plain", "size": "10"}"#,
    )]);
    let node = service(base).get(&NodeId::from_raw("abc")).unwrap();
    assert_eq!(node.name, "report.txt");
    assert_eq!(node.size, Some(10));

    let heads = server.join().unwrap();
    let head = heads[0].to_ascii_lowercase();
    assert!(head.starts_with("get /drive/v3/files/abc?fields="), "{head}");
    assert!(head.contains(&format!("authorization: bearer {}", TOKEN.to_ascii_lowercase())));
}

#[test]
fn test_get_missing_is_not_found() {
    let (base, server) = serve(vec![Canned::status(404)]);
    let err = service(base).get(&NodeId::from_raw("gone")).unwrap_err();
    assert!(matches!(err, RemoteError::NotFound { ref id } if id.as_str() == "gone"));
    server.join().unwrap();
}

#[test]
fn test_get_forbidden_is_service_error() {
    let (base, server) = serve(vec![Canned::status(403)]);
    let err = service(base).get(&NodeId::from_raw("secret")).unwrap_err();
    assert!(matches!(err, RemoteError::Service { status: 403, .. }));
    server.join().unwrap();
}

#[test]
fn test_malformed_body_is_decode_error() {
    let (base, server) = serve(vec![Canned::ok("{\"id\": ")]);
    let err = service(base).get(&NodeId::from_raw("abc")).unwrap_err();
    assert!(matches!(err, RemoteError::Decode(_)), "{err:?}");
    server.join().unwrap();
}

#[test]
fn test_listing_follows_page_tokens() {
    let (base, server) = serve(vec![
        Canned::ok(r#"{"nextPageToken": "p2", "files": [{"id": "a"}, {"id": "b"}]}"#),
        Canned::ok(r#"{"files": [{"id": "c"}]}"#),
    ]);
    let mut remote = RemoteAccess::new(service(base));
    let listing = remote.list(&ListQuery::Children(NodeId::from_raw("0root")));

    assert!(listing.is_complete());
    assert_eq!(listing.len(), 3);
    assert_eq!(remote.stats().get(RemoteOp::ListChildren), 2);

    let heads = server.join().unwrap();
    assert!(heads[0].starts_with("GET /drive/v3/files?"));
    assert!(heads[0].contains("pageSize=2"));
    assert!(heads[0].contains("q="));
    assert!(!heads[0].contains("pageToken"));
    assert!(heads[1].contains("pageToken=p2"));
}

#[test]
fn test_listing_server_error_is_partial() {
    let (base, server) = serve(vec![
        Canned::ok(r#"{"nextPageToken": "p2", "files": [{"id": "a"}, {"id": "b"}]}"#),
        Canned::status(500),
    ]);
    let mut remote = RemoteAccess::new(service(base));
    let listing = remote.list(&ListQuery::All);

    assert_eq!(listing.len(), 2);
    assert!(matches!(
        listing.interrupted,
        Some(RemoteError::Service { status: 500, .. })
    ));
    server.join().unwrap();
}

#[test]
fn test_unreachable_host_is_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = service(format!("http://{addr}/drive/v3/"))
        .get(&NodeId::from_raw("abc"))
        .unwrap_err();
    assert!(matches!(err, RemoteError::Transport(_)), "{err:?}");
}
