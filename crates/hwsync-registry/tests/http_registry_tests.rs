//! HttpRegistry against a mocked Ironic API

use hwsync_registry::{HttpRegistry, HttpRegistryConfig, NodeRegistry, RegistryError};
use hwsync_types::{NodeId, PortId, ProvisionState, ProvisionTarget};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn registry(server: &MockServer) -> HttpRegistry {
    HttpRegistry::new(HttpRegistryConfig {
        url: server.uri(),
        auth_token: Some("static-token".to_string()),
        ..Default::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_list_nodes() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/nodes"))
        .and(query_param("detail", "True"))
        .and(header("X-OpenStack-Ironic-API-Version", "1.22"))
        .and(header("X-Auth-Token", "static-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "nodes": [{
                "uuid": "n1",
                "name": "node-1",
                "provision_state": "enroll",
                "maintenance": false,
                "driver": "agent_pxe_oneview",
                "driver_info": {"server_hardware_uri": "/rest/server-hardware/1"},
                "properties": {"capabilities": "server_profile_template_uri:/rest/t/1"},
                "last_error": null,
                "links": []
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let nodes = registry(&server).list_nodes().await.unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].provision_state, ProvisionState::Enroll);
    assert_eq!(
        nodes[0].capabilities().unwrap().get("server_profile_template_uri"),
        Some("/rest/t/1")
    );
}

#[tokio::test]
async fn test_set_provision_state() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/v1/nodes/n1/states/provision"))
        .and(body_json(json!({"target": "manage"})))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    registry(&server)
        .set_provision_state(&NodeId::from("n1"), ProvisionTarget::Manage)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_set_provision_state_conflict() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/v1/nodes/n1/states/provision"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "error_message": "{\"faultstring\": \"Node n1 is locked by host conductor-1\"}"
        })))
        .mount(&server)
        .await;

    match registry(&server)
        .set_provision_state(&NodeId::from("n1"), ProvisionTarget::Manage)
        .await
    {
        Err(RegistryError::Conflict(message)) => {
            assert_eq!(message, "Node n1 is locked by host conductor-1")
        }
        other => panic!("expected Conflict, got {:?}", other),
    }
}

#[tokio::test]
async fn test_create_and_find_port() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/ports"))
        .and(body_json(json!({"node_uuid": "n1", "address": "01:23:45:67:89:ab"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "uuid": "p1",
            "node_uuid": "n1",
            "address": "01:23:45:67:89:ab"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/ports"))
        .and(query_param("address", "01:23:45:67:89:ab"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ports": [{"uuid": "p1", "node_uuid": "n1", "address": "01:23:45:67:89:ab"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/ports/p1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "uuid": "p1", "node_uuid": "n1", "address": "01:23:45:67:89:ab"
        })))
        .mount(&server)
        .await;

    let registry = registry(&server);
    let port = registry
        .create_port(&NodeId::from("n1"), "01:23:45:67:89:ab", None)
        .await
        .unwrap();
    assert_eq!(port.id, PortId::new("p1"));

    let found = registry.list_ports_by_mac("01:23:45:67:89:ab").await.unwrap();
    assert_eq!(found, vec![port.clone()]);
    assert_eq!(registry.get_port(&PortId::new("p1")).await.unwrap(), port);
}

#[tokio::test]
async fn test_missing_node() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/nodes/ghost"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Node ghost could not be found."))
        .mount(&server)
        .await;

    assert!(matches!(
        registry(&server).get_node(&NodeId::from("ghost")).await,
        Err(RegistryError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_unreachable_registry() {
    let registry = HttpRegistry::new(HttpRegistryConfig {
        url: "http://127.0.0.1:1".to_string(),
        ..Default::default()
    })
    .unwrap();

    assert!(matches!(
        registry.list_nodes().await,
        Err(RegistryError::Connection(_))
    ));
}
