//! Hardware operations against a mocked Hardware Manager

use hwsync_client::{
    ClientConfig, HardwareClient, HardwareError, HardwareGateway, HardwareOps, IloConsole,
};
use hwsync_types::{AssignmentState, HardwareRecord};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const HW: &str = "/rest/server-hardware/30303437";
const TEMPLATE: &str = "/rest/server-profile-templates/1";

async fn gateway(server: &MockServer) -> HardwareGateway {
    Mock::given(method("POST"))
        .and(path("/rest/login-sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sessionID": "s1"})))
        .mount(server)
        .await;

    let mut config = ClientConfig::new(server.uri(), "admin", "secret").without_delays();
    config.max_retries = 5;
    config.task_max_wait = Duration::ZERO;
    let client = Arc::new(HardwareClient::new(config).unwrap());
    let console = IloConsole::new(false).unwrap().with_plain_http();
    HardwareGateway::with_console(client, Arc::new(console))
}

fn hardware_json(state: &str, profile: Option<&str>) -> Value {
    json!({
        "uri": HW,
        "name": "Encl1, bay 3",
        "state": state,
        "serverProfileUri": profile,
        "serverHardwareTypeUri": "/rest/server-hardware-types/1",
        "serverGroupUri": "/rest/enclosure-groups/1",
        "portMap": {"deviceSlots": [{"physicalPorts": [{"mac": "01:23:45:67:89:ab"}]}]}
    })
}

async fn mount_get(server: &MockServer, uri: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(uri))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_get_hardware_record() {
    let server = MockServer::start().await;
    let gateway = gateway(&server).await;
    mount_get(&server, HW, hardware_json("ProfileApplied", Some("/rest/server-profiles/9"))).await;

    let hw = gateway.get_hardware_record(HW).await.unwrap();
    assert_eq!(hw.state, AssignmentState::ProfileApplied);
    assert_eq!(hw.profile_uri(), Some("/rest/server-profiles/9"));
}

#[tokio::test]
async fn test_resource_without_uri_is_not_found() {
    let server = MockServer::start().await;
    let gateway = gateway(&server).await;
    mount_get(&server, HW, json!({"errorCode": "RESOURCE_NOT_FOUND"})).await;

    assert!(matches!(
        gateway.get_hardware_record(HW).await,
        Err(HardwareError::ResourceNotFound(uri)) if uri == HW
    ));
}

#[tokio::test]
async fn test_assign_profile_from_template() {
    let server = MockServer::start().await;
    let gateway = gateway(&server).await;

    mount_get(
        &server,
        "/rest/server-profile-templates/1/new-profile",
        json!({"type": "ServerProfileV5", "serverHardwareTypeUri": "/rest/server-hardware-types/1"}),
    )
    .await;

    Mock::given(method("POST"))
        .and(path("/rest/server-profiles"))
        .and(header("Auth", "s1"))
        .and(body_partial_json(json!({
            "name": "Ironic [n1]",
            "serverHardwareUri": HW,
            "type": "ServerProfileV5"
        })))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "uri": "/rest/tasks/1",
            "taskState": "Running"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/tasks/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "uri": "/rest/tasks/1",
            "taskState": "Running",
            "associatedResource": {"resourceUri": "/rest/server-profiles/9"}
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_get(
        &server,
        "/rest/tasks/1",
        json!({
            "uri": "/rest/tasks/1",
            "taskState": "Completed",
            "associatedResource": {"resourceUri": "/rest/server-profiles/9"}
        }),
    )
    .await;

    let profile_uri = gateway
        .assign_profile_from_template(TEMPLATE, "Ironic [n1]", HW)
        .await
        .unwrap();
    assert_eq!(profile_uri, "/rest/server-profiles/9");
}

#[tokio::test]
async fn test_assign_profile_task_errors() {
    let server = MockServer::start().await;
    let gateway = gateway(&server).await;

    mount_get(&server, "/rest/server-profile-templates/1/new-profile", json!({})).await;
    Mock::given(method("POST"))
        .and(path("/rest/server-profiles"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({"uri": "/rest/tasks/2"})))
        .mount(&server)
        .await;
    mount_get(
        &server,
        "/rest/tasks/2",
        json!({
            "uri": "/rest/tasks/2",
            "taskState": "Error",
            "taskErrors": [{"message": "The server hardware is powered on"}]
        }),
    )
    .await;

    match gateway
        .assign_profile_from_template(TEMPLATE, "Ironic [n1]", HW)
        .await
    {
        Err(HardwareError::TaskFailed { task_uri, errors }) => {
            assert_eq!(task_uri, "/rest/tasks/2");
            assert_eq!(errors, vec!["The server hardware is powered on".to_string()]);
        }
        other => panic!("expected TaskFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_assign_profile_never_completes() {
    let server = MockServer::start().await;
    let gateway = gateway(&server).await;

    mount_get(&server, "/rest/server-profile-templates/1/new-profile", json!({})).await;
    Mock::given(method("POST"))
        .and(path("/rest/server-profiles"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({"uri": "/rest/tasks/3"})))
        .mount(&server)
        .await;
    mount_get(
        &server,
        "/rest/tasks/3",
        json!({"uri": "/rest/tasks/3", "taskState": "Running"}),
    )
    .await;

    match gateway
        .assign_profile_from_template(TEMPLATE, "Ironic [n1]", HW)
        .await
    {
        // max_retries is 5, so six polling rounds ran
        Err(HardwareError::MaxRetriesExceeded { uri, attempts }) => {
            assert_eq!(uri, "/rest/tasks/3");
            assert_eq!(attempts, 6);
        }
        other => panic!("expected MaxRetriesExceeded, got {:?}", other),
    }
}

#[tokio::test]
async fn test_assign_without_template_makes_no_request() {
    let server = MockServer::start().await;
    let gateway = gateway(&server).await;

    assert!(matches!(
        gateway.assign_profile_from_template("", "Ironic [n1]", HW).await,
        Err(HardwareError::TemplateNotFound(_))
    ));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_clone_and_assign_profile() {
    let server = MockServer::start().await;
    let gateway = gateway(&server).await;

    mount_get(
        &server,
        TEMPLATE,
        json!({
            "uri": TEMPLATE,
            "eTag": "1",
            "connections": [{"id": 1, "name": "pxe", "boot": {"priority": "Primary"}, "mac": "x"}],
            "sanStorage": {"volumeAttachments": [{
                "volumeUri": "/rest/storage-volumes/v1",
                "state": "Attached",
                "storagePaths": [{"status": "OK"}]
            }]}
        }),
    )
    .await;
    mount_get(
        &server,
        "/rest/storage-volumes/v1",
        json!({
            "uri": "/rest/storage-volumes/v1",
            "provisionType": "Thin",
            "provisionedCapacity": "1073741824",
            "shareable": false,
            "deviceVolumeName": "boot",
            "isPermanent": true
        }),
    )
    .await;

    Mock::given(method("GET"))
        .and(path(HW))
        .respond_with(ResponseTemplate::new(200).set_body_json(hardware_json("NoProfileApplied", None)))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    mount_get(&server, HW, hardware_json("ProfileApplied", Some("/rest/server-profiles/10"))).await;

    Mock::given(method("POST"))
        .and(path("/rest/server-profiles"))
        .and(body_partial_json(json!({
            "name": "Ironic [n1]",
            "serverHardwareUri": HW,
            "connections": [{"id": 1, "name": "pxe", "boot": {"priority": "Primary"}}],
            "sanStorage": {"volumeAttachments": [{"volumeName": "boot-02", "volumeUri": null}]}
        })))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "uri": "/rest/tasks/4",
            "taskStatus": "Creating server profile"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let profile_uri = gateway
        .clone_and_assign_profile(HW, TEMPLATE, "Ironic [n1]")
        .await
        .unwrap();
    assert_eq!(profile_uri, "/rest/server-profiles/10");
}

#[tokio::test]
async fn test_clone_rejected_without_task_status() {
    let server = MockServer::start().await;
    let gateway = gateway(&server).await;

    mount_get(&server, TEMPLATE, json!({"uri": TEMPLATE, "connections": []})).await;
    mount_get(&server, HW, hardware_json("NoProfileApplied", None)).await;
    Mock::given(method("POST"))
        .and(path("/rest/server-profiles"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"errorCode": "INVALID_PARAMETER"})))
        .mount(&server)
        .await;

    assert!(matches!(
        gateway.clone_and_assign_profile(HW, TEMPLATE, "Ironic [n1]").await,
        Err(HardwareError::ProfileCloneFailed(_))
    ));
}

#[tokio::test]
async fn test_unassign_profile() {
    let server = MockServer::start().await;
    let gateway = gateway(&server).await;

    mount_get(
        &server,
        "/rest/server-profiles/9",
        json!({
            "uri": "/rest/server-profiles/9",
            "serverHardwareUri": HW,
            "enclosureUri": "/rest/enclosures/1",
            "enclosureBay": 3
        }),
    )
    .await;
    Mock::given(method("PUT"))
        .and(path("/rest/server-profiles/9"))
        .and(body_partial_json(json!({
            "serverHardwareUri": null,
            "enclosureUri": null,
            "enclosureBay": null
        })))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({"uri": "/rest/tasks/8"})))
        .expect(1)
        .mount(&server)
        .await;
    mount_get(&server, HW, hardware_json("NoProfileApplied", None)).await;

    gateway
        .unassign_profile(HW, "/rest/server-profiles/9")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_derive_mac_from_port_map() {
    let server = MockServer::start().await;
    let gateway = gateway(&server).await;

    let hw: HardwareRecord =
        serde_json::from_value(hardware_json("NoProfileApplied", None)).unwrap();
    assert_eq!(gateway.derive_mac(&hw).await.unwrap(), "01:23:45:67:89:ab");
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_derive_mac_console_fallback() {
    let server = MockServer::start().await;
    let ilo = MockServer::start().await;
    let gateway = gateway(&server).await;

    mount_get(
        &server,
        &format!("{}/remoteConsoleUrl", HW),
        json!({"remoteConsoleUrl": format!("hplocons://addr={}&sessionkey=k1", ilo.address())}),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/Systems/1"))
        .and(header("X-Auth-Token", "k1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "HostCorrelation": {"HostMACAddress": ["aa:bb:cc:dd:ee:ff", "aa:bb:cc:dd:ee:00"]}
        })))
        .expect(1)
        .mount(&ilo)
        .await;

    let hw = HardwareRecord {
        uri: HW.to_string(),
        ..Default::default()
    };
    assert_eq!(gateway.derive_mac(&hw).await.unwrap(), "aa:bb:cc:dd:ee:ff");
}

#[tokio::test]
async fn test_derive_mac_without_any_source() {
    let server = MockServer::start().await;
    let gateway = gateway(&server).await;

    mount_get(&server, &format!("{}/remoteConsoleUrl", HW), json!({})).await;

    let hw = HardwareRecord {
        uri: HW.to_string(),
        ..Default::default()
    };
    assert!(matches!(
        gateway.derive_mac(&hw).await,
        Err(HardwareError::ResourceNotFound(_))
    ));
}

#[tokio::test]
async fn test_list_available_hardware() {
    let server = MockServer::start().await;
    let gateway = gateway(&server).await;

    let record = |uri: &str, name: &str, profile: Option<&str>, group: &str| {
        json!({
            "uri": uri,
            "name": name,
            "state": if profile.is_some() { "ProfileApplied" } else { "NoProfileApplied" },
            "serverProfileUri": profile,
            "serverHardwareTypeUri": "/rest/server-hardware-types/1",
            "serverGroupUri": group
        })
    };
    mount_get(
        &server,
        "/rest/server-hardware",
        json!({"members": [
            record("/rest/server-hardware/3", "encl1, bay 3", None, "/rest/enclosure-groups/1"),
            record("/rest/server-hardware/1", "Encl1, bay 1", None, "/rest/enclosure-groups/1"),
            record("/rest/server-hardware/2", "Encl1, bay 2", Some("/rest/server-profiles/2"), "/rest/enclosure-groups/1"),
            record("/rest/server-hardware/4", "Encl2, bay 1", None, "/rest/enclosure-groups/2")
        ]}),
    )
    .await;

    let available = gateway
        .list_available_hardware("/rest/server-hardware-types/1", Some("/rest/enclosure-groups/1"))
        .await
        .unwrap();
    let uris: Vec<&str> = available.iter().map(|hw| hw.uri.as_str()).collect();
    assert_eq!(uris, vec!["/rest/server-hardware/1", "/rest/server-hardware/3"]);
}
