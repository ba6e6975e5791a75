//! Profile clone transform
//!
//! Turns a profile template document into a request body for a new profile
//! bound to one hardware record. Server-managed fields are stripped, SAN
//! volume attachments are rewritten to provision fresh volumes, and
//! connections keep only the fields a create request accepts.

use crate::error::{HardwareError, HardwareResult};
use serde_json::{json, Map, Value};
use std::collections::HashMap;

/// Top-level fields owned by the Hardware Manager
pub const SERVER_MANAGED_FIELDS: &[&str] = &[
    "uuid",
    "modified",
    "taskUri",
    "eTag",
    "created",
    "serialNumber",
    "inProgress",
    "category",
    "state",
    "enclosureUri",
    "associatedServer",
    "status",
    "enclosureBay",
    "uri",
];

/// Fields removed from every volume attachment
pub const VOLUME_ATTACHMENT_STRIPPED: &[&str] = &["state", "status"];

/// Fields removed from every storage path
pub const STORAGE_PATH_STRIPPED: &[&str] = &["status"];

/// Fields a connection may carry in a create request
pub const CONNECTION_FIELDS: &[&str] = &[
    "id",
    "name",
    "functionType",
    "portId",
    "requestedMbps",
    "networkUri",
    "boot",
];

/// Suffix appended to a source volume's device name
pub const CLONED_VOLUME_SUFFIX: &str = "-02";

/// Volume URIs referenced by the template's SAN volume attachments
pub fn volume_uris(template: &Value) -> Vec<String> {
    template
        .pointer("/sanStorage/volumeAttachments")
        .and_then(Value::as_array)
        .map(|attachments| {
            attachments
                .iter()
                .filter_map(|a| a.get("volumeUri").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Build the create body for a clone of `template`.
///
/// `volumes` maps each attachment's `volumeUri` to the volume document it
/// points at.
pub fn build_clone_body(
    template: &Value,
    hardware_uri: &str,
    name: &str,
    volumes: &HashMap<String, Value>,
) -> HardwareResult<Value> {
    let mut body = template
        .as_object()
        .cloned()
        .ok_or_else(|| HardwareError::Decode("profile template is not an object".into()))?;

    body.insert("name".into(), json!(name));
    body.insert("serverHardwareUri".into(), json!(hardware_uri));

    if let Some(attachments) = body
        .get_mut("sanStorage")
        .and_then(|s| s.get_mut("volumeAttachments"))
        .and_then(Value::as_array_mut)
    {
        for attachment in attachments.iter_mut() {
            rewrite_attachment(attachment, volumes)?;
        }
    }

    for field in SERVER_MANAGED_FIELDS {
        body.remove(*field);
    }

    if let Some(connections) = body.get_mut("connections").and_then(Value::as_array_mut) {
        for connection in connections.iter_mut() {
            if let Some(fields) = connection.as_object_mut() {
                fields.retain(|key, _| CONNECTION_FIELDS.contains(&key.as_str()));
            }
        }
    }

    Ok(Value::Object(body))
}

fn rewrite_attachment(attachment: &mut Value, volumes: &HashMap<String, Value>) -> HardwareResult<()> {
    let fields = attachment
        .as_object_mut()
        .ok_or_else(|| HardwareError::Decode("volume attachment is not an object".into()))?;

    let volume_uri = fields
        .get("volumeUri")
        .and_then(Value::as_str)
        .ok_or_else(|| HardwareError::Decode("volume attachment without volumeUri".into()))?;
    let volume = volumes
        .get(volume_uri)
        .ok_or_else(|| HardwareError::ResourceNotFound(volume_uri.to_string()))?;

    let device_name = volume
        .get("deviceVolumeName")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            HardwareError::Decode(format!("volume {} has no deviceVolumeName", volume_uri))
        })?;

    let provisioned = provisioned_fields(volume, device_name);
    fields.extend(provisioned);

    for field in VOLUME_ATTACHMENT_STRIPPED {
        fields.remove(*field);
    }

    if let Some(paths) = fields.get_mut("storagePaths").and_then(Value::as_array_mut) {
        for path in paths.iter_mut().filter_map(Value::as_object_mut) {
            for field in STORAGE_PATH_STRIPPED {
                path.remove(*field);
            }
        }
    }

    Ok(())
}

fn provisioned_fields(volume: &Value, device_name: &str) -> Map<String, Value> {
    let copy = |key: &str| volume.get(key).cloned().unwrap_or(Value::Null);

    let mut fields = Map::new();
    fields.insert("volumeProvisionType".into(), copy("provisionType"));
    fields.insert(
        "volumeProvisionedCapacityBytes".into(),
        copy("provisionedCapacity"),
    );
    fields.insert("volumeShareable".into(), copy("shareable"));
    fields.insert(
        "volumeName".into(),
        json!(format!("{}{}", device_name, CLONED_VOLUME_SUFFIX)),
    );
    fields.insert("permanent".into(), copy("isPermanent"));
    fields.insert("volumeUri".into(), Value::Null);
    fields.insert("lun".into(), Value::Null);
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> Value {
        json!({
            "type": "ServerProfileV5",
            "uri": "/rest/server-profile-templates/1",
            "uuid": "a1",
            "eTag": "e",
            "state": "Normal",
            "status": "OK",
            "category": "server-profile-templates",
            "enclosureBay": 3,
            "serverHardwareTypeUri": "/rest/server-hardware-types/1",
            "connections": [{
                "id": 1,
                "name": "boot",
                "functionType": "Ethernet",
                "portId": "Flb 1:1-a",
                "requestedMbps": 2500,
                "networkUri": "/rest/ethernet-networks/1",
                "boot": {"priority": "Primary"},
                "mac": "aa:aa:aa:aa:aa:aa",
                "wwpn": "10:00",
                "state": "Deployed"
            }],
            "sanStorage": {
                "manageSanStorage": true,
                "volumeAttachments": [{
                    "id": 1,
                    "volumeUri": "/rest/storage-volumes/v1",
                    "lun": "1",
                    "state": "Attached",
                    "status": "OK",
                    "storagePaths": [{"connectionId": 1, "status": "OK", "isEnabled": true}]
                }]
            }
        })
    }

    fn volumes() -> HashMap<String, Value> {
        let mut volumes = HashMap::new();
        volumes.insert(
            "/rest/storage-volumes/v1".to_string(),
            json!({
                "provisionType": "Thin",
                "provisionedCapacity": "10737418240",
                "shareable": false,
                "deviceVolumeName": "boot-vol",
                "isPermanent": true
            }),
        );
        volumes
    }

    #[test]
    fn test_build_clone_body() {
        let body = build_clone_body(
            &template(),
            "/rest/server-hardware/7",
            "Ironic [n1]",
            &volumes(),
        )
        .unwrap();

        assert_eq!(body["name"], "Ironic [n1]");
        assert_eq!(body["serverHardwareUri"], "/rest/server-hardware/7");
        assert_eq!(body["serverHardwareTypeUri"], "/rest/server-hardware-types/1");
        for field in SERVER_MANAGED_FIELDS {
            assert!(body.get(*field).is_none(), "{} should be stripped", field);
        }

        let connection = body["connections"][0].as_object().unwrap();
        let mut keys: Vec<&str> = connection.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec!["boot", "functionType", "id", "name", "networkUri", "portId", "requestedMbps"]
        );

        let attachment = &body["sanStorage"]["volumeAttachments"][0];
        assert_eq!(attachment["volumeName"], "boot-vol-02");
        assert_eq!(attachment["volumeProvisionType"], "Thin");
        assert_eq!(attachment["volumeProvisionedCapacityBytes"], "10737418240");
        assert_eq!(attachment["volumeShareable"], false);
        assert_eq!(attachment["permanent"], true);
        assert!(attachment["volumeUri"].is_null());
        assert!(attachment["lun"].is_null());
        assert!(attachment.get("state").is_none());
        assert!(attachment.get("status").is_none());
        assert!(attachment["storagePaths"][0].get("status").is_none());
        assert_eq!(attachment["storagePaths"][0]["isEnabled"], true);
    }

    #[test]
    fn test_template_without_san_storage() {
        let template = json!({"uri": "/rest/t/1", "connections": []});
        let body = build_clone_body(&template, "/rest/server-hardware/7", "p", &HashMap::new())
            .unwrap();
        assert!(body.get("uri").is_none());
        assert!(volume_uris(&template).is_empty());
    }

    #[test]
    fn test_missing_volume_document() {
        let err = build_clone_body(&template(), "/rest/server-hardware/7", "p", &HashMap::new())
            .unwrap_err();
        assert!(matches!(err, HardwareError::ResourceNotFound(uri) if uri == "/rest/storage-volumes/v1"));
    }

    #[test]
    fn test_volume_uris() {
        assert_eq!(volume_uris(&template()), vec!["/rest/storage-volumes/v1".to_string()]);
    }
}
