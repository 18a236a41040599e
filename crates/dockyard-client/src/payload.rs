//! Wire payloads of the build service API.

use dockyard_core::build::{
    ApplicationVersionBuildBundle, ApplicationVersionBuildInfo, BuildInfo, BuildStatus,
};
use dockyard_core::id::{BuildId, ClientKey};
use dockyard_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `app_version` part of a submission.
#[derive(Debug, Serialize)]
pub struct ApplicationVersionPayload<'a> {
    pub name: &'a str,
    pub version: &'a str,
    pub images: Vec<ImagePayload<'a>>,
}

#[derive(Debug, Serialize)]
pub struct ImagePayload<'a> {
    pub key: &'a ClientKey,
    pub name: Option<&'a str>,
    pub description: Option<&'a str>,
    /// Name of the multipart part carrying this image's context.
    pub context_tar_part_name: String,
    pub function_names: &'a [String],
}

impl<'a> ApplicationVersionPayload<'a> {
    /// Describe a bundle, minting one part name per image.
    pub fn from_bundle(bundle: &'a ApplicationVersionBuildBundle) -> Self {
        let images = bundle
            .images
            .iter()
            .map(|image| ImagePayload {
                key: &image.key,
                name: image.name.as_deref(),
                description: image.description.as_deref(),
                context_tar_part_name: uuid::Uuid::new_v4().simple().to_string(),
                function_names: &image.function_names,
            })
            .collect();

        Self {
            name: &bundle.name,
            version: &bundle.version,
            images,
        }
    }
}

/// Response to a submission.
#[derive(Debug, Deserialize)]
pub struct ApplicationVersionResponse {
    pub id: String,
    #[serde(default)]
    pub organization_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub image_builds: Vec<ImageBuildResponse>,
}

impl ApplicationVersionResponse {
    pub fn into_info(self) -> Result<ApplicationVersionBuildInfo> {
        let mut image_builds = BTreeMap::new();
        for build in self.image_builds {
            let key = build.key.clone().ok_or_else(|| {
                Error::Decode(format!("image build {} has no key", build.id))
            })?;
            image_builds.insert(key, BuildInfo::from(build));
        }

        Ok(ApplicationVersionBuildInfo {
            id: self.id,
            name: self.name,
            version: self.version,
            image_builds,
        })
    }
}

/// One image build as reported by the service.
#[derive(Debug, Deserialize)]
pub struct ImageBuildResponse {
    pub id: BuildId,
    #[serde(default)]
    pub key: Option<ClientKey>,
    #[serde(default)]
    pub app_version_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub status: BuildStatus,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub finished_at: Option<String>,
    #[serde(default)]
    pub function_names: Vec<String>,
}

impl From<ImageBuildResponse> for BuildInfo {
    fn from(build: ImageBuildResponse) -> Self {
        BuildInfo {
            id: build.id,
            key: build.key,
            name: build.name,
            status: build.status,
            error_message: build.error_message,
            created_at: build.created_at,
            updated_at: build.updated_at,
            finished_at: build.finished_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use dockyard_core::build::ImageBuildBundle;

    #[test]
    fn test_payload_from_bundle() {
        let bundle = ApplicationVersionBuildBundle {
            name: "app".to_string(),
            version: "v1".to_string(),
            images: vec![ImageBuildBundle {
                key: ClientKey::from("k1"),
                name: Some("worker".to_string()),
                description: None,
                context: Bytes::from_static(b"ctx"),
                function_names: vec!["f".to_string()],
            }],
        };

        let payload = ApplicationVersionPayload::from_bundle(&bundle);
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["name"], "app");
        assert_eq!(json["version"], "v1");
        assert_eq!(json["images"][0]["key"], "k1");
        assert_eq!(json["images"][0]["name"], "worker");
        assert!(json["images"][0]["description"].is_null());
        assert_eq!(json["images"][0]["function_names"][0], "f");
        assert_eq!(
            json["images"][0]["context_tar_part_name"]
                .as_str()
                .unwrap()
                .len(),
            32
        );
    }

    #[test]
    fn test_response_into_info() {
        let json = r#"{
            "id": "av1",
            "organization_id": "org",
            "project_id": "proj",
            "name": "app",
            "version": "v1",
            "image_builds": [
                {
                    "key": "k1",
                    "id": "b1",
                    "app_version_id": "av1",
                    "name": "worker",
                    "description": null,
                    "status": "enqueued",
                    "error_message": null,
                    "created_at": "2024-05-01T12:00:00Z",
                    "updated_at": null,
                    "finished_at": null,
                    "function_names": ["f"]
                }
            ]
        }"#;

        let response: ApplicationVersionResponse = serde_json::from_str(json).unwrap();
        let info = response.into_info().unwrap();

        assert_eq!(info.id, "av1");
        let build = &info.image_builds[&ClientKey::from("k1")];
        assert_eq!(build.id, BuildId::new("b1"));
        assert_eq!(build.status, BuildStatus::Pending);
        assert_eq!(build.display_name(), "worker (b1)");
    }

    #[test]
    fn test_response_build_without_key() {
        let json = r#"{
            "id": "av1",
            "name": "app",
            "version": "v1",
            "image_builds": [{ "id": "b1", "status": "processing" }]
        }"#;

        let response: ApplicationVersionResponse = serde_json::from_str(json).unwrap();
        assert!(matches!(response.into_info(), Err(Error::Decode(_))));
    }
}
