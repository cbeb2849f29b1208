//! Nexus REST API payloads.

use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;

/// Repository format the backend can serve.
pub const RAW_FORMAT: &str = "raw";

/// Nexus sends `null` for unset fields; decode those as the default value.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// `GET /service/rest/v1/repositories/{name}`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub format: String,
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,
    #[serde(default)]
    pub attributes: serde_json::Value,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetChecksum {
    #[serde(default, deserialize_with = "null_as_default")]
    pub sha1: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub md5: String,
}

/// One stored file. `path` is the key the index is built on.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Asset {
    #[serde(deserialize_with = "null_as_default")]
    pub download_url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub path: String,
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub repository: String,
    #[serde(deserialize_with = "null_as_default")]
    pub format: String,
    #[serde(deserialize_with = "null_as_default")]
    pub checksum: AssetChecksum,
    #[serde(deserialize_with = "null_as_default")]
    pub content_type: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_modified: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_downloaded: Option<OffsetDateTime>,
    #[serde(deserialize_with = "null_as_default")]
    pub uploader: String,
    #[serde(deserialize_with = "null_as_default")]
    pub uploader_ip: String,
    #[serde(deserialize_with = "null_as_default")]
    pub file_size: u64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub blob_created: Option<OffsetDateTime>,
}

/// A page of `GET /service/rest/v1/assets`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetPage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub items: Vec<Asset>,
    #[serde(default)]
    pub continuation_token: Option<String>,
}

/// A search hit: a component and its assets.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Component {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub repository: String,
    #[serde(deserialize_with = "null_as_default")]
    pub format: String,
    pub group: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    pub version: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub assets: Vec<Asset>,
}

/// A page of `GET /service/rest/v1/search`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub items: Vec<Component>,
    #[serde(default)]
    pub continuation_token: Option<String>,
}

impl AssetPage {
    /// Token for the following page, `None` on the last page.
    pub fn next_token(&self) -> Option<&str> {
        self.continuation_token.as_deref().filter(|t| !t.is_empty())
    }
}

impl SearchPage {
    /// Iterate every asset of every component.
    pub fn into_assets(self) -> impl Iterator<Item = Asset> {
        self.items.into_iter().flat_map(|c| c.assets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_page_decodes_nexus_payload() {
        let json = r#"{
            "items": [{
                "downloadUrl": "http://nexus/repository/rocks/foo-1.0.0-1.rockspec",
                "path": "foo-1.0.0-1.rockspec",
                "id": "cm9ja3M6YWJj",
                "repository": "rocks",
                "format": "raw",
                "checksum": {"sha1": "da39a3ee", "md5": "d41d8cd9"},
                "contentType": "text/plain",
                "lastModified": "2024-03-01T10:15:30.123+00:00",
                "lastDownloaded": null,
                "uploader": "deploy",
                "uploaderIp": "10.0.0.5",
                "fileSize": 512,
                "blobCreated": "2024-03-01T10:15:30.100+00:00"
            }],
            "continuationToken": "abc"
        }"#;

        let page: AssetPage = serde_json::from_str(json).unwrap();
        assert_eq!(page.next_token(), Some("abc"));

        let asset = &page.items[0];
        assert_eq!(asset.path, "foo-1.0.0-1.rockspec");
        assert_eq!(asset.checksum.sha1, "da39a3ee");
        assert_eq!(asset.file_size, 512);
        assert!(asset.last_modified.is_some());
        assert!(asset.last_downloaded.is_none());
    }

    #[test]
    fn test_null_fields_decode_as_defaults() {
        let json = r#"{
            "items": [{
                "downloadUrl": "http://nexus/repository/rocks/foo-1.0.0-1.rockspec",
                "path": "foo-1.0.0-1.rockspec",
                "id": "cm9ja3M6YWJj",
                "repository": "rocks",
                "format": "raw",
                "checksum": {"sha1": "da39a3ee", "md5": null},
                "contentType": null,
                "lastModified": null,
                "uploader": null,
                "uploaderIp": null,
                "fileSize": null
            }],
            "continuationToken": null
        }"#;

        let page: AssetPage = serde_json::from_str(json).unwrap();
        let asset = &page.items[0];
        assert_eq!(asset.path, "foo-1.0.0-1.rockspec");
        assert_eq!(asset.uploader, "");
        assert_eq!(asset.uploader_ip, "");
        assert_eq!(asset.content_type, "");
        assert_eq!(asset.checksum.md5, "");
        assert_eq!(asset.file_size, 0);

        let component: Component =
            serde_json::from_str(r#"{"name": "foo", "group": null, "assets": null}"#).unwrap();
        assert!(component.assets.is_empty());
    }

    #[test]
    fn test_last_page_has_no_token() {
        let page: AssetPage =
            serde_json::from_str(r#"{"items": [], "continuationToken": null}"#).unwrap();
        assert_eq!(page.next_token(), None);

        let page: AssetPage =
            serde_json::from_str(r#"{"items": [], "continuationToken": ""}"#).unwrap();
        assert_eq!(page.next_token(), None);
    }

    #[test]
    fn test_search_page_flattens_assets() {
        let json = r#"{
            "items": [{"name": "foo", "assets": [{"path": "foo.rockspec", "id": "1"}]}],
            "continuationToken": null
        }"#;
        let page: SearchPage = serde_json::from_str(json).unwrap();
        let assets: Vec<_> = page.into_assets().collect();
        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].id, "1");
    }
}
