// Response shapes for the read-only Integration API endpoints.
//
// Most resources are passed through as raw JSON objects: the poller
// forwards them to consumers untouched. Only the fields the setup
// probe needs are typed.

use serde::{Deserialize, Serialize};

/// A raw JSON object as returned by the controller.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// `GET /v1/info`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationInfo {
    #[serde(default)]
    pub application_version: Option<String>,
    #[serde(flatten)]
    pub extra: Record,
}

/// One entry of `GET /v1/sites`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub internal_reference: Option<String>,
}

impl Site {
    /// Human-facing name, falling back to the id.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// `GET /v1/sites/{site}/wans` answers either a bare array or the usual
/// `{data: [...]}` envelope depending on firmware.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum WanListResponse {
    Bare(Vec<Record>),
    Enveloped {
        #[serde(default)]
        data: Vec<Record>,
    },
}

impl WanListResponse {
    pub(crate) fn into_records(self) -> Vec<Record> {
        match self {
            Self::Bare(items) | Self::Enveloped { data: items } => items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wan_shapes_normalize_to_same_records() {
        let wan = json!({ "id": "wan1", "name": "Internet 1" });

        let bare: WanListResponse = serde_json::from_value(json!([wan.clone()])).expect("bare array");
        let wrapped: WanListResponse = serde_json::from_value(json!({ "data": [wan] })).expect("envelope");

        let bare = bare.into_records();
        assert_eq!(bare.len(), 1);
        assert_eq!(bare, wrapped.into_records());
    }

    #[test]
    fn wan_envelope_without_data_is_empty() {
        let resp: WanListResponse = serde_json::from_value(json!({ "totalCount": 0 })).expect("empty envelope");
        assert!(resp.into_records().is_empty());
    }

    #[test]
    fn site_display_name_falls_back_to_id() {
        let site: Site = serde_json::from_value(json!({ "id": "88f7af54" })).expect("site");
        assert_eq!(site.display_name(), "88f7af54");
        assert_eq!(site.internal_reference, None);
    }
}
