//! Typed payloads for the storefront endpoints.
//!
//! Every response is validated into one of these shapes at the boundary;
//! nothing downstream touches loosely typed JSON.

use serde::{Deserialize, Deserializer};
use shelfwatch_core::{ProductAvailability, SubstoreId};

use super::SessionError;

/// Response from the pincode lookup endpoint.
#[derive(Debug, Deserialize)]
pub struct PincodeLookupResponse {
    /// Matching pincode records; empty when nothing serves the pincode.
    #[serde(default)]
    pub records: Vec<PincodeRecord>,
}

/// One pincode-to-substore record.
#[derive(Debug, Deserialize)]
pub struct PincodeRecord {
    #[serde(default)]
    pub pincode: String,
    /// Name of the substore serving this pincode.
    pub substore: String,
}

impl PincodeLookupResponse {
    /// The substore name of the first usable record, if any.
    #[must_use]
    pub fn substore_name(self) -> Option<String> {
        self.records
            .into_iter()
            .map(|record| record.substore)
            .find(|name| !name.is_empty())
    }
}

/// Parsed `user/info.js` document.
#[derive(Debug, Deserialize)]
pub struct SessionInfo {
    #[serde(default)]
    data: Option<SessionData>,
}

#[derive(Debug, Deserialize)]
struct SessionData {
    #[serde(default)]
    substore_id: Option<String>,
}

impl SessionInfo {
    /// The substore the session is bound to, when the handshake completed.
    #[must_use]
    pub fn substore_id(&self) -> Option<SubstoreId> {
        self.data
            .as_ref()
            .and_then(|data| data.substore_id.as_deref())
            .filter(|id| !id.is_empty())
            .map(SubstoreId::new)
    }
}

/// Parse the session info document.
///
/// The endpoint serves a JavaScript assignment (`session = {...}`,
/// sometimes with a trailing semicolon) rather than bare JSON, so the
/// prelude is stripped before parsing.
///
/// # Errors
///
/// Returns `SessionError::Parse` when the remaining text is not the
/// expected JSON document.
pub fn parse_session_info(body: &str) -> Result<SessionInfo, SessionError> {
    serde_json::from_str(strip_session_prelude(body))
        .map_err(|e| SessionError::Parse(format!("session info: {e}")))
}

fn strip_session_prelude(body: &str) -> &str {
    let mut rest = body.trim();
    if let Some(tail) = rest.strip_prefix("session") {
        let tail = tail.trim_start();
        if let Some(tail) = tail.strip_prefix('=') {
            rest = tail.trim_start();
        }
    }
    rest.strip_suffix(';').unwrap_or(rest).trim_end()
}

/// Response from the inventory list endpoint.
#[derive(Debug, Deserialize)]
pub struct ProductListResponse {
    #[serde(default)]
    pub data: Vec<ProductRecord>,
}

/// One product row from the inventory list.
#[derive(Debug, Deserialize)]
pub struct ProductRecord {
    /// Upstream product identifier.
    #[serde(rename = "_id")]
    pub id: String,
    /// The storefront encodes availability as `1`/`0`.
    #[serde(default, deserialize_with = "flag_from_any")]
    pub available: bool,
}

impl ProductListResponse {
    /// Collapse the rows into availability entries.
    #[must_use]
    pub fn availabilities(self) -> Vec<ProductAvailability> {
        self.data
            .into_iter()
            .map(|record| ProductAvailability::new(record.id, record.available))
            .collect()
    }
}

/// Accept `1`/`0` integers, booleans, and null for availability flags.
fn flag_from_any<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Number(i64),
    }

    Ok(match Option::<Flag>::deserialize(deserializer)? {
        Some(Flag::Bool(flag)) => flag,
        Some(Flag::Number(n)) => n != 0,
        None => false,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_pincode_lookup_picks_first_record() {
        let body = r#"{
            "records": [
                {"pincode": "110001", "substore": "delhi"},
                {"pincode": "110001", "substore": "ncr"}
            ]
        }"#;
        let response: PincodeLookupResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.substore_name().as_deref(), Some("delhi"));
    }

    #[test]
    fn test_pincode_lookup_empty_records() {
        let response: PincodeLookupResponse = serde_json::from_str(r#"{"records": []}"#).unwrap();
        assert_eq!(response.substore_name(), None);

        let response: PincodeLookupResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(response.substore_name(), None);
    }

    #[test]
    fn test_pincode_lookup_skips_blank_names() {
        let body = r#"{"records": [{"substore": ""}, {"substore": "gujarat"}]}"#;
        let response: PincodeLookupResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.substore_name().as_deref(), Some("gujarat"));
    }

    #[test]
    fn test_session_info_strips_assignment_prelude() {
        let info =
            parse_session_info(r#"session = {"data": {"substore_id": "sub_42"}}"#).unwrap();
        assert_eq!(info.substore_id(), Some(SubstoreId::new("sub_42")));
    }

    #[test]
    fn test_session_info_trailing_semicolon() {
        let info =
            parse_session_info("session = {\"data\": {\"substore_id\": \"sub_42\"}};\n").unwrap();
        assert_eq!(info.substore_id(), Some(SubstoreId::new("sub_42")));
    }

    #[test]
    fn test_session_info_bare_json() {
        let info = parse_session_info(r#"{"data": {"substore_id": "sub_42"}}"#).unwrap();
        assert_eq!(info.substore_id(), Some(SubstoreId::new("sub_42")));
    }

    #[test]
    fn test_session_info_unbound() {
        let info = parse_session_info(r#"session = {"data": {}}"#).unwrap();
        assert_eq!(info.substore_id(), None);

        let info = parse_session_info(r#"session = {"data": {"substore_id": ""}}"#).unwrap();
        assert_eq!(info.substore_id(), None);
    }

    #[test]
    fn test_session_info_garbage_is_parse_error() {
        assert!(matches!(
            parse_session_info("<html>maintenance</html>"),
            Err(SessionError::Parse(_))
        ));
    }

    #[test]
    fn test_product_list_numeric_flags() {
        let body = r#"{
            "data": [
                {"_id": "p1", "available": 1},
                {"_id": "p2", "available": 0},
                {"_id": "p3", "available": true},
                {"_id": "p4", "available": null},
                {"_id": "p5"}
            ]
        }"#;
        let response: ProductListResponse = serde_json::from_str(body).unwrap();
        let entries = response.availabilities();

        assert_eq!(entries.len(), 5);
        let available: Vec<bool> = entries.iter().map(|e| e.available).collect();
        assert_eq!(available, vec![true, false, true, false, false]);
    }

    #[test]
    fn test_product_list_missing_data() {
        let response: ProductListResponse = serde_json::from_str("{}").unwrap();
        assert!(response.availabilities().is_empty());
    }
}
