//! DRM license material normalization
//!
//! `#KODIPROP:inputstream.adaptive.license_key` values come in many shapes.
//! For ClearKey the goal is to recover `kid:key` pairs as 32 lowercase hex
//! characters each; for other schemes only a license server is recognized.
//! Anything unrecognized is kept verbatim.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use tracing::debug;

use crate::models::{ClearKeyPair, DrmInfo};
use crate::utils::url::UrlUtils;

const KEY_BYTES: usize = 16;

/// What a ClearKey license value turned out to be
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClearKeyMaterial {
    LicenseServer(String),
    Keys(Vec<ClearKeyPair>),
    Raw(String),
}

fn base64_engine() -> &'static GeneralPurpose {
    static ENGINE: OnceLock<GeneralPurpose> = OnceLock::new();
    ENGINE.get_or_init(|| {
        GeneralPurpose::new(
            &alphabet::URL_SAFE,
            GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
        )
    })
}

fn hex32_pattern() -> &'static Regex {
    static HEX32: OnceLock<Regex> = OnceLock::new();
    HEX32.get_or_init(|| Regex::new(r"^[0-9a-fA-F]{32}$").expect("valid hex pattern"))
}

fn pair_marker_pattern() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| Regex::new(r"(?i)kid\s*=|key\s*=|;").expect("valid pair marker pattern"))
}

fn is_hex32(value: &str) -> bool {
    hex32_pattern().is_match(value)
}

/// Whether a license type names the ClearKey scheme (`clearkey`, `org.w3.clearkey`)
pub fn is_clearkey(license_type: &str) -> bool {
    license_type.to_lowercase().contains("clearkey")
}

/// Decode standard or URL-safe base64 of exactly 16 bytes into lowercase hex
pub fn base64_to_hex(value: &str) -> Option<String> {
    let url_safe: String = value
        .trim()
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();
    let bytes = base64_engine().decode(url_safe).ok()?;
    (bytes.len() == KEY_BYTES).then(|| hex::encode(bytes))
}

/// Key id as 32 lowercase hex: hex (hyphens allowed) or base64
fn normalize_kid(value: &str) -> Option<String> {
    let value = value.trim();
    let stripped = value.to_lowercase().replace('-', "");
    if value.len() <= 36 && is_hex32(&stripped) {
        Some(stripped)
    } else {
        base64_to_hex(value)
    }
}

/// Key as 32 lowercase hex: hex or base64
fn normalize_key(value: &str) -> Option<String> {
    let value = value.trim();
    if is_hex32(value) {
        Some(value.to_lowercase())
    } else {
        base64_to_hex(value)
    }
}

fn pair(kid: &str, key: &str) -> Option<ClearKeyPair> {
    Some(ClearKeyPair {
        kid: normalize_kid(kid)?,
        key: normalize_key(key)?,
    })
}

/// Normalize an already structured kid/key pair
///
/// Each half is converted to 32 lowercase hex when it is hex or 16-byte
/// base64, and kept trimmed but otherwise untouched when it is neither.
pub fn normalize_clearkey_pair(kid: &str, key: &str) -> ClearKeyPair {
    ClearKeyPair {
        kid: normalize_kid(kid).unwrap_or_else(|| kid.trim().to_string()),
        key: normalize_key(key).unwrap_or_else(|| key.trim().to_string()),
    }
}

fn keys_from_json(raw: &str) -> Option<Vec<ClearKeyPair>> {
    let doc: Value = serde_json::from_str(raw).ok()?;
    let entries = match &doc {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => map.get("keys")?.as_array()?.as_slice(),
        _ => return None,
    };
    let keys: Vec<ClearKeyPair> = entries
        .iter()
        .filter_map(|entry| {
            let kid = entry.get("kid")?.as_str()?;
            let key = entry.get("k")?.as_str()?;
            pair(kid, key)
        })
        .collect();
    (!keys.is_empty()).then_some(keys)
}

fn keys_from_assignments(raw: &str) -> Option<ClearKeyPair> {
    let joined: String = raw
        .chars()
        .map(|c| if matches!(c, '|' | ';' | ',') { '&' } else { c })
        .collect();
    let mut kid = String::new();
    let mut key = String::new();
    for segment in joined.split('&').map(str::trim).filter(|s| !s.is_empty()) {
        let Some((name, value)) = segment.split_once('=') else {
            continue;
        };
        let value = UrlUtils::decode_component(value.trim()).into_owned();
        match name.trim().to_lowercase().as_str() {
            "kid" | "id" => kid = value,
            "k" | "key" => key = value,
            _ => {}
        }
    }
    if kid.is_empty() || key.is_empty() {
        return None;
    }
    pair(&kid, &key)
}

fn keys_from_colon_pair(raw: &str) -> Option<ClearKeyPair> {
    let (left, right) = raw.split_once(':')?;
    if left.is_empty() {
        return None;
    }
    pair(left, right)
}

/// Interpret a ClearKey license value
///
/// Tried in order: license server URL, JSON key list (`[{kid,k}]` or
/// `{"keys": [...]}`), `kid=..;key=..` assignments, a single `kid:key`
/// pair. Whatever remains is returned as [`ClearKeyMaterial::Raw`].
pub fn parse_clearkey(value: &str) -> ClearKeyMaterial {
    let raw = value.trim();
    if UrlUtils::is_http_url(raw) {
        return ClearKeyMaterial::LicenseServer(raw.to_string());
    }
    if raw.starts_with('{') || raw.starts_with('[') {
        if let Some(keys) = keys_from_json(raw) {
            return ClearKeyMaterial::Keys(keys);
        }
    }
    if pair_marker_pattern().is_match(raw) {
        if let Some(pair) = keys_from_assignments(raw) {
            return ClearKeyMaterial::Keys(vec![pair]);
        }
    }
    if let Some(pair) = keys_from_colon_pair(raw) {
        return ClearKeyMaterial::Keys(vec![pair]);
    }
    ClearKeyMaterial::Raw(raw.to_string())
}

/// Build the DRM record for a source from its license properties
///
/// Returns `None` when no license type was declared.
pub fn build_drm(license_type: Option<&str>, license_key: Option<&str>) -> Option<DrmInfo> {
    let license_type = license_type.map(str::trim).filter(|t| !t.is_empty())?;
    let mut drm = DrmInfo {
        license_type: license_type.to_string(),
        ..Default::default()
    };
    let Some(license_key) = license_key.filter(|k| !k.trim().is_empty()) else {
        return Some(drm);
    };

    if is_clearkey(license_type) {
        match parse_clearkey(license_key) {
            ClearKeyMaterial::Keys(keys) => drm.keys = keys,
            ClearKeyMaterial::LicenseServer(server) => drm.license_server = Some(server),
            ClearKeyMaterial::Raw(_) => {
                debug!(
                    "Unrecognized ClearKey material kept raw: license_type={} length={}",
                    license_type,
                    license_key.len()
                );
                drm.license_key_raw = Some(license_key.to_string());
            }
        }
    } else if UrlUtils::is_http_url(license_key) {
        drm.license_server = Some(license_key.trim().to_string());
    } else {
        drm.license_key_raw = Some(license_key.to_string());
    }
    Some(drm)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KID: &str = "6b657969640000000000000000000000";
    const KEY: &str = "6b657976616c00000000000000000000";

    fn expected() -> ClearKeyMaterial {
        ClearKeyMaterial::Keys(vec![ClearKeyPair {
            kid: KID.to_string(),
            key: KEY.to_string(),
        }])
    }

    #[test]
    fn colon_pair_is_lowercased() {
        let upper = format!("{}:{}", KID.to_uppercase(), KEY.to_uppercase());
        assert_eq!(parse_clearkey(&upper), expected());
    }

    #[test]
    fn short_hex_falls_back_to_raw() {
        let value = "6b6579696400000000000000000000:6b657976616c00000000000000000000";
        assert_eq!(parse_clearkey(value), ClearKeyMaterial::Raw(value.to_string()));
    }

    #[test]
    fn json_key_list_with_base64url_values() {
        // a2V5aWQAAAAAAAAAAAAAAA == 6b657969640000000000000000000000
        let json = r#"{"keys":[{"kty":"oct","kid":"a2V5aWQAAAAAAAAAAAAAAA","k":"a2V5dmFsAAAAAAAAAAAAAA"}],"type":"temporary"}"#;
        assert_eq!(parse_clearkey(json), expected());
    }

    #[test]
    fn json_array_with_hyphenated_kid() {
        let json = format!(
            r#"[{{"kid":"6b657969-6400-0000-0000-000000000000","k":"{}"}}]"#,
            KEY.to_uppercase()
        );
        assert_eq!(parse_clearkey(&json), expected());
    }

    #[test]
    fn structured_pairs_are_normalized_or_kept() {
        let decoded = normalize_clearkey_pair("a2V5aWQAAAAAAAAAAAAAAA", "a2V5dmFsAAAAAAAAAAAAAA");
        assert_eq!(decoded.kid, KID);
        assert_eq!(decoded.key, KEY);

        let hex = normalize_clearkey_pair(" 6B657969-6400-0000-0000-000000000000 ", &KEY.to_uppercase());
        assert_eq!(hex.kid, KID);
        assert_eq!(hex.key, KEY);

        let opaque = normalize_clearkey_pair("Not-A-Kid", " Opaque ");
        assert_eq!(opaque.kid, "Not-A-Kid");
        assert_eq!(opaque.key, "Opaque");
    }

    #[test]
    fn assignment_pairs() {
        let value = format!("kid={KID};key={KEY}");
        assert_eq!(parse_clearkey(&value), expected());
        let value = format!("kid={KID}, k={KEY}");
        assert_eq!(parse_clearkey(&value), expected());
    }

    #[test]
    fn license_server_url() {
        assert_eq!(
            parse_clearkey(" https://license.example.com/ck "),
            ClearKeyMaterial::LicenseServer("https://license.example.com/ck".to_string())
        );
    }

    #[test]
    fn widevine_server_and_raw() {
        let drm = build_drm(
            Some("com.widevine.alpha"),
            Some("https://license.example.com/wv"),
        )
        .unwrap();
        assert_eq!(drm.license_server.as_deref(), Some("https://license.example.com/wv"));
        assert!(drm.keys.is_empty());

        let drm = build_drm(Some("com.widevine.alpha"), Some("opaque-token")).unwrap();
        assert_eq!(drm.license_key_raw.as_deref(), Some("opaque-token"));
    }

    #[test]
    fn clearkey_build_attaches_keys() {
        let drm = build_drm(Some("org.w3.clearkey"), Some(&format!("{KID}:{KEY}"))).unwrap();
        assert_eq!(drm.license_type, "org.w3.clearkey");
        assert_eq!(drm.keys.len(), 1);
        assert_eq!(drm.license_key_raw, None);
    }

    #[test]
    fn no_license_type_means_no_drm() {
        assert_eq!(build_drm(None, Some("abc:def")), None);
        assert_eq!(build_drm(Some("  "), None), None);
    }

    #[test]
    fn base64_must_be_sixteen_bytes() {
        assert_eq!(base64_to_hex("a2V5aWQ"), None);
        assert_eq!(
            base64_to_hex("a2V5aWQAAAAAAAAAAAAAAA==").as_deref(),
            Some(KID)
        );
    }
}
