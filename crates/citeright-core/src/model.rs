//! Wire and storage types shared by every component.
//!
//! All types use the camelCase JSON shape the add-on's UI surfaces and the
//! backend already speak. Unknown fields are kept in `extra` maps so that a
//! cached copy round-trips exactly what the server sent.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Milliseconds since the Unix epoch, the unit `expiresAt` is expressed in.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

// ── Session ─────────────────────────────────────────────────────────────

/// Locally persisted proof of authentication.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(default)]
    pub token: String,
    #[serde(default, deserialize_with = "deserialize_id_string")]
    pub user_id: String,
    /// Expiry in epoch milliseconds. A session without one is treated as expired.
    #[serde(default, deserialize_with = "epoch_ms::deserialize_opt")]
    pub expires_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Session {
    /// A stored entry missing its token or user id counts as absent.
    pub fn is_usable(&self) -> bool {
        !self.token.trim().is_empty() && !self.user_id.trim().is_empty()
    }

    /// Whether the token is still valid at `now` (epoch ms).
    pub fn is_fresh_at(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|exp| now < exp)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"***")
            .field("user_id", &self.user_id)
            .field("expires_at", &self.expires_at)
            .field("email", &self.email)
            .finish()
    }
}

/// Login input.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

/// User profile as returned by the backend. Only the fields the core reads
/// are typed; the rest passes through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl User {
    /// Human-readable plan name. Missing subscriptions are free trials.
    pub fn subscription_label(&self) -> String {
        match non_empty(&self.subscription).unwrap_or("free") {
            "free" => "Free Trial".to_string(),
            "student" => "Student (15% discount)".to_string(),
            "monthly" => "Monthly".to_string(),
            "annual" => "Annual".to_string(),
            "admin" => "Administrator".to_string(),
            other => other.to_string(),
        }
    }
}

// ── References ──────────────────────────────────────────────────────────

/// Server-assigned reference identifier.
///
/// The backend has sent both numeric and string ids; both are accepted and
/// normalized to their decimal/string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ReferenceId(String);

impl ReferenceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ReferenceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl<'de> Deserialize<'de> for ReferenceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Str(String),
            Int(i64),
            Float(f64),
        }
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Str(s) => ReferenceId(s),
            Raw::Int(n) => ReferenceId(n.to_string()),
            Raw::Float(n) => ReferenceId(n.to_string()),
        })
    }
}

/// Kind of source a reference points at.
///
/// Type strings this version does not know are kept verbatim in `Other`, so a
/// cached or re-posted reference carries exactly the type the server sent. A
/// missing type is `Other("")` and is omitted again on output.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReferenceType {
    Web,
    Case,
    Legislation,
    Journal,
    Book,
    Other(String),
}

impl Default for ReferenceType {
    fn default() -> Self {
        ReferenceType::Other(String::new())
    }
}

impl ReferenceType {
    pub const KNOWN: [ReferenceType; 5] = [
        ReferenceType::Web,
        ReferenceType::Case,
        ReferenceType::Legislation,
        ReferenceType::Journal,
        ReferenceType::Book,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            ReferenceType::Web => "web",
            ReferenceType::Case => "case",
            ReferenceType::Legislation => "legislation",
            ReferenceType::Journal => "journal",
            ReferenceType::Book => "book",
            ReferenceType::Other(raw) => raw,
        }
    }

    /// True when the reference carried no type at all.
    pub fn is_unspecified(&self) -> bool {
        matches!(self, ReferenceType::Other(raw) if raw.is_empty())
    }
}

impl From<String> for ReferenceType {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "web" => ReferenceType::Web,
            "case" => ReferenceType::Case,
            "legislation" => ReferenceType::Legislation,
            "journal" => ReferenceType::Journal,
            "book" => ReferenceType::Book,
            _ => ReferenceType::Other(raw),
        }
    }
}

impl Serialize for ReferenceType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ReferenceType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Option::<String>::deserialize(deserializer)?
            .map(ReferenceType::from)
            .unwrap_or_default())
    }
}

impl fmt::Display for ReferenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReferenceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReferenceType::KNOWN
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!("unknown reference type '{s}' (expected web, case, legislation, journal or book)")
            })
    }
}

/// Bibliographic metadata scraped from the page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Metadata {
    pub fn is_empty(&self) -> bool {
        *self == Metadata::default()
    }

    pub fn author(&self) -> Option<&str> {
        non_empty(&self.author)
    }

    pub fn title(&self) -> Option<&str> {
        non_empty(&self.title)
    }

    /// `publication`, falling back to `website`.
    pub fn publication(&self) -> Option<&str> {
        non_empty(&self.publication).or_else(|| non_empty(&self.website))
    }

    /// `date`, falling back to `publishedDate`.
    pub fn date(&self) -> Option<&str> {
        non_empty(&self.date).or_else(|| non_empty(&self.published_date))
    }

    pub fn url(&self) -> Option<&str> {
        non_empty(&self.url)
    }
}

/// A reference as submitted by a UI surface, before the server assigns an id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceDraft {
    #[serde(rename = "type", default, skip_serializing_if = "ReferenceType::is_unspecified")]
    pub kind: ReferenceType,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted_citation: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ReferenceDraft {
    /// Title used for citations: metadata title first, then the page title.
    pub fn display_title(&self) -> Option<&str> {
        self.metadata.title().or_else(|| {
            let t = self.title.trim();
            (!t.is_empty()).then_some(t)
        })
    }
}

/// A reference as stored remotely and mirrored in the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    pub id: ReferenceId,
    #[serde(rename = "type", default, skip_serializing_if = "ReferenceType::is_unspecified")]
    pub kind: ReferenceType,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
    #[serde(default)]
    pub formatted_citation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ── Serde helpers ───────────────────────────────────────────────────────

/// Deserialize an id the server may send as a string or a number.
pub(crate) fn deserialize_id_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    ReferenceId::deserialize(d).map(|id| id.0)
}

pub(crate) mod epoch_ms {
    use serde::{Deserialize, Deserializer};

    /// Accepts epoch milliseconds as a number or an RFC 3339 timestamp string.
    pub fn deserialize_opt<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Float(f64),
            Str(String),
        }
        Ok(match Option::<Raw>::deserialize(d)? {
            None => None,
            Some(Raw::Int(n)) => Some(n),
            Some(Raw::Float(n)) => Some(n as i64),
            Some(Raw::Str(s)) => match s.trim().parse::<i64>() {
                Ok(n) => Some(n),
                Err(_) => chrono::DateTime::parse_from_rfc3339(s.trim())
                    .ok()
                    .map(|dt| dt.timestamp_millis()),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn session_missing_user_id_is_unusable() {
        let s: Session = serde_json::from_value(json!({"token": "t", "expiresAt": 1})).unwrap();
        assert!(!s.is_usable());
    }

    #[test]
    fn session_without_expiry_is_never_fresh() {
        let s: Session =
            serde_json::from_value(json!({"token": "t", "userId": "u"})).unwrap();
        assert!(s.is_usable());
        assert!(!s.is_fresh_at(0));
    }

    #[test]
    fn session_expiry_accepts_rfc3339() {
        let s: Session = serde_json::from_value(json!({
            "token": "t",
            "userId": "u",
            "expiresAt": "2030-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(s.expires_at, Some(1_893_456_000_000));
    }

    #[test]
    fn session_debug_redacts_token() {
        let s = Session {
            token: "secret-token".into(),
            user_id: "u1".into(),
            expires_at: None,
            email: None,
        };
        assert!(!format!("{s:?}").contains("secret-token"));
    }

    #[test]
    fn numeric_reference_id_is_normalized() {
        let r: Reference = serde_json::from_value(json!({"id": 42, "type": "book"})).unwrap();
        assert_eq!(r.id.as_str(), "42");
        assert_eq!(r.kind, ReferenceType::Book);
    }

    #[test]
    fn unknown_reference_type_keeps_its_name() {
        let d: ReferenceDraft = serde_json::from_value(json!({"type": "podcast"})).unwrap();
        assert_eq!(d.kind, ReferenceType::Other("podcast".into()));
        assert_eq!(serde_json::to_value(&d).unwrap()["type"], "podcast");
    }

    #[test]
    fn unknown_type_reference_round_trips_exactly() {
        let raw = r#"{"id":"r1","type":"treaty","title":"Treaty of Waitangi","formattedCitation":"Treaty of Waitangi 1840"}"#;
        let r: Reference = serde_json::from_str(raw).unwrap();
        assert_eq!(r.kind.as_str(), "treaty");
        assert_eq!(serde_json::to_string(&r).unwrap(), raw);
    }

    #[test]
    fn missing_type_stays_missing() {
        let d: ReferenceDraft = serde_json::from_value(json!({"title": "T"})).unwrap();
        assert!(d.kind.is_unspecified());
        assert_eq!(serde_json::to_value(&d).unwrap(), json!({"title": "T"}));

        let d: ReferenceDraft = serde_json::from_value(json!({"type": null})).unwrap();
        assert!(d.kind.is_unspecified());
    }

    #[test]
    fn unknown_server_fields_survive_a_round_trip() {
        let raw = json!({
            "id": "r1",
            "type": "web",
            "title": "Page",
            "formattedCitation": "c",
            "userId": 7,
            "metadata": {"author": "A", "siteName": "S"}
        });
        let r: Reference = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(r.extra.get("userId"), Some(&json!(7)));
        assert_eq!(serde_json::to_value(&r).unwrap(), raw);
    }

    #[test]
    fn metadata_fallbacks() {
        let m = Metadata {
            website: Some("Site".into()),
            published_date: Some("2021-02-03".into()),
            publication: Some("  ".into()),
            ..Default::default()
        };
        assert_eq!(m.publication(), Some("Site"));
        assert_eq!(m.date(), Some("2021-02-03"));
    }

    #[test]
    fn reference_type_parses_case_insensitively() {
        assert_eq!("Journal".parse::<ReferenceType>(), Ok(ReferenceType::Journal));
        assert!("other".parse::<ReferenceType>().is_err());
    }

    #[test]
    fn subscription_labels() {
        let mut user = User::default();
        assert_eq!(user.subscription_label(), "Free Trial");
        user.subscription = Some("student".into());
        assert_eq!(user.subscription_label(), "Student (15% discount)");
        user.subscription = Some("enterprise".into());
        assert_eq!(user.subscription_label(), "enterprise");
    }
}
