//! Core types for the GLPI REST boundary

use serde::Deserialize;
use std::fmt;

/// Credentials for the GLPI REST API.
///
/// Every call carries the application token and the user token; session
/// calls additionally carry the session token obtained from `initSession`.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Base URL of the REST endpoint, e.g. `http://host/glpi/apirest.php`
    pub url: String,
    /// `App-Token` header value
    pub app_token: String,
    /// `Authorization: user_token <value>` header value
    pub user_token: String,
}

/// Opaque session token returned by `initSession`.
///
/// One token is used for a whole batch run and passed explicitly to every
/// downstream call; there is no hidden global.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionToken(pub String);

impl SessionToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// GLPI resource types this tool provisions or references.
///
/// The variants map 1:1 onto REST endpoint names. The per-type flags
/// encode which lookup strategy the remote server answers reliably for
/// that type (see `provision::resolver`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Entity,
    Group,
    User,
    Line,
    Phone,
    Computer,
    Manufacturer,
    PhoneModel,
    ComputerModel,
    DeviceHardDrive,
    DeviceProcessor,
    DeviceMemory,
    Supplier,
    Contract,
    UserTitle,
    LineOperator,
}

impl ResourceType {
    /// REST endpoint name (`/{endpoint}`, `/search/{endpoint}`, ...)
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::Entity => "Entity",
            Self::Group => "Group",
            Self::User => "User",
            Self::Line => "Line",
            Self::Phone => "Phone",
            Self::Computer => "Computer",
            Self::Manufacturer => "Manufacturer",
            Self::PhoneModel => "PhoneModel",
            Self::ComputerModel => "ComputerModel",
            Self::DeviceHardDrive => "DeviceHardDrive",
            Self::DeviceProcessor => "DeviceProcessor",
            Self::DeviceMemory => "DeviceMemory",
            Self::Supplier => "Supplier",
            Self::Contract => "Contract",
            Self::UserTitle => "UserTitle",
            Self::LineOperator => "LineOperator",
        }
    }

    /// Types whose full-listing endpoint is cheap and reliable, where the
    /// generic search endpoint tends to return ambiguous positionally-keyed
    /// records. For these the resolver scans the listing before searching.
    pub fn listing_first(&self) -> bool {
        matches!(
            self,
            Self::Entity
                | Self::Group
                | Self::Manufacturer
                | Self::PhoneModel
                | Self::ComputerModel
                | Self::DeviceHardDrive
                | Self::DeviceProcessor
                | Self::DeviceMemory
                | Self::Supplier
                | Self::Contract
                | Self::UserTitle
        )
    }

    /// Types whose search accepts an additional parent/scope criterion.
    pub fn scoped_search(&self) -> bool {
        matches!(self, Self::Entity | Self::Group | Self::LineOperator)
    }

    /// Types that get an extra full-listing duplicate check right before
    /// creation, guarding against a search index that lags a concurrent
    /// creation.
    pub fn precheck_before_create(&self) -> bool {
        matches!(self, Self::Entity)
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.endpoint())
    }
}

/// Typed outcome of a creation request.
///
/// The REST layer classifies the raw response here so nothing outside the
/// boundary ever branches on response text. The duplicate detection is a
/// substring match over the phrases GLPI is known to emit for uniqueness
/// violations; the server exposes no structured error code for this, so the
/// table is kept as a compatibility shim confined to [`CreateOutcome::classify`].
#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
    /// Resource created, id extracted from the response
    Created(i64),
    /// Success status but the response carried no usable id; the caller
    /// must locate the record by natural key
    CreatedNoId,
    /// The server rejected the creation as a duplicate
    AlreadyExists,
    /// Any other failure
    Failed { status: u16, body: String },
}

/// Phrases GLPI emits on uniqueness violations, across server versions
/// and localizations.
const DUPLICATE_MARKERS: [&str; 3] = ["Duplicate entry", "already exists", "já existe"];

impl CreateOutcome {
    /// Classify a raw creation response.
    pub fn classify(status: u16, body: &str) -> Self {
        if (200..300).contains(&status) {
            match extract_created_id(body) {
                Some(id) => Self::Created(id),
                None => Self::CreatedNoId,
            }
        } else if DUPLICATE_MARKERS.iter().any(|m| body.contains(m)) {
            Self::AlreadyExists
        } else {
            Self::Failed {
                status,
                body: body.to_string(),
            }
        }
    }
}

/// Pull the new id out of a creation response body.
///
/// The shape varies by server configuration: usually `{"id": N, ...}`,
/// sometimes a one-element array of that object, occasionally an id sent
/// as a string.
fn extract_created_id(body: &str) -> Option<i64> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let object = match &value {
        serde_json::Value::Object(map) => Some(map),
        serde_json::Value::Array(items) => items.first().and_then(|v| v.as_object()),
        _ => None,
    }?;
    super::search::coerce_id(object.get("id")?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_created_object() {
        assert_eq!(
            CreateOutcome::classify(201, r#"{"id": 42, "message": ""}"#),
            CreateOutcome::Created(42)
        );
    }

    #[test]
    fn test_classify_created_array_shape() {
        assert_eq!(
            CreateOutcome::classify(200, r#"[{"id": "7"}]"#),
            CreateOutcome::Created(7)
        );
    }

    #[test]
    fn test_classify_created_without_id() {
        assert_eq!(
            CreateOutcome::classify(200, r#"{"message": "ok"}"#),
            CreateOutcome::CreatedNoId
        );
    }

    #[test]
    fn test_classify_duplicate_phrases() {
        for body in [
            r#"["ERROR", "Duplicate entry 'Acme-0' for key 'unicity'"]"#,
            r#"["ERROR", "An item with this name already exists"]"#,
            r#"["ERROR", "Este item já existe"]"#,
        ] {
            assert_eq!(CreateOutcome::classify(400, body), CreateOutcome::AlreadyExists);
        }
    }

    #[test]
    fn test_classify_failure() {
        let outcome = CreateOutcome::classify(500, "internal error");
        assert_eq!(
            outcome,
            CreateOutcome::Failed {
                status: 500,
                body: "internal error".to_string()
            }
        );
    }

    #[test]
    fn test_resource_type_flags() {
        assert!(ResourceType::Entity.listing_first());
        assert!(ResourceType::Group.listing_first());
        assert!(!ResourceType::User.listing_first());
        assert!(!ResourceType::Phone.listing_first());
        assert!(ResourceType::Entity.scoped_search());
        assert!(ResourceType::LineOperator.scoped_search());
        assert!(!ResourceType::Manufacturer.scoped_search());
        assert!(ResourceType::Entity.precheck_before_create());
        assert!(!ResourceType::Group.precheck_before_create());
    }
}
