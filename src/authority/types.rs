//! Token-validation result types.

use serde::Serialize;
use serde_json::Value;

/// Identity the authority vouches for. Lives only for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityClaims {
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub programs: Option<Vec<String>>,
    pub valid: bool,
    pub error: Option<String>,
}

impl IdentityClaims {
    /// Claims for a failed validation.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Read the authority's JSON map.
    ///
    /// `valid` must be a literal `true`; `userId` may be a string or a
    /// number; `programs` may be an array or a single string.
    pub fn from_authority(body: &Value) -> Self {
        let valid = body.get("valid").and_then(Value::as_bool).unwrap_or(false);
        let error = text(body.get("error"));
        Self {
            user_id: text(body.get("userId")),
            email: text(body.get("email")),
            role: text(body.get("role")),
            programs: programs(body.get("programs")),
            valid,
            error: if valid {
                None
            } else {
                error.or_else(|| Some("Token is not valid".to_string()))
            },
        }
    }

    /// Programs as sent in `X-User-Programs`.
    pub fn programs_header(&self) -> Option<String> {
        self.programs.as_ref().map(|p| p.join(","))
    }
}

fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn programs(value: Option<&Value>) -> Option<Vec<String>> {
    match value? {
        Value::Array(items) => Some(items.iter().filter_map(|v| text(Some(v))).collect()),
        Value::Null => None,
        other => text(Some(other)).map(|s| vec![s]),
    }
}

/// What a validation call concluded.
///
/// Every variant carries claims so callers can always inspect them; only
/// [`ValidationOutcome::Valid`] has `valid == true`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// The authority accepted the token.
    Valid(IdentityClaims),
    /// The authority answered and rejected the token.
    Invalid(IdentityClaims),
    /// No authoritative answer could be obtained.
    Unavailable(IdentityClaims),
}

impl ValidationOutcome {
    /// Valid or Invalid depending on the claims' flag.
    pub fn from_claims(claims: IdentityClaims) -> Self {
        if claims.valid {
            ValidationOutcome::Valid(claims)
        } else {
            ValidationOutcome::Invalid(claims)
        }
    }

    pub fn claims(&self) -> &IdentityClaims {
        match self {
            ValidationOutcome::Valid(c)
            | ValidationOutcome::Invalid(c)
            | ValidationOutcome::Unavailable(c) => c,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ValidationOutcome::Valid(_) => "valid",
            ValidationOutcome::Invalid(_) => "invalid",
            ValidationOutcome::Unavailable(_) => "unavailable",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_claims_parse() {
        let claims = IdentityClaims::from_authority(&json!({
            "valid": true,
            "userId": 42,
            "email": "ana@example.edu",
            "role": "STUDENT",
            "programs": ["SYS", "ELEC"]
        }));
        assert!(claims.valid);
        assert_eq!(claims.user_id.as_deref(), Some("42"));
        assert_eq!(claims.programs_header().as_deref(), Some("SYS,ELEC"));
        assert!(claims.error.is_none());
    }

    #[test]
    fn test_missing_or_non_bool_valid_is_invalid() {
        let claims = IdentityClaims::from_authority(&json!({"userId": "u1"}));
        assert!(!claims.valid);
        assert!(claims.error.is_some());

        let claims = IdentityClaims::from_authority(&json!({"valid": "true"}));
        assert!(!claims.valid);
    }

    #[test]
    fn test_invalid_keeps_authority_error() {
        let claims = IdentityClaims::from_authority(&json!({"valid": false, "error": "expired"}));
        assert_eq!(claims.error.as_deref(), Some("expired"));
        assert!(matches!(ValidationOutcome::from_claims(claims), ValidationOutcome::Invalid(_)));
    }

    #[test]
    fn test_single_program_string() {
        let claims = IdentityClaims::from_authority(&json!({"valid": true, "programs": "SYS"}));
        assert_eq!(claims.programs, Some(vec!["SYS".to_string()]));
        let claims = IdentityClaims::from_authority(&json!({"valid": true}));
        assert!(claims.programs_header().is_none());
    }
}
