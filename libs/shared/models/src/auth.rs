use serde::{Deserialize, Serialize};

/// Which credential family authenticated a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallerKind {
    /// Signed requests, API keys and bearer tokens issued to them.
    Machine,
    /// Browser sessions of the dashboard.
    Dashboard,
}

/// Identity attached to request extensions by the auth middleware.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub id: String,
    pub kind: CallerKind,
}

impl Caller {
    pub fn machine(id: impl Into<String>) -> Self {
        Self { id: id.into(), kind: CallerKind::Machine }
    }

    pub fn dashboard(id: impl Into<String>) -> Self {
        Self { id: id.into(), kind: CallerKind::Dashboard }
    }

    pub fn is_machine(&self) -> bool {
        self.kind == CallerKind::Machine
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtHeader {
    pub alg: String,
    pub typ: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub kind: CallerKind,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub username: String,
    pub exp: i64,
    pub nonce: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}
