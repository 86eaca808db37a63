//! Tags - kind-prefixed identifiers of controller and JAAS entities
//!
//! A tag renders as `<prefix>-<id>`, e.g. `model-<uuid>` or
//! `applicationoffer-admin/prod.mysql`. Every constructor validates the id
//! against the kind's validity predicate, so a `Tag` value is always well
//! formed.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Domain appended to service account client ids
pub const SERVICE_ACCOUNT_DOMAIN: &str = "serviceaccount";

/// Pseudo-user standing for every authenticated user
pub const EVERYONE_USER: &str = "everyone@external";

/// The only controller JAAS exposes access for
pub const JIMM_CONTROLLER: &str = "jimm";

static CLOUD_NAME: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9.-]*$").ok());

static OFFER_URL: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"^(?:[a-zA-Z0-9][a-zA-Z0-9.-]*:)?(?:[a-zA-Z0-9][a-zA-Z0-9.+@-]*/)?[a-z0-9][a-z0-9-]*\.[a-z0-9][a-z0-9-]*$",
    )
    .ok()
});

static USER_EMAIL: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9.+_-]*@[a-zA-Z0-9][a-zA-Z0-9-]*(?:\.[a-zA-Z0-9-]+)+$").ok()
});

static SERVICE_ACCOUNT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9_-]*@serviceaccount$").ok());

fn is_match(re: &LazyLock<Option<Regex>>, s: &str) -> bool {
    re.as_ref().is_some_and(|re| re.is_match(s))
}

pub fn is_valid_uuid(s: &str) -> bool {
    uuid::Uuid::parse_str(s).is_ok()
}

pub fn is_valid_cloud_name(s: &str) -> bool {
    is_match(&CLOUD_NAME, s)
}

/// `[<source>:][<owner>/]<model>.<offer>`
pub fn is_valid_offer_url(s: &str) -> bool {
    is_match(&OFFER_URL, s)
}

pub fn is_valid_user_email(s: &str) -> bool {
    s == EVERYONE_USER || is_match(&USER_EMAIL, s)
}

/// Expects the `@serviceaccount` suffix to be present
pub fn is_valid_service_account_id(s: &str) -> bool {
    is_match(&SERVICE_ACCOUNT, s)
}

/// Append the service account domain unless already present
pub fn with_service_account_domain(id: &str) -> String {
    if id.ends_with(&format!("@{}", SERVICE_ACCOUNT_DOMAIN)) {
        id.to_string()
    } else {
        format!("{}@{}", id, SERVICE_ACCOUNT_DOMAIN)
    }
}

/// Strip the service account domain if present
pub fn without_service_account_domain(id: &str) -> &str {
    id.strip_suffix(SERVICE_ACCOUNT_DOMAIN)
        .and_then(|rest| rest.strip_suffix('@'))
        .unwrap_or(id)
}

/// Entity kind named by a tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TagKind {
    Model,
    Cloud,
    ApplicationOffer,
    User,
    ServiceAccount,
    Group,
    Role,
    Controller,
}

impl TagKind {
    pub const ALL: [TagKind; 8] = [
        TagKind::Model,
        TagKind::Cloud,
        TagKind::ApplicationOffer,
        TagKind::User,
        TagKind::ServiceAccount,
        TagKind::Group,
        TagKind::Role,
        TagKind::Controller,
    ];

    pub fn prefix(self) -> &'static str {
        match self {
            TagKind::Model => "model",
            TagKind::Cloud => "cloud",
            TagKind::ApplicationOffer => "applicationoffer",
            TagKind::User => "user",
            TagKind::ServiceAccount => "serviceaccount",
            TagKind::Group => "group",
            TagKind::Role => "role",
            TagKind::Controller => "controller",
        }
    }

    /// Validity predicate on the id part of a tag
    pub fn is_valid_id(self, id: &str) -> bool {
        match self {
            TagKind::Model | TagKind::Group | TagKind::Role => is_valid_uuid(id),
            TagKind::Cloud => is_valid_cloud_name(id),
            TagKind::ApplicationOffer => is_valid_offer_url(id),
            TagKind::User => is_valid_user_email(id) || is_valid_service_account_id(id),
            TagKind::ServiceAccount => is_valid_service_account_id(id),
            TagKind::Controller => id == JIMM_CONTROLLER,
        }
    }
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.prefix())
    }
}

/// Errors produced when building or parsing tags
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TagError {
    #[error("invalid {kind} id {id:?}")]
    InvalidId { kind: TagKind, id: String },

    #[error("{0:?} is not a valid tag")]
    InvalidTag(String),
}

/// A validated, kind-prefixed identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag {
    kind: TagKind,
    id: String,
}

impl Tag {
    pub fn new(kind: TagKind, id: impl Into<String>) -> Result<Self, TagError> {
        let id = id.into();
        if kind.is_valid_id(&id) {
            Ok(Self { kind, id })
        } else {
            Err(TagError::InvalidId { kind, id })
        }
    }

    /// Tag of a service account, given its client id with or without domain
    pub fn service_account(client_id: &str) -> Result<Self, TagError> {
        Self::new(
            TagKind::ServiceAccount,
            with_service_account_domain(client_id),
        )
    }

    pub fn controller() -> Self {
        Self {
            kind: TagKind::Controller,
            id: JIMM_CONTROLLER.to_string(),
        }
    }

    /// Parse the `<prefix>-<id>` form
    pub fn parse(s: &str) -> Result<Self, TagError> {
        for kind in TagKind::ALL {
            if let Some(id) = s
                .strip_prefix(kind.prefix())
                .and_then(|rest| rest.strip_prefix('-'))
            {
                return Self::new(kind, id);
            }
        }
        Err(TagError::InvalidTag(s.to_string()))
    }

    pub fn kind(&self) -> TagKind {
        self.kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.kind.prefix(), self.id)
    }
}

impl std::str::FromStr for Tag {
    type Err = TagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
