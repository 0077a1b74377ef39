//! Per-request admission attributes.
//!
//! An [`AdmissionAttributes`] is built once from the inbound review, holds
//! the raw new and old objects, and is discarded after the decision.

use std::collections::BTreeMap;

use kube::core::DynamicObject;
use kube::core::admission::{self, AdmissionRequest};

use super::error::{Error, Result};

/// Extra claim carrying the node a service account token was bound to.
pub const NODE_NAME_CLAIM: &str = "authentication.kubernetes.io/node-name";

/// Subresource name for status updates.
pub const STATUS_SUBRESOURCE: &str = "status";

/// Operations subject to validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Update,
}

impl Operation {
    pub const fn as_str(self) -> &'static str {
        match self {
            Operation::Create => "CREATE",
            Operation::Update => "UPDATE",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Group, version and resource of the object in a request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GroupVersionResource {
    pub group: String,
    pub version: String,
    pub resource: String,
}

impl GroupVersionResource {
    pub fn new(group: &str, version: &str, resource: &str) -> Self {
        Self {
            group: group.to_string(),
            version: version.to_string(),
            resource: resource.to_string(),
        }
    }
}

impl std::fmt::Display for GroupVersionResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.group, self.resource)
    }
}

/// The authenticated caller.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserIdentity {
    pub username: String,
    /// Token claims, values in the order the API server sent them.
    pub extra: BTreeMap<String, Vec<String>>,
}

impl UserIdentity {
    pub fn new(username: &str) -> Self {
        Self {
            username: username.to_string(),
            extra: BTreeMap::new(),
        }
    }

    pub fn with_claim(mut self, key: &str, value: &str) -> Self {
        self.extra
            .entry(key.to_string())
            .or_default()
            .push(value.to_string());
        self
    }

    /// The node the token is bound to. A claim with several values binds
    /// the token to its first one.
    pub fn node_name(&self) -> Option<&str> {
        self.extra
            .get(NODE_NAME_CLAIM)?
            .first()
            .map(String::as_str)
    }
}

/// Everything the engine needs from one admission request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AdmissionAttributes {
    pub uid: String,
    pub operation: Option<Operation>,
    pub resource: GroupVersionResource,
    pub sub_resource: Option<String>,
    pub namespace: String,
    pub name: String,
    pub object: serde_json::Value,
    pub old_object: Option<serde_json::Value>,
    pub user: UserIdentity,
    pub dry_run: bool,
}

impl AdmissionAttributes {
    /// Attributes for a create of `object`.
    pub fn create(resource: GroupVersionResource, object: serde_json::Value) -> Self {
        let (namespace, name) = object_key(&object);
        Self {
            operation: Some(Operation::Create),
            resource,
            namespace,
            name,
            object,
            ..Self::default()
        }
    }

    /// Attributes for an update from `old_object` to `object`.
    pub fn update(
        resource: GroupVersionResource,
        object: serde_json::Value,
        old_object: serde_json::Value,
    ) -> Self {
        let (namespace, name) = object_key(&object);
        Self {
            operation: Some(Operation::Update),
            resource,
            namespace,
            name,
            object,
            old_object: Some(old_object),
            ..Self::default()
        }
    }

    pub fn with_user(mut self, user: UserIdentity) -> Self {
        self.user = user;
        self
    }

    pub fn with_sub_resource(mut self, sub_resource: &str) -> Self {
        self.sub_resource = Some(sub_resource.to_string());
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn is_status_update(&self) -> bool {
        self.sub_resource.as_deref() == Some(STATUS_SUBRESOURCE)
    }

    /// Build attributes from a decoded review request.
    ///
    /// Operations other than create and update carry `operation: None`.
    pub fn from_request(request: &AdmissionRequest<DynamicObject>) -> Result<Self> {
        let operation = match request.operation {
            admission::Operation::Create => Some(Operation::Create),
            admission::Operation::Update => Some(Operation::Update),
            admission::Operation::Delete | admission::Operation::Connect => None,
        };
        let object = request
            .object
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| Error::decode("object", e))?;
        // Deletes may arrive without an object; they are never decoded.
        let object = match (object, operation) {
            (Some(object), _) => object,
            (None, None) => serde_json::Value::Null,
            (None, Some(_)) => return Err(Error::MissingObject),
        };
        let old_object = request
            .old_object
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| Error::decode("old object", e))?;

        let user_info = &request.user_info;
        let extra = user_info.extra.clone().unwrap_or_default();

        Ok(Self {
            uid: request.uid.clone(),
            operation,
            resource: GroupVersionResource::new(
                &request.resource.group,
                &request.resource.version,
                &request.resource.resource,
            ),
            sub_resource: request.sub_resource.clone(),
            namespace: request.namespace.clone().unwrap_or_default(),
            name: request.name.clone(),
            object,
            old_object,
            user: UserIdentity {
                username: user_info.username.clone().unwrap_or_default(),
                extra,
            },
            dry_run: request.dry_run,
        })
    }
}

fn object_key(object: &serde_json::Value) -> (String, String) {
    let field = |name: &str| {
        object
            .pointer(&format!("/metadata/{name}"))
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    (field("namespace"), field("name"))
}
