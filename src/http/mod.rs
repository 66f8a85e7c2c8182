//! HTTP surface declaration.
//!
//! The engine never runs a server; routes are declared here and synthesized
//! into the deployment description by the composition root, which owns the
//! actual route objects. Authorization is attached per-route, not globally.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::types::Operation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared routes for one table: a base path plus one method per
/// operation. Operations left out are simply not routable; an integration
/// for an undeclared operation is a composition-time error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteTable {
    pub base_path: String,
    methods: BTreeMap<Operation, HttpMethod>,
    /// Routes served without the authorizer. Supported but unusual; every
    /// route carries the authorizer unless listed here.
    public: BTreeSet<Operation>,
}

impl RouteTable {
    pub fn new(base_path: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            methods: BTreeMap::new(),
            public: BTreeSet::new(),
        }
    }

    pub fn with_route(mut self, operation: Operation, method: HttpMethod) -> Self {
        self.methods.insert(operation, method);
        self
    }

    pub fn with_public_route(mut self, operation: Operation, method: HttpMethod) -> Self {
        self.methods.insert(operation, method);
        self.public.insert(operation);
        self
    }

    pub fn method_for(&self, operation: Operation) -> Option<HttpMethod> {
        self.methods.get(&operation).copied()
    }

    pub fn is_public(&self, operation: Operation) -> bool {
        self.public.contains(&operation)
    }

    pub fn operations(&self) -> impl Iterator<Item = Operation> + '_ {
        self.methods.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_table_tracks_methods_and_public_flags() {
        let routes = RouteTable::new("/pto-service")
            .with_route(Operation::Create, HttpMethod::Post)
            .with_public_route(Operation::Read, HttpMethod::Get);

        assert_eq!(routes.method_for(Operation::Create), Some(HttpMethod::Post));
        assert_eq!(routes.method_for(Operation::Delete), None);
        assert!(!routes.is_public(Operation::Create));
        assert!(routes.is_public(Operation::Read));
        assert_eq!(routes.operations().count(), 2);
    }
}
