//! Graph description validation.
//!
//! Checks that a [`GraphDescription`] can be turned into a graph: names are
//! unique, every connection endpoint exists, and every endpoint faces the
//! right way. Rate consistency is left to the scheduler.
//!
//! # Example
//!
//! ```rust
//! use cadence_config::{ConnectionDescription, GraphDescription, ValidationError};
//!
//! let description = GraphDescription::new("broken")
//!     .with_connection(ConnectionDescription::new("a.out", ["b.in"]));
//! let err = description.validate().unwrap_err();
//! assert!(matches!(err, ValidationError::Multiple(_)));
//! ```

use std::collections::HashSet;

use cadence_core::PortDirection;
use thiserror::Error;

use crate::description::{Endpoint, GraphDescription};

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The graph has no name.
    #[error("graph name is empty")]
    EmptyName,

    /// Two actors share a name.
    #[error("duplicate actor '{0}'")]
    DuplicateActor(String),

    /// Two ports on one owner share a name.
    #[error("duplicate port '{port}' on '{owner}'")]
    DuplicatePort {
        /// Actor name, or `boundary`.
        owner: String,
        /// Repeated port name.
        port: String,
    },

    /// A boundary port is neither input nor output.
    #[error("boundary port '{0}' must be an input or an output")]
    BoundaryDirection(String),

    /// A connection names a port that does not exist.
    #[error("unknown endpoint '{0}'")]
    UnknownEndpoint(String),

    /// A connection endpoint cannot act in the role it was given.
    #[error("endpoint '{endpoint}' cannot be a connection {role}")]
    DirectionMismatch {
        /// Endpoint as written.
        endpoint: String,
        /// `source` or `target`.
        role: &'static str,
    },

    /// A connection has no targets.
    #[error("connection from '{0}' has no targets")]
    NoTargets(String),

    /// A port appears in more than one connection.
    #[error("endpoint '{0}' is connected more than once")]
    EndpointReused(String),

    /// Multiple validation errors.
    #[error("multiple validation errors: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Role {
    Source,
    Target,
}

impl Role {
    fn label(self) -> &'static str {
        match self {
            Role::Source => "source",
            Role::Target => "target",
        }
    }
}

/// Validates a description, collecting every problem found.
pub fn validate_description(description: &GraphDescription) -> ValidationResult<()> {
    let mut errors = Vec::new();

    if description.name.trim().is_empty() {
        errors.push(ValidationError::EmptyName);
    }

    let mut actors = HashSet::new();
    for actor in &description.actors {
        if !actors.insert(actor.name.as_str()) {
            errors.push(ValidationError::DuplicateActor(actor.name.clone()));
        }
        let mut ports = HashSet::new();
        for port in &actor.ports {
            if !ports.insert(port.name.as_str()) {
                errors.push(ValidationError::DuplicatePort {
                    owner: actor.name.clone(),
                    port: port.name.clone(),
                });
            }
        }
    }

    let mut boundary = HashSet::new();
    for port in &description.boundary {
        if !boundary.insert(port.name.as_str()) {
            errors.push(ValidationError::DuplicatePort {
                owner: "boundary".to_string(),
                port: port.name.clone(),
            });
        }
        if !matches!(port.direction, PortDirection::Input | PortDirection::Output) {
            errors.push(ValidationError::BoundaryDirection(port.name.clone()));
        }
    }

    let mut used = HashSet::new();
    for connection in &description.connections {
        if connection.to.is_empty() {
            errors.push(ValidationError::NoTargets(connection.from.clone()));
        }
        let endpoints = std::iter::once((connection.from.as_str(), Role::Source))
            .chain(connection.to.iter().map(|t| (t.as_str(), Role::Target)));
        for (endpoint, role) in endpoints {
            if let Err(err) = check_endpoint(description, endpoint, role) {
                errors.push(err);
            } else if !used.insert(endpoint) {
                errors.push(ValidationError::EndpointReused(endpoint.to_string()));
            }
        }
    }

    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(ValidationError::Multiple(errors)),
    }
}

fn check_endpoint(
    description: &GraphDescription,
    endpoint: &str,
    role: Role,
) -> ValidationResult<()> {
    let unknown = || ValidationError::UnknownEndpoint(endpoint.to_string());
    let (direction, on_boundary) = match Endpoint::parse(endpoint) {
        Endpoint::Actor { actor, port } => {
            let port = description
                .actors
                .iter()
                .find(|a| a.name == actor)
                .and_then(|a| a.ports.iter().find(|p| p.name == port))
                .ok_or_else(unknown)?;
            (port.direction, false)
        }
        Endpoint::Boundary(name) => {
            let port = description
                .boundary
                .iter()
                .find(|p| p.name == name)
                .ok_or_else(unknown)?;
            (port.direction, true)
        }
    };

    // A boundary input produces on the inside; a boundary output consumes.
    let fits = match (role, on_boundary) {
        (Role::Source, false) | (Role::Target, true) => direction.is_output(),
        (Role::Target, false) | (Role::Source, true) => direction.is_input(),
    };
    if fits {
        Ok(())
    } else {
        Err(ValidationError::DirectionMismatch {
            endpoint: endpoint.to_string(),
            role: role.label(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::description::{ActorDescription, ConnectionDescription, PortDescription};

    fn pair() -> GraphDescription {
        GraphDescription::new("pair")
            .with_actor(ActorDescription::new("p").with_port(PortDescription::output("out")))
            .with_actor(ActorDescription::new("c").with_port(PortDescription::input("in")))
    }

    #[test]
    fn test_valid_pair() {
        let description = pair().with_connection(ConnectionDescription::new("p.out", ["c.in"]));
        assert!(validate_description(&description).is_ok());
    }

    #[test]
    fn test_empty_name() {
        let mut description = pair();
        description.name = "  ".to_string();
        assert_eq!(
            validate_description(&description),
            Err(ValidationError::EmptyName)
        );
    }

    #[test]
    fn test_duplicate_actor() {
        let description = pair().with_actor(ActorDescription::new("p"));
        assert_eq!(
            validate_description(&description),
            Err(ValidationError::DuplicateActor("p".to_string()))
        );
    }

    #[test]
    fn test_duplicate_port() {
        let description = GraphDescription::new("dup").with_actor(
            ActorDescription::new("a")
                .with_port(PortDescription::input("x"))
                .with_port(PortDescription::output("x")),
        );
        assert!(matches!(
            validate_description(&description),
            Err(ValidationError::DuplicatePort { .. })
        ));
    }

    #[test]
    fn test_unknown_endpoint() {
        let description = pair().with_connection(ConnectionDescription::new("p.out", ["c.nope"]));
        assert_eq!(
            validate_description(&description),
            Err(ValidationError::UnknownEndpoint("c.nope".to_string()))
        );
    }

    #[test]
    fn test_reversed_connection() {
        let description = pair().with_connection(ConnectionDescription::new("c.in", ["p.out"]));
        match validate_description(&description) {
            Err(ValidationError::Multiple(errors)) => {
                assert_eq!(errors.len(), 2);
                assert!(errors.contains(&ValidationError::DirectionMismatch {
                    endpoint: "c.in".to_string(),
                    role: "source",
                }));
            }
            other => panic!("expected two direction errors, got {other:?}"),
        }
    }

    #[test]
    fn test_boundary_roles() {
        let description = GraphDescription::new("wrap")
            .with_boundary(PortDescription::input("in"))
            .with_boundary(PortDescription::output("out"))
            .with_actor(
                ActorDescription::new("a")
                    .with_port(PortDescription::input("in"))
                    .with_port(PortDescription::output("out")),
            )
            .with_connection(ConnectionDescription::new("in", ["a.in"]))
            .with_connection(ConnectionDescription::new("a.out", ["out"]));
        assert!(validate_description(&description).is_ok());

        let backwards = GraphDescription::new("wrap")
            .with_boundary(PortDescription::output("out"))
            .with_actor(ActorDescription::new("a").with_port(PortDescription::input("in")))
            .with_connection(ConnectionDescription::new("out", ["a.in"]));
        assert!(validate_description(&backwards).is_err());
    }

    #[test]
    fn test_boundary_must_be_directed() {
        let description = GraphDescription::new("wrap").with_boundary(PortDescription::new(
            "both",
            PortDirection::Bidirectional,
        ));
        assert_eq!(
            validate_description(&description),
            Err(ValidationError::BoundaryDirection("both".to_string()))
        );
    }

    #[test]
    fn test_endpoint_reused() {
        let description = pair()
            .with_actor(ActorDescription::new("d").with_port(PortDescription::input("in")))
            .with_connection(ConnectionDescription::new("p.out", ["c.in"]))
            .with_connection(ConnectionDescription::new("p.out", ["d.in"]));
        assert_eq!(
            validate_description(&description),
            Err(ValidationError::EndpointReused("p.out".to_string()))
        );
    }

    #[test]
    fn test_no_targets() {
        let description = pair().with_connection(ConnectionDescription::new("p.out", [""; 0]));
        assert_eq!(
            validate_description(&description),
            Err(ValidationError::NoTargets("p.out".to_string()))
        );
    }

    #[test]
    fn test_multiple_display() {
        let err = ValidationError::Multiple(vec![
            ValidationError::EmptyName,
            ValidationError::DuplicateActor("a".to_string()),
        ]);
        assert_eq!(
            err.to_string(),
            "multiple validation errors: graph name is empty; duplicate actor 'a'"
        );
    }
}
