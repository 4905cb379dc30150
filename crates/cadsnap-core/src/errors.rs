//! Error types for the snapping engine.
//!
//! Geometric degeneracy is not an error anywhere in the engine; those cases
//! return `None` and callers fall back. The enums below cover contract
//! violations and bad user input only.

use cadsnap_geom::GeomError;
use thiserror::Error;

/// Top-level error type for the snapping engine.
#[derive(Debug, Error)]
pub enum SnapError {
    #[error(transparent)]
    Geom(#[from] GeomError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Errors from the snap item registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Tie-break requested on an empty snap item registry")]
    Empty,
}

/// Errors while parsing numeric keyboard entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("Nothing typed")]
    Empty,

    #[error("Invalid number: {value}")]
    InvalidNumber { value: String },

    #[error("Unknown unit '{unit}'")]
    UnknownUnit { unit: String },

    #[error("Unexpected trailing input: {rest}")]
    TrailingInput { rest: String },

    #[error("Expected {expected}, got {got}")]
    WrongQuantity { expected: String, got: String },
}

/// Errors while evaluating selected items into a helper.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("Unsupported selection for {operation}: {points} point(s), {lines} line(s), {tris} face(s)")]
    Unsupported {
        operation: String,
        points: usize,
        lines: usize,
        tris: usize,
    },

    #[error("Degenerate selection: {reason}")]
    Degenerate { reason: String },
}

/// Errors from the modal session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("A transform session is already running")]
    AlreadyRunning,

    #[error("No transform session is running")]
    NotRunning,

    #[error("Transform action stack is empty")]
    EmptyStack,

    #[error("Unknown helper: {id}")]
    UnknownHelper { id: u64 },
}
