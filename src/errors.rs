//! Error types.
//!
//! Three severities, matching how failures are surfaced:
//!
//! - registration problems are fatal and synchronous ([`DefineError`],
//!   [`CreateError`])
//! - attribute parsing propagates to the caller ([`CoercionError`])
//! - update-cycle failures settle the pipeline and re-raise asynchronously
//!   ([`UpdateError`])

use thiserror::Error;

/// Boxed error returned by component hooks.
pub type HookError = Box<dyn std::error::Error>;

/// Fatal problems registering an element definition.
#[derive(Debug, Error)]
pub enum DefineError {
    /// A definition with no tag name cannot be registered.
    #[error("element definition requires a tag name")]
    MissingTag,

    /// Tag names must contain a hyphen to avoid colliding with built-ins.
    #[error("invalid tag name `{0}`: custom element tags must contain a hyphen")]
    InvalidTag(String),

    /// The tag is already taken.
    #[error("tag name `{0}` is already defined")]
    DuplicateTag(String),
}

/// Failure to instantiate an element from the registry.
#[derive(Debug, Error)]
pub enum CreateError {
    /// No definition was registered under the tag.
    #[error("no element definition registered for tag `{0}`")]
    NotDefined(String),
}

/// Failure to coerce a raw attribute string into a typed value.
#[derive(Debug, Error)]
pub enum CoercionError {
    /// The raw string did not parse as a number.
    #[error("invalid number attribute value `{0}`")]
    InvalidNumber(String),

    /// The raw string did not parse as JSON.
    #[error("invalid object attribute value")]
    InvalidObject(#[from] serde_json::Error),
}

/// Access to a property name the element does not declare.
#[derive(Debug, Error)]
#[error("unknown reactive property `{0}`")]
pub struct UnknownProperty(pub String);

/// A hook failed during an update cycle.
///
/// The pipeline settles anyway (the instance stays updatable) and the error
/// is re-raised through the scheduler's unhandled-error path.
#[derive(Debug, Error)]
#[error("`{phase}` failed during update cycle: {source}")]
pub struct UpdateError {
    /// Which hook failed: `should_update`, `before_update` or `render`.
    pub phase: &'static str,

    /// The hook's error.
    #[source]
    pub source: HookError,
}
