use std::path::PathBuf;

use crate::id::{ComponentType, Group, ReactorId};

/// Errors surfaced by registration, typed component access, and config
/// loading.
///
/// Tuple formation never fails: a component that cannot complete a tuple is
/// staged. Lookups of untracked components return empty data.
#[derive(Debug, thiserror::Error)]
pub enum JoinError {
    /// A Rust type was used as a component before being registered.
    #[error("component type `{0}` is not registered")]
    UnregisteredComponent(&'static str),

    /// A component type id that this world never issued.
    #[error("unknown component type {0:?}")]
    UnknownComponentType(ComponentType),

    /// A typeset listed the same component type more than once.
    #[error("reactor {reactor:?} lists component type {ty:?} more than once")]
    DuplicateType { reactor: ReactorId, ty: ComponentType },

    /// A typed action was bound to a typeset of a different length.
    #[error("reactor {reactor:?} expects {expected} component types, action takes {actual}")]
    ArityMismatch {
        reactor: ReactorId,
        expected: usize,
        actual: usize,
    },

    /// A pool was accessed as a Rust type other than the one it stores, or a
    /// typed action was bound to a typeset that differs from its parameters.
    #[error("component type {ty:?} does not store `{expected}`")]
    TypeMismatch {
        ty: ComponentType,
        expected: &'static str,
    },

    /// Every instance number of a group is held by a live stage.
    #[error("no free stage instance left in group {0:?}")]
    InstancesExhausted(Group),

    /// An erased value was pushed into a pool of a different type.
    #[error("value pushed into component type {ty:?} has the wrong Rust type")]
    ValueTypeMismatch { ty: ComponentType },

    /// The config file has an extension we don't support.
    #[error("unsupported config format: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// The config could not be deserialized.
    #[error("config parse error in {file}: {detail}")]
    ConfigParse { file: PathBuf, detail: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
