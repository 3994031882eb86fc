pub mod document;
pub mod id;
pub mod model;

pub use document::{ApplyError, SceneDocument, SceneItem};
pub use id::{DEFAULT_TEMP_PREFIXES, ItemId, SceneId};
pub use model::*;
