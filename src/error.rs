use thiserror::Error;

/// Structural problems in a scene file: bad parent links or a camera up
/// vector that can't define an orbit. These are caught when the scene is
/// loaded so the render loop never walks a bad chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SceneError {
    #[error("model {index} names parent {parent}, but the scene only has {count} models")]
    ParentOutOfRange {
        index: usize,
        parent: usize,
        count: usize,
    },
    #[error("model {index} names parent {parent}, which is not defined before it")]
    ForwardParent { index: usize, parent: usize },
    #[error("parent chain starting at model {index} loops back on itself")]
    ParentCycle { index: usize },
    #[error("camera approxUp has no length")]
    ZeroUpVector,
}

/// Everything that can go wrong while bringing a scene or model in from disk
/// (or the network on the web).
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("couldn't read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("couldn't fetch '{url}': {reason}")]
    Fetch { url: String, reason: String },
    #[error("couldn't parse '{name}': {source}")]
    Json {
        name: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("couldn't load OBJ '{name}': {source}")]
    Obj {
        name: String,
        #[source]
        source: tobj::LoadError,
    },
    #[error("couldn't decode image '{name}': {source}")]
    Image {
        name: String,
        #[source]
        source: image::ImageError,
    },
    #[error("badly formed face[{face}] in model '{model}'")]
    MalformedFace { model: String, face: usize },
    #[error(transparent)]
    Scene(#[from] SceneError),
}
