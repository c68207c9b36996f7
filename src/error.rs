use thiserror::Error;

/// Boxed error produced by an injected model collaborator.
pub type ModelError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T> = std::result::Result<T, CardOcrError>;

#[derive(Debug, Error)]
pub enum CardOcrError {
    /// Fewer than 3 card corners were located; the card geometry cannot be
    /// recovered and the image is rejected rather than passed on unrectified.
    #[error("located {found} card corners, need at least 3")]
    InsufficientCorners { found: usize },

    /// The card quadrilateral admits no projective transform (collinear or
    /// coincident corners).
    #[error("card quadrilateral is degenerate")]
    DegenerateQuad,

    /// The segmentation mask was too small to recover a corner from.
    #[error("card mask polygon is empty or collinear")]
    EmptyMask,

    #[error("a required collaborator was not configured: {0}")]
    MissingCollaborator(&'static str),

    #[error("{stage} model failed")]
    Model {
        stage: &'static str,
        #[source]
        source: ModelError,
    },
}

impl CardOcrError {
    pub(crate) fn model(stage: &'static str, source: ModelError) -> Self {
        Self::Model { stage, source }
    }
}
