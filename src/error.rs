use thiserror::Error;

/// Result type for pipeline construction
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors detected while building a pipeline
///
/// These are the only errors the crate defines. Nothing fails mid-stream: user
/// transforms and generators are expected to be total.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// No stages were given
    #[error("Cannot build a pipeline with no stages")]
    EmptyPipeline,

    /// A stage slot was left empty
    #[error("Stage {index} is missing")]
    NilStage { index: usize },

    /// A source stage was placed somewhere other than the head of the pipeline
    #[error("Producer stage found at position {index}; producers must come first")]
    ProducerPlacement { index: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            PipelineError::EmptyPipeline.to_string(),
            "Cannot build a pipeline with no stages"
        );
        assert_eq!(
            PipelineError::NilStage { index: 2 }.to_string(),
            "Stage 2 is missing"
        );
        assert!(PipelineError::ProducerPlacement { index: 1 }
            .to_string()
            .contains("position 1"));
    }
}
