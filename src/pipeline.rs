use crate::config::{PipelineConfig, ProducerPlacement};
use crate::error::{PipelineError, Result};
use crate::stage::{self, Stage, StageKind, StageRef, StageSlot};
use crate::stream::Stream;
use log::debug;
use std::fmt;

/// Check a stage list against the construction rules
fn validate<T>(stages: &[StageSlot<T>], placement: ProducerPlacement) -> Result<()> {
    if stages.is_empty() {
        return Err(PipelineError::EmptyPipeline);
    }

    if let Some(index) = stages.iter().position(Option::is_none) {
        return Err(PipelineError::NilStage { index });
    }

    if placement == ProducerPlacement::FirstOnly {
        let misplaced = stages
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, slot)| slot.as_ref().is_some_and(|stage| stage.is_source()));
        if let Some((index, _)) = misplaced {
            return Err(PipelineError::ProducerPlacement { index });
        }
    }

    Ok(())
}

/// Stages run one after the other: the output of each stage is the input of
/// the next.
///
/// A pipeline is itself a [`Stage`], so pipelines nest. Streams and workers
/// are only created when [`Stage::run`] is called.
pub struct Pipeline<T> {
    stages: Vec<StageSlot<T>>,
}

impl<T> Clone for Pipeline<T> {
    fn clone(&self) -> Self {
        Self {
            stages: self.stages.clone(),
        }
    }
}

impl<T> Default for Pipeline<T> {
    fn default() -> Self {
        Self { stages: Vec::new() }
    }
}

impl<T> fmt::Debug for Pipeline<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self
            .stages
            .iter()
            .map(|slot| slot.as_ref().map_or("<missing>", |stage| stage.name()))
            .collect();
        f.debug_struct("Pipeline").field("stages", &names).finish()
    }
}

impl<T: Send + 'static> Pipeline<T> {
    /// Build a pipeline, rejecting empty lists, missing stages and producers
    /// that are not in first position.
    pub fn new(stages: Vec<StageSlot<T>>) -> Result<Self> {
        Self::with_config(stages, &PipelineConfig::default())
    }

    /// Build a pipeline using the producer placement rule from `config`
    pub fn with_config(stages: Vec<StageSlot<T>>, config: &PipelineConfig) -> Result<Self> {
        validate(&stages, config.producer_placement)?;
        Ok(Self { stages })
    }

    /// Build a pipeline without validation. If it turns out empty or holds a
    /// missing stage, running it returns the input unchanged.
    pub fn unchecked(stages: Vec<StageSlot<T>>) -> Self {
        Self { stages }
    }
}

impl<T> Pipeline<T> {
    /// Number of stage slots, missing ones included
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Whether any slot is missing its stage
    pub fn has_nil_stage(&self) -> bool {
        stage::has_nil_stage(&self.stages)
    }

    pub fn stages(&self) -> &[StageSlot<T>] {
        &self.stages
    }
}

impl<T: Send + 'static> Stage<T> for Pipeline<T> {
    fn run(&self, input: Stream<T>) -> Stream<T> {
        if self.is_empty() || self.has_nil_stage() {
            return input;
        }

        debug!("pipeline: running {} stages", self.stages.len());
        self.stages
            .iter()
            .flatten()
            .fold(input, |stream, stage| stage.run(stream))
    }

    fn kind(&self) -> StageKind {
        StageKind::Pipeline
    }

    /// A pipeline is a source when it starts with one
    fn is_source(&self) -> bool {
        matches!(self.stages.first(), Some(Some(stage)) if stage.is_source())
    }

    fn name(&self) -> &str {
        "pipeline"
    }
}

/// Builder for constructing pipelines
pub struct PipelineBuilder<T> {
    stages: Vec<StageSlot<T>>,
    placement: ProducerPlacement,
}

impl<T: Send + 'static> PipelineBuilder<T> {
    /// Create a new pipeline builder
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            placement: ProducerPlacement::default(),
        }
    }

    /// Append a stage
    pub fn stage<S: Stage<T> + 'static>(self, stage: S) -> Self {
        self.slot(Some(std::sync::Arc::new(stage)))
    }

    /// Append an already shared stage
    pub fn stage_ref(self, stage: StageRef<T>) -> Self {
        self.slot(Some(stage))
    }

    /// Append a slot as is, missing or not
    pub fn slot(mut self, slot: StageSlot<T>) -> Self {
        self.stages.push(slot);
        self
    }

    pub fn with_producer_placement(mut self, placement: ProducerPlacement) -> Self {
        self.placement = placement;
        self
    }

    /// Build the pipeline
    pub fn build(self) -> Result<Pipeline<T>> {
        let config = PipelineConfig::default().with_producer_placement(self.placement);
        Pipeline::with_config(self.stages, &config)
    }
}

impl<T: Send + 'static> Default for PipelineBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumer::Consumer;
    use crate::producer::Producer;
    use crate::stage::StageExt;
    use crate::stream::bounded;

    fn times(factor: i32) -> StageSlot<i32> {
        Consumer::new(1, move |v: i32| v * factor).slot()
    }

    fn numbers() -> StageSlot<i32> {
        Producer::from_iter(1, || 0..3).slot()
    }

    #[test]
    fn test_pipeline_composes() {
        let pipeline = Pipeline::new(vec![times(2), times(5)]).unwrap();
        let (tx, rx) = bounded(0);
        let out = pipeline.run(rx);

        tx.send(7).unwrap();
        tx.close();

        assert_eq!(out.recv(), Some(70));
        assert_eq!(out.recv(), None);
    }

    #[test]
    fn test_no_stages_error() {
        let result = Pipeline::<i32>::new(vec![]);
        assert!(matches!(result, Err(PipelineError::EmptyPipeline)));
    }

    #[test]
    fn test_nil_stage_error() {
        let result = Pipeline::<i32>::new(vec![None]);
        assert!(matches!(result, Err(PipelineError::NilStage { index: 0 })));
    }

    #[test]
    fn test_producer_placement_error() {
        let result = Pipeline::new(vec![times(2), numbers()]);
        assert!(matches!(
            result,
            Err(PipelineError::ProducerPlacement { index: 1 })
        ));
    }

    #[test]
    fn test_producer_placement_relaxed() {
        let config = PipelineConfig::default().with_producer_placement(ProducerPlacement::Anywhere);
        assert!(Pipeline::with_config(vec![times(2), numbers()], &config).is_ok());
    }

    #[test]
    fn test_nested_source_pipeline_is_source() {
        let inner = Pipeline::new(vec![numbers(), times(2)]).unwrap();
        assert!(inner.is_source());
        let result = Pipeline::new(vec![times(2), inner.slot()]);
        assert!(matches!(
            result,
            Err(PipelineError::ProducerPlacement { index: 1 })
        ));
    }

    #[test]
    fn test_unchecked_empty_is_identity() {
        let pipeline = Pipeline::<i32>::unchecked(vec![]);
        let (_tx, rx) = bounded(0);
        assert!(pipeline.run(rx.clone()).same_stream(&rx));
    }

    #[test]
    fn test_unchecked_nil_is_identity() {
        let pipeline = Pipeline::unchecked(vec![times(2), None]);
        let (_tx, rx) = bounded(0);
        assert!(pipeline.run(rx.clone()).same_stream(&rx));
    }

    #[test]
    fn test_pipeline_builder() {
        let pipeline = PipelineBuilder::new()
            .stage(Consumer::new(1, |v: i32| v + 1))
            .stage(Consumer::new(1, |v: i32| v * 3))
            .build()
            .unwrap();
        assert_eq!(pipeline.len(), 2);

        let (tx, rx) = bounded(1);
        let out = pipeline.run(rx);
        tx.send(1).unwrap();
        tx.close();
        assert_eq!(out.into_iter().collect::<Vec<_>>(), vec![6]);
    }

    #[test]
    fn test_builder_rejects_missing_stage() {
        let result = PipelineBuilder::<i32>::new().slot(None).build();
        assert!(matches!(result, Err(PipelineError::NilStage { index: 0 })));
    }

    #[test]
    fn test_inspection_needs_no_send_bound() {
        let pipeline = Pipeline::<std::rc::Rc<i32>>::default();
        assert_eq!(pipeline.len(), 0);
        assert!(pipeline.is_empty());
        assert!(!pipeline.has_nil_stage());
        assert!(pipeline.stages().is_empty());
    }

    #[test]
    fn test_source_pipeline_with_detached_input() {
        let pipeline = Pipeline::new(vec![numbers(), times(10)]).unwrap();
        let out = pipeline.run(Stream::detached());
        let mut values: Vec<i32> = out.into_iter().collect();
        values.sort_unstable();
        assert_eq!(values, vec![0, 10, 20]);
    }
}
