//! Dataset persistence port.

use crate::domain::error::PipelineError;
use crate::domain::frame::Frame;
use crate::domain::pipeline::CleanedDataset;

/// Storage for the grouped table and the final train/test artifacts.
pub trait DatasetPort {
    fn write_grouped(&self, grouped: &Frame) -> Result<(), PipelineError>;

    fn read_grouped(&self) -> Result<Frame, PipelineError>;

    /// Persist `x_train`, `y_train`, `x_test` and `y_test`.
    fn write_dataset(&self, dataset: &CleanedDataset) -> Result<(), PipelineError>;
}
