/// Queue submission descriptor

use crate::graphics_device::{CommandTargetId, FenceId, PipelineStages, SemaphoreId};

/// One batch of recorded work handed to the graphics queue
///
/// `wait` semaphores are consumed on the GPU timeline before the given stage
/// starts; `signal` semaphores and `fence` are raised once the work completes.
#[derive(Debug, Clone, Copy)]
pub struct Submission<'a> {
    pub command_target: CommandTargetId,
    pub wait: &'a [(SemaphoreId, PipelineStages)],
    pub signal: &'a [SemaphoreId],
    pub fence: Option<FenceId>,
}
