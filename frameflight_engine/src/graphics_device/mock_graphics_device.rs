/// Mock GraphicsDevice for unit tests (no GPU required)
///
/// Simulates a GPU timeline: submissions queue up and complete in FIFO order
/// when the CPU waits on one of their fences or on device idle. Every misuse a
/// real driver would punish (recording over in-flight work, resetting a fence
/// the GPU still has to signal, waiting on a semaphore nobody signals) is
/// counted so tests can assert it never happens.
///
/// All state lives behind a shared handle, so a test can inspect or script the
/// device from another thread while a scheduler owns it.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use slotmap::SlotMap;

use crate::error::{Error, Result};
use crate::graphics_device::{
    AcquireOutcome, CommandTargetId, DepthAttachmentId, Extent2D, FenceId, FramebufferDesc,
    FramebufferId, GraphicsDevice, ImageId, ImageViewId, PresentMode, PresentOutcome,
    SemaphoreId, Submission, SurfaceCapabilities, SwapchainDesc, SwapchainId, TextureFormat,
};
use crate::{engine_bail, engine_error};

const SOURCE: &str = "frameflight::mock";

// ============================================================================
// Records
// ============================================================================

#[derive(Debug)]
pub struct MockSwapchain {
    pub desc: SwapchainDesc,
    pub images: Vec<ImageId>,
    next_image: u32,
}

#[derive(Debug, Default)]
pub struct MockCommandTarget {
    pub recording: bool,
    pub in_render_pass: bool,
    pub times_begun: u64,
}

/// One queued submission on the simulated GPU timeline
#[derive(Debug)]
struct PendingWork {
    target: CommandTargetId,
    fence: Option<FenceId>,
}

/// Counters describing everything the device has been asked to do
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MockCounters {
    pub swapchains_created: u32,
    pub swapchains_destroyed: u32,
    pub depth_attachments_created: u32,
    pub framebuffers_created: u32,
    pub semaphores_created: u32,
    pub fences_created: u32,
    pub acquires: u32,
    pub submits: u32,
    pub presents: u32,
    pub wait_idle_calls: u32,
    pub render_passes: u32,
    /// Highest number of submissions pending on the GPU at once
    pub max_outstanding: usize,
    /// Command target begun (or fence reset) while its last submission was still pending
    pub reuse_violations: u32,
    /// Wait on a semaphore with no pending signal, or signal one that is already signaled
    pub semaphore_violations: u32,
}

// ============================================================================
// Mock state
// ============================================================================

/// Simulated device state, shared between the device and the test
#[derive(Debug)]
pub struct MockState {
    pub surface: SurfaceCapabilities,

    pub swapchains: SlotMap<SwapchainId, MockSwapchain>,
    pub images: SlotMap<ImageId, SwapchainId>,
    pub views: SlotMap<ImageViewId, ImageId>,
    pub depth_attachments: SlotMap<DepthAttachmentId, Extent2D>,
    pub framebuffers: SlotMap<FramebufferId, FramebufferDesc>,
    /// Value is the signaled state
    pub fences: SlotMap<FenceId, bool>,
    /// Value is true while a signal is pending (not yet consumed by a wait)
    pub semaphores: SlotMap<SemaphoreId, bool>,
    pub command_targets: SlotMap<CommandTargetId, MockCommandTarget>,

    pending: VecDeque<PendingWork>,

    /// Outcomes returned by the next acquire calls before normal behavior resumes
    pub scripted_acquires: VecDeque<AcquireOutcome>,
    /// Outcomes returned by the next present calls before normal behavior resumes
    pub scripted_presents: VecDeque<PresentOutcome>,
    /// Fail the next submit with a backend error
    pub fail_next_submit: bool,
    /// Number of upcoming swapchain creations that fail
    pub fail_swapchain_creations: u32,
    /// Fail every framebuffer creation
    pub fail_framebuffer_creation: bool,

    /// Image indices in presentation order
    pub presented: Vec<u32>,
    pub counters: MockCounters,
}

impl MockState {
    pub fn new(surface: SurfaceCapabilities) -> Self {
        Self {
            surface,
            swapchains: SlotMap::with_key(),
            images: SlotMap::with_key(),
            views: SlotMap::with_key(),
            depth_attachments: SlotMap::with_key(),
            framebuffers: SlotMap::with_key(),
            fences: SlotMap::with_key(),
            semaphores: SlotMap::with_key(),
            command_targets: SlotMap::with_key(),
            pending: VecDeque::new(),
            scripted_acquires: VecDeque::new(),
            scripted_presents: VecDeque::new(),
            fail_next_submit: false,
            fail_swapchain_creations: 0,
            fail_framebuffer_creation: false,
            presented: Vec::new(),
            counters: MockCounters::default(),
        }
    }

    /// Default surface: 800x600, 2..=8 images, BGRA formats, FIFO + Mailbox
    pub fn default_surface() -> SurfaceCapabilities {
        SurfaceCapabilities {
            current_extent: Some(Extent2D::new(800, 600)),
            min_extent: Extent2D::new(1, 1),
            max_extent: Extent2D::new(4096, 4096),
            min_image_count: 2,
            max_image_count: 8,
            formats: vec![TextureFormat::B8G8R8A8_SRGB, TextureFormat::B8G8R8A8_UNORM],
            present_modes: vec![PresentMode::Fifo, PresentMode::Mailbox],
        }
    }

    /// Change what the window system reports as the drawable size
    pub fn set_surface_extent(&mut self, extent: Option<Extent2D>) {
        self.surface.current_extent = extent;
    }

    /// Submissions not yet completed
    pub fn outstanding(&self) -> usize {
        self.pending.len()
    }

    /// Complete pending work in FIFO order
    ///
    /// Stops after the submission that signals `until` (or drains everything when `None`).
    /// Returns true if `until` was found.
    pub fn complete_work(&mut self, until: Option<FenceId>) -> bool {
        while let Some(work) = self.pending.pop_front() {
            if let Some(fence) = work.fence {
                if let Some(signaled) = self.fences.get_mut(fence) {
                    *signaled = true;
                }
            }
            if until.is_some() && work.fence == until {
                return true;
            }
        }
        until.is_none()
    }

    /// Number of live GPU objects of every kind
    pub fn live_objects(&self) -> usize {
        self.swapchains.len()
            + self.views.len()
            + self.depth_attachments.len()
            + self.framebuffers.len()
            + self.fences.len()
            + self.semaphores.len()
            + self.command_targets.len()
    }

    fn has_pending_target(&self, target: CommandTargetId) -> bool {
        self.pending.iter().any(|work| work.target == target)
    }

    fn has_pending_fence(&self, fence: FenceId) -> bool {
        self.pending.iter().any(|work| work.fence == Some(fence))
    }

    fn chain_matches_surface(&self, swapchain: SwapchainId) -> bool {
        match (self.surface.current_extent, self.swapchains.get(swapchain)) {
            (Some(current), Some(chain)) => current == chain.desc.extent,
            _ => true,
        }
    }

    fn consume_semaphore(&mut self, semaphore: SemaphoreId) -> Result<()> {
        match self.semaphores.get_mut(semaphore) {
            Some(pending) => {
                if !*pending {
                    self.counters.semaphore_violations += 1;
                }
                *pending = false;
                Ok(())
            }
            None => engine_bail!(SOURCE, kind = Error::InvalidResource, "unknown semaphore {:?}", semaphore),
        }
    }

    fn signal_semaphore(&mut self, semaphore: SemaphoreId) -> Result<()> {
        match self.semaphores.get_mut(semaphore) {
            Some(pending) => {
                if *pending {
                    self.counters.semaphore_violations += 1;
                }
                *pending = true;
                Ok(())
            }
            None => engine_bail!(SOURCE, kind = Error::InvalidResource, "unknown semaphore {:?}", semaphore),
        }
    }
}

/// Shared handle to the simulated state
pub type MockStateHandle = Arc<Mutex<MockState>>;

// ============================================================================
// Mock device
// ============================================================================

/// GraphicsDevice backed by `MockState`
pub struct MockGraphicsDevice {
    state: MockStateHandle,
}

impl MockGraphicsDevice {
    pub fn new() -> Self {
        Self::with_surface(MockState::default_surface())
    }

    pub fn with_surface(surface: SurfaceCapabilities) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::new(surface))),
        }
    }

    /// Clone of the shared state handle (for inspection from tests or other threads)
    pub fn state_handle(&self) -> MockStateHandle {
        Arc::clone(&self.state)
    }

    /// Lock the simulated state
    pub fn state(&self) -> MutexGuard<'_, MockState> {
        lock(&self.state)
    }
}

impl Default for MockGraphicsDevice {
    fn default() -> Self {
        Self::new()
    }
}

/// Lock a state handle, ignoring poisoning from a panicked test thread
pub fn lock(state: &MockStateHandle) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl GraphicsDevice for MockGraphicsDevice {
    fn surface_capabilities(&self) -> Result<SurfaceCapabilities> {
        Ok(self.state().surface.clone())
    }

    fn create_swapchain(&mut self, desc: &SwapchainDesc) -> Result<SwapchainId> {
        let mut state = self.state();

        if state.fail_swapchain_creations > 0 {
            state.fail_swapchain_creations -= 1;
            engine_bail!(SOURCE, "simulated swapchain creation failure");
        }
        if desc.extent.is_degenerate() {
            engine_bail!(SOURCE, kind = Error::InvalidResource, "swapchain extent {} is degenerate", desc.extent);
        }
        if desc.image_count < state.surface.min_image_count
            || (state.surface.max_image_count > 0 && desc.image_count > state.surface.max_image_count)
        {
            engine_bail!(SOURCE, kind = Error::InvalidResource, "image count {} out of range", desc.image_count);
        }

        let swapchain = state.swapchains.insert(MockSwapchain {
            desc: desc.clone(),
            images: Vec::new(),
            next_image: 0,
        });
        let images: Vec<ImageId> = (0..desc.image_count)
            .map(|_| state.images.insert(swapchain))
            .collect();
        if let Some(record) = state.swapchains.get_mut(swapchain) {
            record.images = images;
        }
        state.counters.swapchains_created += 1;
        Ok(swapchain)
    }

    fn swapchain_images(&self, swapchain: SwapchainId) -> Result<Vec<ImageId>> {
        match self.state().swapchains.get(swapchain) {
            Some(record) => Ok(record.images.clone()),
            None => engine_bail!(SOURCE, kind = Error::InvalidResource, "unknown swapchain {:?}", swapchain),
        }
    }

    fn destroy_swapchain(&mut self, swapchain: SwapchainId) {
        let mut state = self.state();
        if let Some(record) = state.swapchains.remove(swapchain) {
            for image in record.images {
                state.images.remove(image);
            }
            state.counters.swapchains_destroyed += 1;
        }
    }

    fn acquire_next_image(
        &mut self,
        swapchain: SwapchainId,
        _timeout: Option<Duration>,
        signal: SemaphoreId,
    ) -> Result<AcquireOutcome> {
        let mut state = self.state();
        state.counters.acquires += 1;

        let image_count = match state.swapchains.get(swapchain) {
            Some(record) => record.images.len() as u32,
            None => engine_bail!(SOURCE, kind = Error::InvalidResource, "unknown swapchain {:?}", swapchain),
        };

        let outcome = match state.scripted_acquires.pop_front() {
            Some(scripted) => scripted,
            None if !state.chain_matches_surface(swapchain) => AcquireOutcome::Stale,
            None => {
                let record = &mut state.swapchains[swapchain];
                let index = record.next_image;
                record.next_image = (index + 1) % image_count;
                AcquireOutcome::Ready(index)
            }
        };

        // Only a successful acquire signals the semaphore
        match outcome {
            AcquireOutcome::Ready(index) | AcquireOutcome::Suboptimal(index) => {
                if index >= image_count {
                    engine_bail!(SOURCE, kind = Error::InvalidResource, "scripted image index {} out of range", index);
                }
                state.signal_semaphore(signal)?;
            }
            AcquireOutcome::Stale | AcquireOutcome::TimedOut => {}
        }
        Ok(outcome)
    }

    fn present(&mut self, swapchain: SwapchainId, index: u32, wait: SemaphoreId) -> Result<PresentOutcome> {
        let mut state = self.state();

        let image_count = match state.swapchains.get(swapchain) {
            Some(record) => record.images.len() as u32,
            None => engine_bail!(SOURCE, kind = Error::InvalidResource, "unknown swapchain {:?}", swapchain),
        };
        if index >= image_count {
            engine_bail!(SOURCE, kind = Error::InvalidResource, "present index {} out of range", index);
        }

        state.consume_semaphore(wait)?;
        state.counters.presents += 1;
        state.presented.push(index);

        Ok(match state.scripted_presents.pop_front() {
            Some(scripted) => scripted,
            None if !state.chain_matches_surface(swapchain) => PresentOutcome::Stale,
            None => PresentOutcome::Presented,
        })
    }

    fn create_image_view(&mut self, image: ImageId, _format: TextureFormat) -> Result<ImageViewId> {
        let mut state = self.state();
        if !state.images.contains_key(image) {
            engine_bail!(SOURCE, kind = Error::InvalidResource, "unknown image {:?}", image);
        }
        Ok(state.views.insert(image))
    }

    fn destroy_image_view(&mut self, view: ImageViewId) {
        self.state().views.remove(view);
    }

    fn create_depth_attachment(&mut self, extent: Extent2D, format: TextureFormat) -> Result<DepthAttachmentId> {
        if !format.is_depth() {
            engine_bail!(SOURCE, kind = Error::InvalidResource, "{:?} is not a depth format", format);
        }
        let mut state = self.state();
        state.counters.depth_attachments_created += 1;
        Ok(state.depth_attachments.insert(extent))
    }

    fn destroy_depth_attachment(&mut self, depth: DepthAttachmentId) {
        self.state().depth_attachments.remove(depth);
    }

    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> Result<FramebufferId> {
        let mut state = self.state();
        if state.fail_framebuffer_creation {
            engine_error!(SOURCE, "simulated framebuffer failure");
            return Err(Error::OutOfMemory);
        }
        if !state.views.contains_key(desc.color_view) {
            engine_bail!(SOURCE, kind = Error::InvalidResource, "unknown view {:?}", desc.color_view);
        }
        if let Some((depth, _)) = desc.depth {
            if !state.depth_attachments.contains_key(depth) {
                engine_bail!(SOURCE, kind = Error::InvalidResource, "unknown depth attachment {:?}", depth);
            }
        }
        state.counters.framebuffers_created += 1;
        Ok(state.framebuffers.insert(*desc))
    }

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferId) {
        self.state().framebuffers.remove(framebuffer);
    }

    fn create_fence(&mut self, signaled: bool) -> Result<FenceId> {
        let mut state = self.state();
        state.counters.fences_created += 1;
        Ok(state.fences.insert(signaled))
    }

    fn destroy_fence(&mut self, fence: FenceId) {
        self.state().fences.remove(fence);
    }

    fn wait_for_fence(&mut self, fence: FenceId, timeout: Option<Duration>) -> Result<bool> {
        let mut state = self.state();
        match state.fences.get(fence) {
            Some(true) => return Ok(true),
            Some(false) => {}
            None => engine_bail!(SOURCE, kind = Error::InvalidResource, "unknown fence {:?}", fence),
        }

        if state.has_pending_fence(fence) && state.complete_work(Some(fence)) {
            return Ok(true);
        }
        // Unsignaled and nothing queued will signal it
        match timeout {
            Some(_) => Ok(false),
            None => engine_bail!(SOURCE, "wait on fence {:?} that can never signal", fence),
        }
    }

    fn is_fence_signaled(&self, fence: FenceId) -> Result<bool> {
        match self.state().fences.get(fence) {
            Some(signaled) => Ok(*signaled),
            None => engine_bail!(SOURCE, kind = Error::InvalidResource, "unknown fence {:?}", fence),
        }
    }

    fn reset_fence(&mut self, fence: FenceId) -> Result<()> {
        let mut state = self.state();
        if state.has_pending_fence(fence) {
            state.counters.reuse_violations += 1;
        }
        match state.fences.get_mut(fence) {
            Some(signaled) => {
                *signaled = false;
                Ok(())
            }
            None => engine_bail!(SOURCE, kind = Error::InvalidResource, "unknown fence {:?}", fence),
        }
    }

    fn create_semaphore(&mut self) -> Result<SemaphoreId> {
        let mut state = self.state();
        state.counters.semaphores_created += 1;
        Ok(state.semaphores.insert(false))
    }

    fn destroy_semaphore(&mut self, semaphore: SemaphoreId) {
        self.state().semaphores.remove(semaphore);
    }

    fn create_command_target(&mut self) -> Result<CommandTargetId> {
        Ok(self.state().command_targets.insert(MockCommandTarget::default()))
    }

    fn destroy_command_target(&mut self, target: CommandTargetId) {
        self.state().command_targets.remove(target);
    }

    fn begin_commands(&mut self, target: CommandTargetId) -> Result<()> {
        let mut state = self.state();
        if state.has_pending_target(target) {
            state.counters.reuse_violations += 1;
        }
        match state.command_targets.get_mut(target) {
            Some(record) => {
                record.recording = true;
                record.in_render_pass = false;
                record.times_begun += 1;
                Ok(())
            }
            None => engine_bail!(SOURCE, kind = Error::InvalidResource, "unknown command target {:?}", target),
        }
    }

    fn end_commands(&mut self, target: CommandTargetId) -> Result<()> {
        let mut state = self.state();
        match state.command_targets.get_mut(target) {
            Some(record) if record.recording && !record.in_render_pass => {
                record.recording = false;
                Ok(())
            }
            Some(_) => engine_bail!(SOURCE, kind = Error::InvalidResource, "command target {:?} not in a closable state", target),
            None => engine_bail!(SOURCE, kind = Error::InvalidResource, "unknown command target {:?}", target),
        }
    }

    fn begin_render_pass(
        &mut self,
        target: CommandTargetId,
        framebuffer: FramebufferId,
        _clear_color: [f32; 4],
    ) -> Result<()> {
        let mut state = self.state();
        if !state.framebuffers.contains_key(framebuffer) {
            engine_bail!(SOURCE, kind = Error::InvalidResource, "unknown framebuffer {:?}", framebuffer);
        }
        match state.command_targets.get_mut(target) {
            Some(record) if record.recording && !record.in_render_pass => {
                record.in_render_pass = true;
            }
            Some(_) => engine_bail!(SOURCE, kind = Error::InvalidResource, "command target {:?} is not recording", target),
            None => engine_bail!(SOURCE, kind = Error::InvalidResource, "unknown command target {:?}", target),
        }
        state.counters.render_passes += 1;
        Ok(())
    }

    fn end_render_pass(&mut self, target: CommandTargetId) -> Result<()> {
        let mut state = self.state();
        match state.command_targets.get_mut(target) {
            Some(record) if record.in_render_pass => {
                record.in_render_pass = false;
                Ok(())
            }
            Some(_) => engine_bail!(SOURCE, kind = Error::InvalidResource, "no render pass open on {:?}", target),
            None => engine_bail!(SOURCE, kind = Error::InvalidResource, "unknown command target {:?}", target),
        }
    }

    fn submit(&mut self, submission: &Submission<'_>) -> Result<()> {
        let mut state = self.state();

        if state.fail_next_submit {
            state.fail_next_submit = false;
            engine_bail!(SOURCE, "simulated queue submit failure");
        }
        match state.command_targets.get(submission.command_target) {
            Some(record) if !record.recording => {}
            Some(_) => engine_bail!(SOURCE, kind = Error::InvalidResource, "command target {:?} still recording", submission.command_target),
            None => engine_bail!(SOURCE, kind = Error::InvalidResource, "unknown command target {:?}", submission.command_target),
        }

        for (semaphore, _) in submission.wait {
            state.consume_semaphore(*semaphore)?;
        }
        // Semaphore signals are ordered on the queue, so they can be raised right away
        for semaphore in submission.signal {
            state.signal_semaphore(*semaphore)?;
        }

        state.pending.push_back(PendingWork {
            target: submission.command_target,
            fence: submission.fence,
        });
        state.counters.submits += 1;
        state.counters.max_outstanding = state.counters.max_outstanding.max(state.pending.len());
        Ok(())
    }

    fn wait_idle(&mut self) -> Result<()> {
        let mut state = self.state();
        state.counters.wait_idle_calls += 1;
        state.complete_work(None);
        Ok(())
    }
}

#[cfg(test)]
#[path = "mock_graphics_device_tests.rs"]
mod tests;
