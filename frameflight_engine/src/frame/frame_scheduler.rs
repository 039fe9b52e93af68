/// Frame scheduler - drives acquire, record, submit and present for one render pass per frame
///
/// Keeps at most `frames_in_flight` submissions on the GPU, never records into
/// a slot or an image the GPU still reads, and rebuilds the surface chain when
/// the window changes size or the swapchain goes stale.
///
/// # Example
///
/// ```ignore
/// let mut scheduler = FrameScheduler::new(device, Extent2D::new(800, 600), SchedulerConfig::default())?;
/// let resize = scheduler.resize_handle();
/// // event thread: resize.notify_resized(new_size.into());
/// loop {
///     match scheduler.run_frame(&mut recorder)? {
///         FrameStatus::Presented(frame) => { /* ... */ }
///         FrameStatus::AcquireTimedOut => continue,
///     }
/// }
/// ```

use std::time::Duration;

use crate::error::{Error, Result};
use crate::frame::{
    FrameCounter, FrameResources, FrameSlot, ImageOwnership, ResizeHandle, SurfaceChain,
    SurfaceChainConfig,
};
use crate::graphics_device::{
    AcquireOutcome, CommandTargetId, Extent2D, FramebufferId, GraphicsDevice, PipelineStages,
    Submission, TextureFormat,
};
use crate::{engine_bail, engine_debug, engine_err, engine_info, engine_trace, engine_warn};

const SOURCE: &str = "frameflight::scheduler";

// ============================================================================
// Configuration and reporting types
// ============================================================================

/// Scheduler settings
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    /// Number of frame slots (N). Must be at least 1.
    pub frames_in_flight: usize,
    /// Upper bound on one acquire (`None` = wait indefinitely)
    pub acquire_timeout: Option<Duration>,
    pub chain: SurfaceChainConfig,
    /// How often the extent is re-checked while the window is minimized
    pub extent_poll_interval: Duration,
    /// Rebuilds allowed within one `run_frame` while acquire keeps reporting a stale chain
    pub max_stale_restarts: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: 2,
            acquire_timeout: None,
            chain: SurfaceChainConfig::default(),
            extent_poll_interval: Duration::from_millis(10),
            max_stale_restarts: 4,
        }
    }
}

/// Where the scheduler is in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Acquiring,
    Recording,
    Submitted,
    Presenting,
    Recreating,
    ShutDown,
}

/// What the recorder needs to know about the frame it records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    pub slot: usize,
    pub image_index: u32,
    pub frame_number: u64,
    pub extent: Extent2D,
    pub format: TextureFormat,
    pub framebuffer: FramebufferId,
}

/// A frame that made it to the presentation engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramePresented {
    pub slot: usize,
    pub image_index: u32,
    pub frame_number: u64,
    /// The surface chain was rebuilt during this call
    pub recreated: bool,
}

/// Outcome of one `run_frame` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    Presented(FramePresented),
    /// No image became available in time; nothing was recorded. Try again next loop.
    AcquireTimedOut,
}

/// Running totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub frames_presented: u64,
    pub recreations: u64,
    pub stale_acquires: u64,
    pub suboptimal_frames: u64,
    pub acquire_timeouts: u64,
    /// Times an acquired image was still owned by another slot's submission
    pub cross_frame_waits: u64,
    /// Times recreation had to wait for a non-zero window size
    pub degenerate_waits: u64,
}

// ============================================================================
// FrameRecorder
// ============================================================================

/// Records the commands of one frame into the given command target
///
/// The target is already open; the recorder must leave it open (no render
/// pass left active). Implemented for closures.
pub trait FrameRecorder<D: GraphicsDevice + ?Sized> {
    fn record(&mut self, device: &mut D, target: CommandTargetId, frame: &FrameInfo) -> Result<()>;
}

impl<D, F> FrameRecorder<D> for F
where
    D: GraphicsDevice + ?Sized,
    F: FnMut(&mut D, CommandTargetId, &FrameInfo) -> Result<()>,
{
    fn record(&mut self, device: &mut D, target: CommandTargetId, frame: &FrameInfo) -> Result<()> {
        self(device, target, frame)
    }
}

// ============================================================================
// FrameScheduler
// ============================================================================

pub struct FrameScheduler<D: GraphicsDevice> {
    device: D,
    /// `None` only after a failed recreation
    chain: Option<SurfaceChain>,
    resources: FrameResources,
    ownership: ImageOwnership,
    counter: FrameCounter,
    resize: ResizeHandle,
    config: SchedulerConfig,
    state: SchedulerState,
    stats: SchedulerStats,
    /// Extent requested when the surface leaves the size to the swapchain
    desired_extent: Extent2D,
    /// A cycle failed after its acquire; semaphores and ownership are suspect
    needs_recreation: bool,
}

impl<D: GraphicsDevice> FrameScheduler<D> {
    /// Create frame resources, then the surface chain
    pub fn new(mut device: D, initial_extent: Extent2D, config: SchedulerConfig) -> Result<Self> {
        let mut resources = FrameResources::create(&mut device, config.frames_in_flight)?;

        let chain = match SurfaceChain::build(&mut device, initial_extent, &config.chain) {
            Ok(chain) => chain,
            Err(e) => {
                resources.destroy(&mut device).ok();
                return Err(e);
            }
        };

        engine_info!(
            SOURCE,
            "Frame scheduler ready: {} frames in flight, {} swapchain images at {}",
            config.frames_in_flight,
            chain.image_count(),
            chain.extent()
        );

        Ok(Self {
            ownership: ImageOwnership::new(chain.image_count()),
            counter: FrameCounter::new(config.frames_in_flight),
            chain: Some(chain),
            resources,
            device,
            resize: ResizeHandle::new(),
            config,
            state: SchedulerState::Idle,
            stats: SchedulerStats::default(),
            desired_extent: initial_extent,
            needs_recreation: false,
        })
    }

    /// Run one acquire, record, submit, present cycle
    ///
    /// Stale chains are rebuilt transparently. Any other failure is returned
    /// without retry; if it happened after an image was acquired, the next
    /// call rebuilds the chain before acquiring again.
    pub fn run_frame<R>(&mut self, recorder: &mut R) -> Result<FrameStatus>
    where
        R: FrameRecorder<D> + ?Sized,
    {
        if self.state == SchedulerState::ShutDown {
            engine_bail!(SOURCE, kind = Error::Frame, "run_frame called after shutdown");
        }

        let result = self.run_cycle(recorder);
        if result.is_err() && self.state != SchedulerState::ShutDown {
            self.state = SchedulerState::Idle;
        }
        result
    }

    fn run_cycle<R>(&mut self, recorder: &mut R) -> Result<FrameStatus>
    where
        R: FrameRecorder<D> + ?Sized,
    {
        if self.chain.is_none() {
            engine_bail!(SOURCE, kind = Error::Frame, "No surface chain; call recreate_swapchain first");
        }

        let mut recreated = false;
        if self.needs_recreation {
            engine_debug!(SOURCE, "Previous frame failed after acquire, rebuilding first");
            self.recreate()?;
            recreated = true;
        }

        let slot_index = self.counter.slot();
        let mut stale_restarts = 0;

        // 1-2. Wait for the slot, then acquire (restarting on a stale chain)
        let (slot, image_index, suboptimal) = loop {
            self.resources.wait_until_free(&mut self.device, slot_index)?;
            let slot = *self.resources.slot(slot_index)?;

            self.state = SchedulerState::Acquiring;
            let outcome = match self.chain.as_ref() {
                Some(chain) => chain.acquire_next(&mut self.device, self.config.acquire_timeout, slot.image_acquired)?,
                None => engine_bail!(SOURCE, kind = Error::Frame, "Surface chain missing during acquire"),
            };

            match outcome {
                AcquireOutcome::Ready(index) => break (slot, index, false),
                AcquireOutcome::Suboptimal(index) => break (slot, index, true),
                AcquireOutcome::TimedOut => {
                    self.stats.acquire_timeouts += 1;
                    self.state = SchedulerState::Idle;
                    engine_debug!(SOURCE, "Acquire timed out on frame {}", self.counter.value());
                    return Ok(FrameStatus::AcquireTimedOut);
                }
                AcquireOutcome::Stale => {
                    self.stats.stale_acquires += 1;
                    if stale_restarts >= self.config.max_stale_restarts {
                        engine_bail!(
                            SOURCE,
                            kind = Error::Acquire,
                            "Swapchain still stale after {} rebuilds",
                            stale_restarts
                        );
                    }
                    stale_restarts += 1;
                    engine_debug!(SOURCE, "Acquire reported a stale swapchain, rebuilding");
                    self.recreate()?;
                    recreated = true;
                }
            }
        };

        // Until present returns, a failure leaves an acquired image and a signaled semaphore behind
        self.needs_recreation = true;

        // 3. The image may still be read by another slot's submission
        if let Some(owner) = self.ownership.fence_to_wait(image_index, slot.frame_done) {
            self.stats.cross_frame_waits += 1;
            engine_trace!(SOURCE, "Image {} still in flight on another slot, waiting", image_index);
            match self.device.wait_for_fence(owner, None) {
                Ok(true) => {}
                Ok(false) => engine_bail!(SOURCE, kind = Error::Frame, "Wait on image {} owner returned early", image_index),
                Err(e) => engine_bail!(SOURCE, kind = Error::Frame, "Failed to wait on image {} owner: {}", image_index, e),
            }
        }

        // 4. Record
        self.state = SchedulerState::Recording;
        let info = match self.chain.as_ref().and_then(|chain| Some((chain, chain.image(image_index)?))) {
            Some((chain, image)) => FrameInfo {
                slot: slot_index,
                image_index,
                frame_number: self.counter.value(),
                extent: chain.extent(),
                format: chain.format(),
                framebuffer: image.framebuffer,
            },
            None => engine_bail!(SOURCE, kind = Error::Frame, "Acquired image {} is not part of the chain", image_index),
        };

        self.device
            .begin_commands(slot.command_target)
            .map_err(|e| engine_err!(SOURCE, kind = Error::Frame, "Failed to begin commands: {}", e))?;
        recorder
            .record(&mut self.device, slot.command_target, &info)
            .map_err(|e| engine_err!(SOURCE, kind = Error::Frame, "Recording failed: {}", e))?;
        self.device
            .end_commands(slot.command_target)
            .map_err(|e| engine_err!(SOURCE, kind = Error::Frame, "Failed to end commands: {}", e))?;

        // 5. Submit. The fence is reset only now so every early return above leaves it signaled.
        self.submit(slot_index, &slot)?;
        self.ownership.claim(image_index, slot.frame_done);
        self.state = SchedulerState::Submitted;

        // 6. Present, then rebuild if anything says the chain no longer fits
        self.state = SchedulerState::Presenting;
        let presented = match self.chain.as_ref() {
            Some(chain) => chain.present(&mut self.device, image_index, slot.render_complete)?,
            None => engine_bail!(SOURCE, kind = Error::Frame, "Surface chain missing during present"),
        };
        self.needs_recreation = false;
        if suboptimal {
            self.stats.suboptimal_frames += 1;
        }
        if presented.needs_recreation() || suboptimal || self.resize.is_pending() {
            engine_debug!(
                SOURCE,
                "Rebuilding after present ({:?}, suboptimal acquire: {}, resize pending: {})",
                presented,
                suboptimal,
                self.resize.is_pending()
            );
            self.recreate()?;
            recreated = true;
        }

        // 7. Advance
        let frame_number = self.counter.value();
        self.counter.advance();
        self.stats.frames_presented += 1;
        self.state = SchedulerState::Idle;

        Ok(FrameStatus::Presented(FramePresented {
            slot: slot_index,
            image_index,
            frame_number,
            recreated,
        }))
    }

    fn submit(&mut self, slot_index: usize, slot: &FrameSlot) -> Result<()> {
        self.device
            .reset_fence(slot.frame_done)
            .map_err(|e| engine_err!(SOURCE, kind = Error::Frame, "Failed to reset frame fence: {}", e))?;

        let wait = [(slot.image_acquired, PipelineStages::COLOR_ATTACHMENT_OUTPUT)];
        let signal = [slot.render_complete];
        let submission = Submission {
            command_target: slot.command_target,
            wait: &wait,
            signal: &signal,
            fence: Some(slot.frame_done),
        };

        if let Err(e) = self.device.submit(&submission) {
            // Nothing will signal the reset fence now, and the replacement must not be waited on under the old handle
            self.ownership.release(slot.frame_done);
            if let Err(rearm) = self.resources.rearm(&mut self.device, slot_index) {
                engine_warn!(SOURCE, "Failed to re-arm frame fence {}: {}", slot_index, rearm);
            }
            engine_bail!(SOURCE, kind = Error::Frame, "Queue submit failed: {}", e);
        }
        Ok(())
    }

    // ===== RECREATION =====

    /// Rebuild the surface chain now (e.g. to recover after a failed rebuild)
    pub fn recreate_swapchain(&mut self) -> Result<()> {
        if self.state == SchedulerState::ShutDown {
            engine_bail!(SOURCE, kind = Error::Recreation, "recreate_swapchain called after shutdown");
        }
        let result = self.recreate();
        self.state = SchedulerState::Idle;
        result
    }

    /// Tear down and rebuild the chain and everything sized to it
    ///
    /// The frame counter is left untouched.
    fn recreate(&mut self) -> Result<()> {
        self.state = SchedulerState::Recreating;

        self.wait_for_drawable_extent()?;

        self.device
            .wait_idle()
            .map_err(|e| engine_err!(SOURCE, kind = Error::Recreation, "Failed to wait for device idle: {}", e))?;

        if let Some(chain) = self.chain.take() {
            chain.destroy(&mut self.device);
        }
        self.ownership.reset(0);

        let chain = SurfaceChain::build(&mut self.device, self.desired_extent, &self.config.chain)
            .map_err(|e| engine_err!(SOURCE, kind = Error::Recreation, "Failed to rebuild surface chain: {}", e))?;

        let sync_reset = self
            .resources
            .reset_semaphores(&mut self.device)
            .and_then(|_| self.resources.rearm_unsignaled(&mut self.device));
        if let Err(e) = sync_reset {
            chain.destroy(&mut self.device);
            engine_bail!(SOURCE, kind = Error::Recreation, "Failed to reset frame synchronization: {}", e);
        }

        self.ownership.reset(chain.image_count());
        self.needs_recreation = false;
        self.stats.recreations += 1;
        engine_info!(
            SOURCE,
            "Swapchain recreated: {} images at {} (frame {})",
            chain.image_count(),
            chain.extent(),
            self.counter.value()
        );
        self.chain = Some(chain);
        Ok(())
    }

    /// Block while the window is minimized
    fn wait_for_drawable_extent(&mut self) -> Result<()> {
        let mut waited = false;
        loop {
            let generation = self.resize.generation();
            if !self.drawable_is_degenerate()? {
                // Consumes the pending flag together with the extent it belongs to
                let latest = self.resize.take_pending();
                if latest.is_some_and(|extent| extent.is_degenerate()) {
                    continue;
                }
                if let Some(latest) = latest {
                    self.desired_extent = latest;
                }
                if waited {
                    engine_info!(SOURCE, "Drawable size restored, resuming");
                }
                return Ok(());
            }
            if !waited {
                waited = true;
                self.stats.degenerate_waits += 1;
                engine_info!(SOURCE, "Drawable size is zero, waiting for a resize");
            }
            self.resize.wait_for_notification(generation, self.config.extent_poll_interval);
        }
    }

    fn drawable_is_degenerate(&self) -> Result<bool> {
        if self.resize.latest().is_some_and(|extent| extent.is_degenerate()) {
            return Ok(true);
        }
        let caps = self
            .device
            .surface_capabilities()
            .map_err(|e| engine_err!(SOURCE, kind = Error::Recreation, "Failed to query surface: {}", e))?;
        Ok(caps.current_extent.is_some_and(|extent| extent.is_degenerate()))
    }

    // ===== HOST API =====

    /// Report a new drawable size; the chain is rebuilt after the next present
    pub fn notify_resized(&self, extent: Extent2D) {
        self.resize.notify_resized(extent);
    }

    /// Handle for reporting resizes from another thread
    pub fn resize_handle(&self) -> ResizeHandle {
        self.resize.clone()
    }

    /// Wait for the GPU, then release the chain and the frame resources
    ///
    /// Safe to call more than once; also run on drop.
    pub fn shutdown(&mut self) -> Result<()> {
        if self.state == SchedulerState::ShutDown {
            return Ok(());
        }

        if let Err(e) = self.device.wait_idle() {
            engine_warn!(SOURCE, "wait_idle failed during shutdown: {}", e);
        }
        if let Some(chain) = self.chain.take() {
            chain.destroy(&mut self.device);
        }
        self.ownership.reset(0);
        self.state = SchedulerState::ShutDown;

        self.resources.destroy(&mut self.device)?;
        engine_info!(SOURCE, "Frame scheduler shut down after {} frames", self.counter.value());
        Ok(())
    }

    // ===== ACCESSORS =====

    pub fn frame_counter(&self) -> u64 {
        self.counter.value()
    }

    pub fn current_slot(&self) -> usize {
        self.counter.slot()
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// The next `run_frame` rebuilds the chain before acquiring
    pub fn needs_recreation(&self) -> bool {
        self.needs_recreation
    }

    /// Extent of the current chain (`None` after a failed rebuild or shutdown)
    pub fn extent(&self) -> Option<Extent2D> {
        self.chain.as_ref().map(SurfaceChain::extent)
    }

    pub fn image_count(&self) -> usize {
        self.chain.as_ref().map_or(0, SurfaceChain::image_count)
    }

    pub fn surface_chain(&self) -> Option<&SurfaceChain> {
        self.chain.as_ref()
    }

    pub fn image_ownership(&self) -> &ImageOwnership {
        &self.ownership
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }
}

impl<D: GraphicsDevice> Drop for FrameScheduler<D> {
    fn drop(&mut self) {
        self.shutdown().ok();
    }
}

#[cfg(test)]
#[path = "frame_scheduler_tests.rs"]
mod tests;
