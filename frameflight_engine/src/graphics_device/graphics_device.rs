/// GraphicsDevice trait - the outbound interface the frame scheduler drives
///
/// A backend owns every GPU object behind typed slotmap keys. Each `create_*`
/// has a matching `destroy_*`; the core guarantees a single owner per handle.

use std::time::Duration;

use crate::error::Result;
use crate::graphics_device::{
    AcquireOutcome, CommandTargetId, DepthAttachmentId, Extent2D, FenceId, FramebufferDesc,
    FramebufferId, ImageId, ImageViewId, PresentOutcome, SemaphoreId, Submission,
    SurfaceCapabilities, SwapchainDesc, SwapchainId, TextureFormat,
};

// ============================================================================
// Device configuration
// ============================================================================

/// Which validation messages are reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugSeverity {
    ErrorsOnly,
    ErrorsAndWarnings,
    All,
}

/// Where validation messages go besides the engine logger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebugOutput {
    /// Engine logger only
    Console,
    /// Engine logger plus an appended log file
    File(String),
    /// Alias of `File`, kept for configs that spell out both sinks
    Both(String),
}

impl DebugOutput {
    pub fn file_path(&self) -> Option<&str> {
        match self {
            DebugOutput::Console => None,
            DebugOutput::File(path) | DebugOutput::Both(path) => Some(path),
        }
    }
}

/// Message categories to report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugMessageFilter {
    pub show_general: bool,
    pub show_validation: bool,
    pub show_performance: bool,
}

impl Default for DebugMessageFilter {
    fn default() -> Self {
        Self {
            show_general: true,
            show_validation: true,
            show_performance: true,
        }
    }
}

/// Validation message counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationStats {
    pub errors: u32,
    pub warnings: u32,
    pub info: u32,
    pub verbose: u32,
}

impl ValidationStats {
    pub fn total(&self) -> u32 {
        self.errors + self.warnings + self.info + self.verbose
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }
}

/// Device creation settings
///
/// Passed to the backend constructor. Nothing here is process-wide: two
/// devices may run with different validation settings.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Enable validation layers and the debug messenger
    pub enable_validation: bool,
    /// Application name reported to the driver
    pub app_name: String,
    /// Application version (major, minor, patch)
    pub app_version: (u32, u32, u32),
    pub debug_severity: DebugSeverity,
    pub debug_output: DebugOutput,
    pub debug_message_filter: DebugMessageFilter,
    /// Count validation messages (see `ValidationStats`)
    pub enable_validation_stats: bool,
    /// Panic on the first validation error (strict mode for CI)
    pub panic_on_validation_error: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            enable_validation: cfg!(debug_assertions),
            app_name: "Frameflight Application".to_string(),
            app_version: (1, 0, 0),
            debug_severity: DebugSeverity::ErrorsAndWarnings,
            debug_output: DebugOutput::Console,
            debug_message_filter: DebugMessageFilter::default(),
            enable_validation_stats: true,
            panic_on_validation_error: false,
        }
    }
}

// ============================================================================
// GraphicsDevice trait
// ============================================================================

/// GPU context the frame scheduler drives
///
/// Timeouts are `Option<Duration>`; `None` waits indefinitely.
pub trait GraphicsDevice: Send {
    // ===== SURFACE / SWAPCHAIN =====

    /// Query what the presentation surface supports right now
    fn surface_capabilities(&self) -> Result<SurfaceCapabilities>;

    fn create_swapchain(&mut self, desc: &SwapchainDesc) -> Result<SwapchainId>;

    /// Images owned by the swapchain, in presentation-index order
    fn swapchain_images(&self, swapchain: SwapchainId) -> Result<Vec<ImageId>>;

    fn destroy_swapchain(&mut self, swapchain: SwapchainId);

    /// Request the next presentable image
    ///
    /// `signal` is raised on the GPU timeline once the image may be rendered to.
    /// Staleness and timeouts are outcomes, not errors.
    fn acquire_next_image(
        &mut self,
        swapchain: SwapchainId,
        timeout: Option<Duration>,
        signal: SemaphoreId,
    ) -> Result<AcquireOutcome>;

    /// Queue image `index` for presentation once `wait` is signaled
    fn present(
        &mut self,
        swapchain: SwapchainId,
        index: u32,
        wait: SemaphoreId,
    ) -> Result<PresentOutcome>;

    // ===== VIEWS / ATTACHMENTS / FRAMEBUFFERS =====

    fn create_image_view(&mut self, image: ImageId, format: TextureFormat) -> Result<ImageViewId>;

    fn destroy_image_view(&mut self, view: ImageViewId);

    fn create_depth_attachment(
        &mut self,
        extent: Extent2D,
        format: TextureFormat,
    ) -> Result<DepthAttachmentId>;

    fn destroy_depth_attachment(&mut self, depth: DepthAttachmentId);

    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> Result<FramebufferId>;

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferId);

    // ===== SYNCHRONIZATION =====

    fn create_fence(&mut self, signaled: bool) -> Result<FenceId>;

    fn destroy_fence(&mut self, fence: FenceId);

    /// Block until `fence` is signaled. Returns `false` if the timeout elapsed first.
    fn wait_for_fence(&mut self, fence: FenceId, timeout: Option<Duration>) -> Result<bool>;

    fn is_fence_signaled(&self, fence: FenceId) -> Result<bool>;

    fn reset_fence(&mut self, fence: FenceId) -> Result<()>;

    fn create_semaphore(&mut self) -> Result<SemaphoreId>;

    fn destroy_semaphore(&mut self, semaphore: SemaphoreId);

    // ===== COMMANDS =====

    fn create_command_target(&mut self) -> Result<CommandTargetId>;

    fn destroy_command_target(&mut self, target: CommandTargetId);

    /// Reset the target and open it for recording
    fn begin_commands(&mut self, target: CommandTargetId) -> Result<()>;

    fn end_commands(&mut self, target: CommandTargetId) -> Result<()>;

    /// Begin the single render pass of a frame, clearing color (and depth) attachments
    fn begin_render_pass(
        &mut self,
        target: CommandTargetId,
        framebuffer: FramebufferId,
        clear_color: [f32; 4],
    ) -> Result<()>;

    fn end_render_pass(&mut self, target: CommandTargetId) -> Result<()>;

    /// Hand recorded work to the graphics queue
    fn submit(&mut self, submission: &Submission<'_>) -> Result<()>;

    /// Block until the GPU has finished all submitted work
    fn wait_idle(&mut self) -> Result<()>;
}
