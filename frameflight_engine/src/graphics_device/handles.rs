/// Typed handles for GPU objects
///
/// Every GPU object is addressed through a `slotmap` key. Backends store the
/// native objects in `SlotMap<Key, Record>` arenas; the core only ever holds
/// keys. A stale key (object already destroyed) is detected by the arena and
/// reported as `Error::InvalidResource` instead of touching a dead handle.

use slotmap::new_key_type;

new_key_type! {
    /// A presentable swapchain (owned by `SurfaceChain`)
    pub struct SwapchainId;

    /// One image of a swapchain (owned by the swapchain itself)
    pub struct ImageId;

    /// A view onto a swapchain image
    pub struct ImageViewId;

    /// Size-dependent depth attachment (image + memory + view)
    pub struct DepthAttachmentId;

    /// Framebuffer binding one color view and the optional depth attachment
    pub struct FramebufferId;

    /// CPU-observable completion fence
    pub struct FenceId;

    /// GPU-side ordering semaphore
    pub struct SemaphoreId;

    /// Recordable unit of GPU work (a command buffer)
    pub struct CommandTargetId;
}
