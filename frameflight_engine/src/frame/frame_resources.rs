/// Frame resources - per-slot synchronization objects and command targets
///
/// One `FrameSlot` per frame in flight. The `frame_done` fence of a slot is the
/// only thing the CPU ever blocks on to keep the GPU at most N frames behind.

use crate::error::{Error, Result};
use crate::graphics_device::{CommandTargetId, FenceId, GraphicsDevice, SemaphoreId};
use crate::{engine_bail, engine_debug, engine_err, engine_warn};

const SOURCE: &str = "frameflight::frame_resources";

/// Synchronization bundle of one frame in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSlot {
    /// Signaled by the swapchain once the acquired image may be rendered to
    pub image_acquired: SemaphoreId,
    /// Signaled by the queue once rendering is done; presentation waits on it
    pub render_complete: SemaphoreId,
    /// Signaled when the slot's last submission completed (created signaled)
    pub frame_done: FenceId,
    pub command_target: CommandTargetId,
}

#[derive(Debug)]
pub struct FrameResources {
    slots: Vec<FrameSlot>,
}

impl FrameResources {
    /// Create `count` slots, each with its fence already signaled
    pub fn create<D: GraphicsDevice + ?Sized>(device: &mut D, count: usize) -> Result<Self> {
        if count == 0 {
            engine_bail!(SOURCE, kind = Error::InvalidResource, "At least one frame in flight is required");
        }

        let mut slots = Vec::with_capacity(count);
        for i in 0..count {
            match create_slot(device) {
                Ok(slot) => slots.push(slot),
                Err(e) => {
                    for slot in slots.into_iter().rev() {
                        release_slot(device, slot);
                    }
                    return Err(engine_err!(
                        SOURCE,
                        kind = Error::InitializationFailed,
                        "Failed to create frame slot {}: {}",
                        i,
                        e
                    ));
                }
            }
        }

        engine_debug!(SOURCE, "Created {} frame slots", count);
        Ok(Self { slots })
    }

    /// Block until slot `index` has no submission in flight
    pub fn wait_until_free<D: GraphicsDevice + ?Sized>(&self, device: &mut D, index: usize) -> Result<()> {
        let slot = self.slot(index)?;
        match device.wait_for_fence(slot.frame_done, None) {
            Ok(true) => Ok(()),
            Ok(false) => engine_bail!(SOURCE, kind = Error::Frame, "Wait on frame slot {} returned before completion", index),
            Err(e) => Err(engine_err!(SOURCE, kind = Error::Frame, "Failed to wait on frame slot {}: {}", index, e)),
        }
    }

    /// Replace every semaphore with a fresh one
    ///
    /// Only valid while the device is idle. A semaphore left with a pending
    /// signal by an abandoned acquire must never be waited on again.
    pub fn reset_semaphores<D: GraphicsDevice + ?Sized>(&mut self, device: &mut D) -> Result<()> {
        for slot in &mut self.slots {
            let image_acquired = device.create_semaphore()?;
            let render_complete = match device.create_semaphore() {
                Ok(semaphore) => semaphore,
                Err(e) => {
                    device.destroy_semaphore(image_acquired);
                    return Err(e);
                }
            };
            device.destroy_semaphore(slot.image_acquired);
            device.destroy_semaphore(slot.render_complete);
            slot.image_acquired = image_acquired;
            slot.render_complete = render_complete;
        }
        Ok(())
    }

    /// Replace the fence of slot `index` with a fresh signaled one
    ///
    /// Used when a fence was reset but its submission never reached the queue,
    /// so nothing would ever signal it again.
    pub fn rearm<D: GraphicsDevice + ?Sized>(&mut self, device: &mut D, index: usize) -> Result<()> {
        let old = self.slot(index)?.frame_done;
        let fence = device.create_fence(true)?;
        device.destroy_fence(old);
        self.slots[index].frame_done = fence;
        Ok(())
    }

    /// Re-arm every fence still unsignaled (device must be idle). Returns how many were replaced.
    pub fn rearm_unsignaled<D: GraphicsDevice + ?Sized>(&mut self, device: &mut D) -> Result<usize> {
        let mut rearmed = 0;
        for index in 0..self.slots.len() {
            if !device.is_fence_signaled(self.slots[index].frame_done)? {
                self.rearm(device, index)?;
                rearmed += 1;
            }
        }
        if rearmed > 0 {
            engine_warn!(SOURCE, "Re-armed {} frame fence(s) left unsignaled", rearmed);
        }
        Ok(rearmed)
    }

    /// Release every slot
    ///
    /// Refuses (and releases nothing) while any fence is unsignaled, since the
    /// GPU may still reference that slot. Idempotent once it succeeded.
    pub fn destroy<D: GraphicsDevice + ?Sized>(&mut self, device: &mut D) -> Result<()> {
        for (index, slot) in self.slots.iter().enumerate() {
            if !device.is_fence_signaled(slot.frame_done)? {
                engine_bail!(
                    SOURCE,
                    kind = Error::InvalidResource,
                    "Frame slot {} still has work in flight",
                    index
                );
            }
        }
        for slot in self.slots.drain(..).rev() {
            release_slot(device, slot);
        }
        Ok(())
    }

    pub fn slot(&self, index: usize) -> Result<&FrameSlot> {
        match self.slots.get(index) {
            Some(slot) => Ok(slot),
            None => engine_bail!(SOURCE, kind = Error::InvalidResource, "Frame slot {} out of range", index),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

fn create_slot<D: GraphicsDevice + ?Sized>(device: &mut D) -> Result<FrameSlot> {
    let image_acquired = device.create_semaphore()?;

    let render_complete = match device.create_semaphore() {
        Ok(semaphore) => semaphore,
        Err(e) => {
            device.destroy_semaphore(image_acquired);
            return Err(e);
        }
    };

    let frame_done = match device.create_fence(true) {
        Ok(fence) => fence,
        Err(e) => {
            device.destroy_semaphore(render_complete);
            device.destroy_semaphore(image_acquired);
            return Err(e);
        }
    };

    let command_target = match device.create_command_target() {
        Ok(target) => target,
        Err(e) => {
            device.destroy_fence(frame_done);
            device.destroy_semaphore(render_complete);
            device.destroy_semaphore(image_acquired);
            return Err(e);
        }
    };

    Ok(FrameSlot {
        image_acquired,
        render_complete,
        frame_done,
        command_target,
    })
}

fn release_slot<D: GraphicsDevice + ?Sized>(device: &mut D, slot: FrameSlot) {
    device.destroy_command_target(slot.command_target);
    device.destroy_fence(slot.frame_done);
    device.destroy_semaphore(slot.render_complete);
    device.destroy_semaphore(slot.image_acquired);
}

#[cfg(test)]
#[path = "frame_resources_tests.rs"]
mod tests;
