/// Image ownership - which frame fence last submitted work for each swapchain image
///
/// The number of swapchain images is chosen by the driver and rarely equals the
/// number of frames in flight, so an acquired image may still be in use by a
/// different slot. Before recording, the scheduler waits on the owner fence.

use crate::graphics_device::FenceId;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageOwnership {
    owners: Vec<Option<FenceId>>,
}

impl ImageOwnership {
    pub fn new(image_count: usize) -> Self {
        Self {
            owners: vec![None; image_count],
        }
    }

    /// Forget every owner and resize to a new image count
    pub fn reset(&mut self, image_count: usize) {
        self.owners.clear();
        self.owners.resize(image_count, None);
    }

    pub fn owner(&self, image_index: u32) -> Option<FenceId> {
        self.owners.get(image_index as usize).copied().flatten()
    }

    /// Fence to wait on before slot `own_fence` may record into `image_index`
    ///
    /// `None` when the image is unowned or already owned by the same slot,
    /// whose fence the scheduler has just waited on.
    pub fn fence_to_wait(&self, image_index: u32, own_fence: FenceId) -> Option<FenceId> {
        self.owner(image_index).filter(|owner| *owner != own_fence)
    }

    /// Record `fence` as the single owner of `image_index`. Returns the previous owner.
    pub fn claim(&mut self, image_index: u32, fence: FenceId) -> Option<FenceId> {
        let index = image_index as usize;
        if index >= self.owners.len() {
            self.owners.resize(index + 1, None);
        }
        self.owners[index].replace(fence)
    }

    /// Forget every image owned by `fence`. Returns how many were released.
    pub fn release(&mut self, fence: FenceId) -> usize {
        let mut released = 0;
        for owner in self.owners.iter_mut().filter(|owner| **owner == Some(fence)) {
            *owner = None;
            released += 1;
        }
        released
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    pub fn owned_count(&self) -> usize {
        self.owners.iter().filter(|owner| owner.is_some()).count()
    }
}

#[cfg(test)]
#[path = "image_ownership_tests.rs"]
mod tests;
