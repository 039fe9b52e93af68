//! Unit tests for image_ownership.rs

use slotmap::SlotMap;

use crate::frame::image_ownership::ImageOwnership;
use crate::graphics_device::FenceId;

fn fences(count: usize) -> Vec<FenceId> {
    let mut arena: SlotMap<FenceId, ()> = SlotMap::with_key();
    (0..count).map(|_| arena.insert(())).collect()
}

#[test]
fn test_new_images_are_unowned() {
    let ownership = ImageOwnership::new(3);
    assert_eq!(ownership.len(), 3);
    assert_eq!(ownership.owned_count(), 0);
    assert_eq!(ownership.owner(0), None);
    assert_eq!(ownership.owner(10), None);
}

#[test]
fn test_claim_replaces_single_owner() {
    let f = fences(2);
    let mut ownership = ImageOwnership::new(3);

    assert_eq!(ownership.claim(1, f[0]), None);
    assert_eq!(ownership.claim(1, f[1]), Some(f[0]));
    assert_eq!(ownership.owner(1), Some(f[1]));
    assert_eq!(ownership.owned_count(), 1);
}

#[test]
fn test_fence_to_wait_skips_own_fence() {
    let f = fences(2);
    let mut ownership = ImageOwnership::new(3);
    ownership.claim(0, f[0]);

    assert_eq!(ownership.fence_to_wait(0, f[0]), None);
    assert_eq!(ownership.fence_to_wait(0, f[1]), Some(f[0]));
    assert_eq!(ownership.fence_to_wait(2, f[1]), None);
}

#[test]
fn test_reset_clears_and_resizes() {
    let f = fences(1);
    let mut ownership = ImageOwnership::new(3);
    ownership.claim(2, f[0]);

    ownership.reset(4);
    assert_eq!(ownership.len(), 4);
    assert_eq!(ownership.owned_count(), 0);
}

#[test]
fn test_claim_beyond_len_grows() {
    let f = fences(1);
    let mut ownership = ImageOwnership::default();
    assert!(ownership.is_empty());

    ownership.claim(2, f[0]);
    assert_eq!(ownership.len(), 3);
    assert_eq!(ownership.owner(2), Some(f[0]));
}

#[test]
fn test_release_forgets_only_that_fence() {
    let f = fences(2);
    let mut ownership = ImageOwnership::new(3);
    ownership.claim(0, f[0]);
    ownership.claim(1, f[1]);
    ownership.claim(2, f[0]);

    assert_eq!(ownership.release(f[0]), 2);
    assert_eq!(ownership.owner(0), None);
    assert_eq!(ownership.owner(1), Some(f[1]));
    assert_eq!(ownership.owner(2), None);
    assert_eq!(ownership.release(f[0]), 0);
}
