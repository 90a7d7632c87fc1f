use slotbook_core::{Allocatable, Reservation, User};

/// Read and modify rights consulted by the cache.
pub trait PermissionController {
    fn can_read(&self, allocatable: &Allocatable, user: &User) -> bool;
    fn can_modify(&self, reservation: &Reservation, user: &User) -> bool;
}

/// Admins may do anything, owners may modify their own reservations and
/// allocatables are readable by everyone unless a reader list is set.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultPermissions;

impl PermissionController for DefaultPermissions {
    fn can_read(&self, allocatable: &Allocatable, user: &User) -> bool {
        user.admin || allocatable.is_public() || allocatable.readers.contains(&user.id)
    }

    fn can_modify(&self, reservation: &Reservation, user: &User) -> bool {
        user.admin || reservation.owner() == Some(&user.id)
    }
}
