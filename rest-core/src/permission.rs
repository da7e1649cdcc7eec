//! Permission bitmask and the fixed, process-wide name registry.
//!
//! Each bit is one named capability; a permission set is the bitwise union of
//! granted bits. The registry is a `static` table, so it is initialized before
//! any request runs and is only ever read.

use bitflags::bitflags;

bitflags! {
    /// Capabilities an identity may hold.
    ///
    /// Bit values are stored as-is in the database and must never be
    /// renumbered.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Permission: u64 {
        /// Identity may authenticate at all.
        const ENABLED          = 1 << 0;
        const READ_CONTENT     = 1 << 1;
        const WRITE_CONTENT    = 1 << 2;
        const READ_MEDIA       = 1 << 3;
        const WRITE_MEDIA      = 1 << 4;
        const READ_USER        = 1 << 5;
        const WRITE_USER       = 1 << 6;
        /// Required to change another identity's permission set.
        const EDIT_PERMISSIONS = 1 << 7;
    }
}

/// Registered permissions in their serialization order.
pub static REGISTRY: [(Permission, &str); 8] = [
    (Permission::ENABLED, "enabled"),
    (Permission::READ_CONTENT, "read_content"),
    (Permission::WRITE_CONTENT, "write_content"),
    (Permission::READ_MEDIA, "read_media"),
    (Permission::WRITE_MEDIA, "write_media"),
    (Permission::READ_USER, "read_user"),
    (Permission::WRITE_USER, "write_user"),
    (Permission::EDIT_PERMISSIONS, "edit_permissions"),
];

impl Permission {
    /// True iff any bit of `bit` is present in the set.
    pub fn has(self, bit: Permission) -> bool {
        self.intersects(bit)
    }

    #[must_use]
    pub fn grant(self, bit: Permission) -> Self {
        self | bit
    }

    /// Looks up a registered lowercase name. Unknown names resolve to the
    /// empty set so that granting them is a no-op. Not to be confused with
    /// the generated `from_name`, which matches constant names.
    pub fn named(name: &str) -> Self {
        REGISTRY
            .iter()
            .find(|(_, registered)| *registered == name)
            .map(|(bit, _)| *bit)
            .unwrap_or_else(Permission::empty)
    }

    #[must_use]
    pub fn grant_named<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .fold(self, |set, name| set.grant(Permission::named(name.as_ref())))
    }

    /// Names of every granted bit, in registry order.
    pub fn names(self) -> Vec<&'static str> {
        REGISTRY
            .iter()
            .filter(|(bit, _)| self.has(*bit))
            .map(|(_, name)| *name)
            .collect()
    }

    /// Name of the first registered bit in the set, used in error messages.
    pub fn name(self) -> &'static str {
        self.names().into_iter().next().unwrap_or("unknown")
    }

    pub fn from_storage(value: i64) -> Self {
        Permission::from_bits_retain(value as u64)
    }

    pub fn to_storage(self) -> i64 {
        self.bits() as i64
    }
}
