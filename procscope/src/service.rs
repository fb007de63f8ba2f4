//! Platform introspection sessions.
//!
//! Two traits split the four platform operations the way the original host
//! exposes them: process enumeration and title-id lookup on one service,
//! module enumeration and memory-permission lookup on the other. The concrete
//! sessions dispatch to a per-OS backend in the private `sys` module;
//! everything above the traits is platform independent and testable against
//! mocks.

use crate::error::ServiceError;
use crate::perm::MemoryPermission;

mod sys;

/// A loaded code image inside a process address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleRegion {
    /// Base address of the first page of the image.
    pub base: u64,
    /// Size of the image in bytes.
    pub size: u64,
}

/// Process ids stored up to a fixed capacity, with an explicit truncation
/// marker.
///
/// The platform may report more processes than the list can store; the total
/// is kept next to the stored ids so callers can warn instead of silently
/// dropping entries. Slots past the stored count are empty: indexing them
/// yields no process id.
#[derive(Debug, Clone, Default)]
pub struct ProcessList {
    ids: Vec<u64>,
    total: u32,
}

impl ProcessList {
    /// Build a list from the stored ids and the total the platform reported.
    #[must_use]
    pub fn new(ids: Vec<u64>, total: u32) -> Self {
        Self { ids, total }
    }

    /// Process id stored in the given slot, if the slot is filled.
    #[must_use]
    pub fn get(&self, slot: u32) -> Option<u64> {
        self.ids.get(slot as usize).copied()
    }

    /// Number of ids actually stored.
    #[must_use]
    pub fn stored(&self) -> u32 {
        u32::try_from(self.ids.len()).unwrap_or(u32::MAX)
    }

    /// Total number of processes the platform reported.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.total
    }

    /// Whether the platform reported more processes than were stored.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.total > self.stored()
    }

    /// Iterate over the stored ids in platform order.
    pub fn iter(&self) -> std::slice::Iter<'_, u64> {
        self.ids.iter()
    }
}

impl<'a> IntoIterator for &'a ProcessList {
    type Item = &'a u64;
    type IntoIter = std::slice::Iter<'a, u64>;

    fn into_iter(self) -> Self::IntoIter {
        self.ids.iter()
    }
}

/// Module records for one process, with the true total for truncation checks.
#[derive(Debug, Clone, Default)]
pub struct ModuleList {
    modules: Vec<ModuleRegion>,
    total: u32,
}

impl ModuleList {
    /// Build a list from the stored records and the platform's total count.
    #[must_use]
    pub fn new(modules: Vec<ModuleRegion>, total: u32) -> Self {
        Self { modules, total }
    }

    /// Stored records, in platform order.
    #[must_use]
    pub fn modules(&self) -> &[ModuleRegion] {
        &self.modules
    }

    /// Total number of modules the platform reported.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.total
    }

    /// Whether the platform reported more modules than were stored.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.total > u32::try_from(self.modules.len()).unwrap_or(u32::MAX)
    }
}

/// Process enumeration and title-id lookup.
pub trait ProcessInfo {
    /// List running processes, storing at most `capacity` ids.
    fn list_processes(&mut self, capacity: u32) -> Result<ProcessList, ServiceError>;

    /// Identifier of the application content behind the process.
    fn title_id(&mut self, pid: u64) -> Result<u64, ServiceError>;
}

/// Module enumeration and memory-permission lookup.
pub trait ModuleInfo {
    /// List the modules of a process, storing at most `capacity` records.
    fn module_infos(&mut self, pid: u64, capacity: u32) -> Result<ModuleList, ServiceError>;

    /// Permission bits of the page covering `address` in the process's
    /// address space.
    fn memory_permission(&mut self, pid: u64, address: u64)
        -> Result<MemoryPermission, ServiceError>;
}

// A failed initialization leaves the loop running degraded: an absent session
// fails every call with `Unavailable` so the frame semantics stay uniform.
impl<T: ProcessInfo> ProcessInfo for Option<T> {
    fn list_processes(&mut self, capacity: u32) -> Result<ProcessList, ServiceError> {
        match self {
            Some(session) => session.list_processes(capacity),
            None => Err(ServiceError::Unavailable),
        }
    }

    fn title_id(&mut self, pid: u64) -> Result<u64, ServiceError> {
        match self {
            Some(session) => session.title_id(pid),
            None => Err(ServiceError::Unavailable),
        }
    }
}

impl<T: ModuleInfo> ModuleInfo for Option<T> {
    fn module_infos(&mut self, pid: u64, capacity: u32) -> Result<ModuleList, ServiceError> {
        match self {
            Some(session) => session.module_infos(pid, capacity),
            None => Err(ServiceError::Unavailable),
        }
    }

    fn memory_permission(
        &mut self,
        pid: u64,
        address: u64,
    ) -> Result<MemoryPermission, ServiceError> {
        match self {
            Some(session) => session.memory_permission(pid, address),
            None => Err(ServiceError::Unavailable),
        }
    }
}

/// Session over the platform's process enumeration service.
///
/// Platform resources held by the session are released when it is dropped.
#[derive(Debug)]
pub struct ProcessInfoSession(sys::ProcessInfoImpl);

impl ProcessInfoSession {
    /// Open a session on the platform service.
    pub fn initialize() -> Result<Self, ServiceError> {
        sys::process_info().map(Self)
    }
}

impl ProcessInfo for ProcessInfoSession {
    fn list_processes(&mut self, capacity: u32) -> Result<ProcessList, ServiceError> {
        self.0.list_processes(capacity)
    }

    fn title_id(&mut self, pid: u64) -> Result<u64, ServiceError> {
        self.0.title_id(pid)
    }
}

/// Session over the platform's module and memory introspection service.
///
/// Platform resources held by the session are released when it is dropped.
#[derive(Debug)]
pub struct ModuleInfoSession(sys::ModuleInfoImpl);

impl ModuleInfoSession {
    /// Open a session on the platform service.
    pub fn initialize() -> Result<Self, ServiceError> {
        sys::module_info().map(Self)
    }
}

impl ModuleInfo for ModuleInfoSession {
    fn module_infos(&mut self, pid: u64, capacity: u32) -> Result<ModuleList, ServiceError> {
        self.0.module_infos(pid, capacity)
    }

    fn memory_permission(
        &mut self,
        pid: u64,
        address: u64,
    ) -> Result<MemoryPermission, ServiceError> {
        self.0.memory_permission(pid, address)
    }
}
