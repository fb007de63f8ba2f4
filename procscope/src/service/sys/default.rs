use crate::error::ServiceError;
use crate::perm::MemoryPermission;
use crate::service::{ModuleList, ProcessList};

#[derive(Debug)]
pub struct ProcessInfoImpl;

pub fn process_info() -> Result<ProcessInfoImpl, ServiceError> {
    Err(ServiceError::Unsupported)
}

#[allow(clippy::unused_self)]
impl ProcessInfoImpl {
    pub fn list_processes(&mut self, _capacity: u32) -> Result<ProcessList, ServiceError> {
        Err(ServiceError::Unsupported)
    }

    pub fn title_id(&mut self, _pid: u64) -> Result<u64, ServiceError> {
        Err(ServiceError::Unsupported)
    }
}

#[derive(Debug)]
pub struct ModuleInfoImpl;

pub fn module_info() -> Result<ModuleInfoImpl, ServiceError> {
    Err(ServiceError::Unsupported)
}

#[allow(clippy::unused_self)]
impl ModuleInfoImpl {
    pub fn module_infos(
        &mut self,
        _pid: u64,
        _capacity: u32,
    ) -> Result<ModuleList, ServiceError> {
        Err(ServiceError::Unsupported)
    }

    pub fn memory_permission(
        &mut self,
        _pid: u64,
        _address: u64,
    ) -> Result<MemoryPermission, ServiceError> {
        Err(ServiceError::Unsupported)
    }
}
