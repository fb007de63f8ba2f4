#![allow(unsafe_code)]

use std::ffi::c_void;
use std::io;
use std::mem::{size_of, MaybeUninit};

use windows_sys::Win32::Foundation::{
    CloseHandle, ERROR_INVALID_PARAMETER, HANDLE, INVALID_HANDLE_VALUE,
};
use windows_sys::Win32::System::Diagnostics::ToolHelp::{
    CreateToolhelp32Snapshot, Module32FirstW, Module32NextW, Process32FirstW, Process32NextW,
    MODULEENTRY32W, PROCESSENTRY32W, TH32CS_SNAPMODULE, TH32CS_SNAPMODULE32, TH32CS_SNAPPROCESS,
};
use windows_sys::Win32::System::Memory::{
    VirtualQueryEx, MEMORY_BASIC_INFORMATION, MEM_COMMIT, PAGE_EXECUTE, PAGE_EXECUTE_READ,
    PAGE_EXECUTE_READWRITE, PAGE_EXECUTE_WRITECOPY, PAGE_READONLY, PAGE_READWRITE, PAGE_WRITECOPY,
};
use windows_sys::Win32::System::Threading::{OpenProcess, PROCESS_QUERY_INFORMATION};

use crate::error::ServiceError;
use crate::perm::MemoryPermission;
use crate::service::{ModuleList, ModuleRegion, ProcessList};

#[derive(Debug)]
pub struct ProcessInfoImpl;

pub fn process_info() -> Result<ProcessInfoImpl, ServiceError> {
    Ok(ProcessInfoImpl)
}

#[allow(clippy::unused_self)]
impl ProcessInfoImpl {
    pub fn list_processes(&mut self, capacity: u32) -> Result<ProcessList, ServiceError> {
        let snap = snapshot(TH32CS_SNAPPROCESS, 0, ServiceError::CannotListProcesses)?;

        // Safety: a zeroed PROCESSENTRY32W is a valid value, all fields are
        // plain integers or arrays.
        let mut entry: PROCESSENTRY32W = unsafe { std::mem::zeroed() };
        entry.dwSize = size_of::<PROCESSENTRY32W>() as u32;

        let mut ids = Vec::new();
        let mut total: u32 = 0;
        // Safety: the snapshot handle is valid and entry.dwSize is set.
        let mut ok = unsafe { Process32FirstW(snap.0, &mut entry) } != 0;
        while ok {
            total = total.saturating_add(1);
            if ids.len() < capacity as usize {
                ids.push(u64::from(entry.th32ProcessID));
            }
            // Safety: same as above.
            ok = unsafe { Process32NextW(snap.0, &mut entry) } != 0;
        }
        log::debug!("listed {total} processes, stored {}", ids.len());
        Ok(ProcessList::new(ids, total))
    }

    pub fn title_id(&mut self, pid: u64) -> Result<u64, ServiceError> {
        // No title-id concept exists on the host: hash the path of the
        // process's first module, which identifies the application image.
        let entry = first_module(pid, ServiceError::CannotGetTitleId)?;
        let path = wide_to_string(&entry.szExePath);
        Ok(fnv1a_64(path.as_bytes()))
    }
}

#[derive(Debug)]
pub struct ModuleInfoImpl;

pub fn module_info() -> Result<ModuleInfoImpl, ServiceError> {
    Ok(ModuleInfoImpl)
}

#[allow(clippy::unused_self)]
impl ModuleInfoImpl {
    pub fn module_infos(
        &mut self,
        pid: u64,
        capacity: u32,
    ) -> Result<ModuleList, ServiceError> {
        let snap = module_snapshot(pid, ServiceError::CannotListModules)?;

        // Safety: a zeroed MODULEENTRY32W is a valid value.
        let mut entry: MODULEENTRY32W = unsafe { std::mem::zeroed() };
        entry.dwSize = size_of::<MODULEENTRY32W>() as u32;

        let mut modules = Vec::new();
        let mut total: u32 = 0;
        // Safety: the snapshot handle is valid and entry.dwSize is set.
        let mut ok = unsafe { Module32FirstW(snap.0, &mut entry) } != 0;
        while ok {
            total = total.saturating_add(1);
            if modules.len() < capacity as usize {
                modules.push(ModuleRegion {
                    base: entry.modBaseAddr as usize as u64,
                    size: u64::from(entry.modBaseSize),
                });
            }
            // Safety: same as above.
            ok = unsafe { Module32NextW(snap.0, &mut entry) } != 0;
        }
        Ok(ModuleList::new(modules, total))
    }

    pub fn memory_permission(
        &mut self,
        pid: u64,
        address: u64,
    ) -> Result<MemoryPermission, ServiceError> {
        let pid = pid32(pid)?;
        // Safety: this is always safe to call.
        let raw = unsafe { OpenProcess(PROCESS_QUERY_INFORMATION, 0, pid) };
        if raw.is_null() {
            return Err(last_error_or_unknown(ServiceError::CannotQueryMemory));
        }
        let handle = Handle(raw);

        let mut info = MaybeUninit::<MEMORY_BASIC_INFORMATION>::uninit();
        // Safety: the handle has PROCESS_QUERY_INFORMATION access and the out
        // pointer covers a full MEMORY_BASIC_INFORMATION.
        let res = unsafe {
            VirtualQueryEx(
                handle.0,
                address as usize as *const c_void,
                info.as_mut_ptr(),
                size_of::<MEMORY_BASIC_INFORMATION>(),
            )
        };
        if res == 0 {
            return Err(last_error_or_unknown(ServiceError::CannotQueryMemory));
        }
        // Safety: the call succeeded, so the info object is filled.
        let info = unsafe { info.assume_init() };

        if info.State != MEM_COMMIT {
            return Err(ServiceError::UnmappedAddress(address));
        }
        Ok(protect_to_permission(info.Protect))
    }
}

// RAII over a raw handle, closed on drop.
#[derive(Debug)]
struct Handle(HANDLE);

impl Drop for Handle {
    fn drop(&mut self) {
        // Safety: the wrapped handle is valid and owned by this guard.
        let _ = unsafe { CloseHandle(self.0) };
    }
}

fn snapshot(
    flags: u32,
    pid: u32,
    wrap: fn(io::Error) -> ServiceError,
) -> Result<Handle, ServiceError> {
    // Safety: this is always safe to call.
    let raw = unsafe { CreateToolhelp32Snapshot(flags, pid) };
    if raw == INVALID_HANDLE_VALUE {
        return Err(last_error_or_unknown(wrap));
    }
    Ok(Handle(raw))
}

fn module_snapshot(pid: u64, wrap: fn(io::Error) -> ServiceError) -> Result<Handle, ServiceError> {
    let pid = pid32(pid)?;
    snapshot(TH32CS_SNAPMODULE | TH32CS_SNAPMODULE32, pid, wrap)
}

fn first_module(
    pid: u64,
    wrap: fn(io::Error) -> ServiceError,
) -> Result<MODULEENTRY32W, ServiceError> {
    let snap = module_snapshot(pid, wrap)?;

    // Safety: a zeroed MODULEENTRY32W is a valid value.
    let mut entry: MODULEENTRY32W = unsafe { std::mem::zeroed() };
    entry.dwSize = size_of::<MODULEENTRY32W>() as u32;
    // Safety: the snapshot handle is valid and entry.dwSize is set.
    let res = unsafe { Module32FirstW(snap.0, &mut entry) };
    if res == 0 {
        return Err(last_error_or_unknown(wrap));
    }
    Ok(entry)
}

// Process ids above u32 cannot exist on this host.
fn pid32(pid: u64) -> Result<u32, ServiceError> {
    u32::try_from(pid).map_err(|_| ServiceError::UnknownProcess)
}

#[allow(clippy::cast_possible_wrap)]
fn last_error_or_unknown(wrap: fn(io::Error) -> ServiceError) -> ServiceError {
    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(ERROR_INVALID_PARAMETER as _) {
        ServiceError::UnknownProcess
    } else {
        wrap(err)
    }
}

fn protect_to_permission(protect: u32) -> MemoryPermission {
    // Only the low byte carries the access class; guard and cache modifier
    // bits live above it.
    let (read, write, execute) = match protect & 0xff {
        PAGE_READONLY => (true, false, false),
        PAGE_READWRITE | PAGE_WRITECOPY => (true, true, false),
        PAGE_EXECUTE => (false, false, true),
        PAGE_EXECUTE_READ => (true, false, true),
        PAGE_EXECUTE_READWRITE | PAGE_EXECUTE_WRITECOPY => (true, true, true),
        _ => (false, false, false),
    };
    MemoryPermission::from_flags(read, write, execute)
}

fn wide_to_string(wide: &[u16]) -> String {
    let len = wide.iter().position(|&c| c == 0).unwrap_or(wide.len());
    String::from_utf16_lossy(&wide[..len])
}

fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x100_0000_01b3);
    }
    hash
}
