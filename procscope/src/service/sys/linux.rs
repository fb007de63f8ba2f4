use std::fs;
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use crate::error::ServiceError;
use crate::perm::MemoryPermission;
use crate::service::{ModuleList, ModuleRegion, ProcessList};

#[derive(Debug)]
pub struct ProcessInfoImpl;

pub fn process_info() -> Result<ProcessInfoImpl, ServiceError> {
    // Every lookup goes through procfs, so it must be mounted.
    if !Path::new("/proc/self").exists() {
        return Err(ServiceError::Unavailable);
    }
    Ok(ProcessInfoImpl)
}

#[allow(clippy::unused_self)]
impl ProcessInfoImpl {
    pub fn list_processes(&mut self, capacity: u32) -> Result<ProcessList, ServiceError> {
        let entries = fs::read_dir("/proc").map_err(ServiceError::CannotListProcesses)?;

        let mut ids = Vec::new();
        let mut total: u32 = 0;
        for entry in entries {
            let entry = entry.map_err(ServiceError::CannotListProcesses)?;
            // Numeric entries of /proc are the running processes.
            let Some(pid) = entry.file_name().to_str().and_then(|s| s.parse::<u64>().ok())
            else {
                continue;
            };
            total = total.saturating_add(1);
            if ids.len() < capacity as usize {
                ids.push(pid);
            }
        }
        log::debug!("listed {total} processes, stored {}", ids.len());
        Ok(ProcessList::new(ids, total))
    }

    pub fn title_id(&mut self, pid: u64) -> Result<u64, ServiceError> {
        // The executable image behind the process is the closest host concept
        // to a title id: identify it by filesystem device and inode.
        let meta = fs::metadata(format!("/proc/{pid}/exe"))
            .map_err(|err| open_error(err, ServiceError::CannotGetTitleId))?;
        Ok(meta.dev().rotate_left(32) ^ meta.ino())
    }
}

#[derive(Debug)]
pub struct ModuleInfoImpl;

pub fn module_info() -> Result<ModuleInfoImpl, ServiceError> {
    if !Path::new("/proc/self").exists() {
        return Err(ServiceError::Unavailable);
    }
    Ok(ModuleInfoImpl)
}

#[allow(clippy::unused_self)]
impl ModuleInfoImpl {
    pub fn module_infos(
        &mut self,
        pid: u64,
        capacity: u32,
    ) -> Result<ModuleList, ServiceError> {
        let maps = read_maps(pid, ServiceError::CannotListModules)?;
        Ok(modules_from_maps(&maps, capacity))
    }

    pub fn memory_permission(
        &mut self,
        pid: u64,
        address: u64,
    ) -> Result<MemoryPermission, ServiceError> {
        let maps = read_maps(pid, ServiceError::CannotQueryMemory)?;
        permission_at(&maps, address).ok_or(ServiceError::UnmappedAddress(address))
    }
}

fn read_maps(pid: u64, wrap: fn(io::Error) -> ServiceError) -> Result<String, ServiceError> {
    fs::read_to_string(format!("/proc/{pid}/maps")).map_err(|err| open_error(err, wrap))
}

fn open_error(err: io::Error, wrap: fn(io::Error) -> ServiceError) -> ServiceError {
    match err.kind() {
        io::ErrorKind::NotFound => ServiceError::UnknownProcess,
        _ => wrap(err),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Mapping {
    start: u64,
    end: u64,
    perms: MemoryPermission,
    path: Option<String>,
}

// Parse a line from the /proc/pid/maps file.
fn parse_map_line(line: &str) -> Option<Mapping> {
    // See man proc(5). Each line is:
    //
    // <start addr>-<end addr> <perms> <offset> <dev-major>:<dev-minor> <inode> <pathname>
    let mut splits = line.split_whitespace();

    let mut addrs = splits.next()?.split('-');
    let start = u64::from_str_radix(addrs.next()?, 16).ok()?;
    let end = u64::from_str_radix(addrs.next()?, 16).ok()?;

    let perms = splits.next()?.as_bytes();
    let perms = MemoryPermission::from_flags(
        perms.first() == Some(&b'r'),
        perms.get(1) == Some(&b'w'),
        perms.get(2) == Some(&b'x'),
    );

    // Skip offset, dev and inode. Only file-backed mappings name a module;
    // the tail is taken from the raw line so paths containing spaces stay
    // intact.
    let path = match splits.nth(2).and(splits.next()) {
        Some(token) if token.starts_with('/') => {
            line.find('/').map(|pos| line[pos..].to_owned())
        }
        _ => None,
    };

    Some(Mapping {
        start,
        end,
        perms,
        path,
    })
}

// Merge consecutive same-path file-backed mappings into one module record.
fn modules_from_maps(maps: &str, capacity: u32) -> ModuleList {
    let mut modules = Vec::new();
    let mut total: u32 = 0;
    let mut current: Option<(String, u64, u64)> = None;

    for line in maps.lines() {
        let Some(mapping) = parse_map_line(line) else {
            continue;
        };

        let continues_current = match (&mut current, &mapping.path) {
            (Some((path, _, end)), Some(new_path)) if *path == *new_path => {
                *end = mapping.end;
                true
            }
            _ => false,
        };
        if continues_current {
            continue;
        }

        if let Some((_, base, end)) = current.take() {
            push_module(&mut modules, &mut total, capacity, base, end);
        }
        if let Some(path) = mapping.path {
            current = Some((path, mapping.start, mapping.end));
        }
    }
    if let Some((_, base, end)) = current.take() {
        push_module(&mut modules, &mut total, capacity, base, end);
    }

    ModuleList::new(modules, total)
}

fn push_module(modules: &mut Vec<ModuleRegion>, total: &mut u32, capacity: u32, base: u64, end: u64) {
    *total = total.saturating_add(1);
    if modules.len() < capacity as usize {
        modules.push(ModuleRegion {
            base,
            size: end.saturating_sub(base),
        });
    }
}

fn permission_at(maps: &str, address: u64) -> Option<MemoryPermission> {
    maps.lines()
        .filter_map(parse_map_line)
        .find(|mapping| mapping.start <= address && address < mapping.end)
        .map(|mapping| mapping.perms)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAPS: &str = "\
555a1c0e2000-555a1c0e6000 r--p 00000000 08:01 9437305                    /usr/bin/cat
555a1c0e6000-555a1c0ea000 r-xp 00004000 08:01 9437305                    /usr/bin/cat
555a1c0ea000-555a1c0ec000 r--p 00008000 08:01 9437305                    /usr/bin/cat
555a1c2f0000-555a1c311000 rw-p 00000000 00:00 0                          [heap]
7f70c92f4000-7f70c931c000 r--p 00000000 08:01 9441094                    /usr/lib/libc.so.6
7f70c931c000-7f70c9489000 r-xp 00028000 08:01 9441094                    /usr/lib/libc.so.6
7fffd84b8000-7fffd84d9000 rw-p 00000000 00:00 0                          [stack]
";

    #[test]
    fn test_parse_map_line() {
        let mapping =
            parse_map_line("7f70c931c000-7f70c9489000 r-xp 00028000 08:01 9441094  /usr/lib/libc.so.6")
                .unwrap();
        assert_eq!(mapping.start, 0x7f70_c931_c000);
        assert_eq!(mapping.end, 0x7f70_c948_9000);
        assert_eq!(mapping.perms, MemoryPermission::from_flags(true, false, true));
        assert_eq!(mapping.path.as_deref(), Some("/usr/lib/libc.so.6"));

        let mapping =
            parse_map_line("555a1c2f0000-555a1c311000 rw-p 00000000 00:00 0   [heap]").unwrap();
        assert_eq!(mapping.path, None);
        assert_eq!(mapping.perms, MemoryPermission::from_flags(true, true, false));

        assert_eq!(parse_map_line(""), None);
        assert_eq!(parse_map_line("not a maps line"), None);
    }

    #[test]
    fn test_parse_map_line_path_with_spaces() {
        let mapping = parse_map_line(
            "7f0000000000-7f0000001000 r--p 00000000 08:01 42  /tmp/with space/lib.so (deleted)",
        )
        .unwrap();
        assert_eq!(
            mapping.path.as_deref(),
            Some("/tmp/with space/lib.so (deleted)")
        );
    }

    #[test]
    fn test_modules_merge_consecutive_mappings() {
        let modules = modules_from_maps(MAPS, 16);
        assert_eq!(modules.total(), 2);
        assert!(!modules.is_truncated());

        let stored = modules.modules();
        assert_eq!(stored[0].base, 0x555a_1c0e_2000);
        assert_eq!(stored[0].size, 0xa000);
        assert_eq!(stored[1].base, 0x7f70_c92f_4000);
        assert_eq!(stored[1].size, 0x7f70_c948_9000 - 0x7f70_c92f_4000);
    }

    #[test]
    fn test_modules_truncation() {
        let modules = modules_from_maps(MAPS, 1);
        assert_eq!(modules.total(), 2);
        assert_eq!(modules.modules().len(), 1);
        assert!(modules.is_truncated());
    }

    #[test]
    fn test_permission_at() {
        let perm = permission_at(MAPS, 0x7f70_c931_c500).unwrap();
        assert!(perm.read());
        assert!(!perm.write());
        assert!(perm.execute());

        assert_eq!(permission_at(MAPS, 0x10), None);
    }

    #[test]
    fn test_list_own_process() {
        let mut info = process_info().unwrap();
        let list = info.list_processes(u32::MAX).unwrap();
        let own = u64::from(std::process::id());
        assert!(list.iter().any(|&pid| pid == own));
    }

    #[test]
    fn test_own_title_and_modules() {
        let own = u64::from(std::process::id());

        let mut process_info = process_info().unwrap();
        let title = process_info.title_id(own).unwrap();
        assert_ne!(title, 0);

        let mut module_info = module_info().unwrap();
        let modules = module_info.module_infos(own, 16).unwrap();
        assert!(modules.total() >= 1);

        // The first module is the test binary itself, whose first page is
        // readable.
        let first = modules.modules()[0];
        let perm = module_info.memory_permission(own, first.base).unwrap();
        assert!(perm.read());
    }

    #[test]
    fn test_unknown_process() {
        let mut process_info = process_info().unwrap();
        assert!(matches!(
            process_info.title_id(u64::MAX),
            Err(ServiceError::UnknownProcess)
        ));

        let mut module_info = module_info().unwrap();
        assert!(matches!(
            module_info.module_infos(u64::MAX, 16),
            Err(ServiceError::UnknownProcess)
        ));
    }
}
