//! Frame rendering for the interactive report.
//!
//! [`refresh`] implements the whole per-frame detail block: the title line for
//! the selected slot, the optional module dump, and the permission bits of
//! each module's base page. Platform failures are reported inline and never
//! bubble up; only failures of the output surface do. The dirty flag is
//! cleared on every path, including the early-abort ones, so the loop always
//! returns to idle after one refresh.

use std::io::{self, Write};

use crate::service::{ModuleInfo, ProcessInfo, ProcessList};
use crate::state::LoopState;

/// Render one refresh of the report for the current selection.
///
/// Does nothing if the state is not dirty. On any platform failure the
/// remaining detail work of this frame is skipped; the failure is printed
/// inline with the failing operation and its numeric code.
pub fn refresh<P, M, W>(
    processes: &ProcessList,
    state: &mut LoopState,
    process_info: &mut P,
    module_info: &mut M,
    module_capacity: u32,
    out: &mut W,
) -> io::Result<()>
where
    P: ProcessInfo + ?Sized,
    M: ModuleInfo + ?Sized,
    W: Write + ?Sized,
{
    if !state.dirty {
        return Ok(());
    }
    state.dirty = false;

    let slot = state.selection;
    let Some(pid) = processes.get(slot) else {
        writeln!(out, "No process in slot #{slot}.")?;
        return Ok(());
    };

    let title_id = match process_info.title_id(pid) {
        Ok(title_id) => title_id,
        Err(err) => {
            writeln!(
                out,
                "Failed to get the title id of process {pid}: {err} (code {})",
                err.code()
            )?;
            return Ok(());
        }
    };
    writeln!(out, "Process ID [#{slot}]: {pid} (Title ID: {title_id:x})")?;

    if !state.show_modules {
        return Ok(());
    }

    let modules = match module_info.module_infos(pid, module_capacity) {
        Ok(modules) => modules,
        Err(err) => {
            writeln!(
                out,
                "Failed to list the modules of process {pid}: {err} (code {})",
                err.code()
            )?;
            return Ok(());
        }
    };

    if modules.modules().is_empty() {
        writeln!(out, "Process {pid} has no modules.")?;
        return Ok(());
    }
    if modules.is_truncated() {
        writeln!(
            out,
            "Module count {} exceeds the capacity of {module_capacity}, extra modules are not shown.",
            modules.total()
        )?;
    }
    writeln!(out, "Number of modules: {}", modules.total())?;
    writeln!(out)?;

    for (number, module) in modules.modules().iter().enumerate() {
        writeln!(out, "Module Number: {number}")?;
        writeln!(out, "Base Address: {:#x}", module.base)?;
        writeln!(out, "Module Size: {:#x}", module.size)?;
        writeln!(out)?;

        let perm = match module_info.memory_permission(pid, module.base) {
            Ok(perm) => perm,
            Err(err) => {
                // Modules after the failing one are not printed.
                writeln!(
                    out,
                    "Failed to query memory at {:#x}: {err} (code {})",
                    module.base,
                    err.code()
                )?;
                return Ok(());
            }
        };
        writeln!(out, "Permissions:")?;
        writeln!(out, "Full Value: {}", perm.raw())?;
        writeln!(out, "R: {}", u8::from(perm.read()))?;
        writeln!(out, "W: {}", u8::from(perm.write()))?;
        writeln!(out, "X: {}", u8::from(perm.execute()))?;
        writeln!(out)?;
    }

    Ok(())
}

/// Print the process table, one line per stored slot.
pub fn print_process_list<W: Write + ?Sized>(
    processes: &ProcessList,
    out: &mut W,
) -> io::Result<()> {
    for (slot, pid) in processes.iter().enumerate() {
        writeln!(out, "#{slot}: pid {pid}")?;
    }
    if processes.is_truncated() {
        writeln!(
            out,
            "Process count {} exceeds the capacity of {}, extra processes are not shown.",
            processes.total(),
            processes.stored()
        )?;
    }
    Ok(())
}
