//! In-place load command rewrite that retags an arm64 image as Mac Catalyst.
//!
//! The arm64 slice (or the whole file for thin images) loses its encryption
//! info and iOS minimum-version commands, and its build-version command is
//! replaced with one naming the Mac Catalyst platform. A missing build-version
//! command is appended when the header padding has room for it.

use crate::sideload::error::{ErrorExt, Result};
use goblin::mach::{
    MachO, MultiArch,
    constants::cputype::CPU_TYPE_ARM64,
    fat::FAT_MAGIC,
    header::SIZEOF_HEADER_64,
    load_command::{CommandVariant, LC_BUILD_VERSION},
};
use std::{ops::Range, path::Path};

const PLATFORM_MACCATALYST: u32 = 6;
const MINOS_10_0: u32 = 0x000A_0000;
const SDK_14_5: u32 = 0x000E_0500;
const TOOL_LD: u32 = 3;
const TOOL_LD_VERSION: u32 = 0x0261_0700;

/// `LC_BUILD_VERSION` with one tool entry.
const BUILD_VERSION_SIZE: u32 = 0x20;

const NCMDS_OFFSET: usize = 16;
const SIZEOFCMDS_OFFSET: usize = 20;

/// What the rewrite does with an existing load command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    Keep,
    Drop,
    Replace,
}

/// Load command layout of an arm64 slice.
struct Layout {
    big_endian: bool,
    commands: Vec<(Disposition, Range<usize>)>,
    /// End of the existing load command area.
    commands_end: usize,
    /// Lowest file offset holding segment or section data.
    data_offset: usize,
}

/// Rewrites the image at `path` in place.
///
/// Returns `Ok(false)` and leaves the file untouched when there is no 64-bit
/// arm64 slice, the image does not parse, or the header padding is too small
/// for an appended build-version command.
pub fn masquerade_as_catalyst(path: &Path) -> Result<bool> {
    let mut bytes = std::fs::read(path).fs_context("reading image", path)?;

    let Some(range) = arm64_slice(&bytes)? else {
        log::debug!("{} has no arm64 slice", path.display());
        return Ok(false);
    };

    if !rewrite_slice(&mut bytes[range]) {
        return Ok(false);
    }

    std::fs::write(path, &bytes).fs_context("writing image", path)?;
    Ok(true)
}

/// Byte range of the slice to rewrite. Thin images are rewritten whole.
fn arm64_slice(bytes: &[u8]) -> Result<Option<Range<usize>>> {
    let Some(magic) = bytes.get(0..4) else {
        return Ok(None);
    };

    if u32::from_be_bytes([magic[0], magic[1], magic[2], magic[3]]) != FAT_MAGIC {
        return Ok(Some(0..bytes.len()));
    }

    let multi = MultiArch::new(bytes)?;
    for arch in multi.iter_arches() {
        let arch = arch?;
        if arch.cputype == CPU_TYPE_ARM64 {
            let start = arch.offset as usize;
            let end = start.saturating_add(arch.size as usize);
            if end > bytes.len() {
                return Ok(None);
            }
            return Ok(Some(start..end));
        }
    }
    Ok(None)
}

fn layout(slice: &[u8]) -> Option<Layout> {
    let macho = match MachO::parse(slice, 0) {
        Ok(macho) => macho,
        Err(e) => {
            log::debug!("Skipping image that does not parse as Mach-O: {e}");
            return None;
        }
    };
    if !macho.is_64 || macho.header.cputype != CPU_TYPE_ARM64 {
        return None;
    }

    let mut commands = Vec::with_capacity(macho.load_commands.len());
    let mut commands_end = SIZEOF_HEADER_64;
    for lc in &macho.load_commands {
        let range = lc.offset..lc.offset.saturating_add(lc.command.cmdsize());
        commands_end = commands_end.max(range.end);

        let disposition = match &lc.command {
            CommandVariant::EncryptionInfo32(_)
            | CommandVariant::EncryptionInfo64(_)
            | CommandVariant::VersionMinIphoneos(_) => Disposition::Drop,
            CommandVariant::BuildVersion(_) => Disposition::Replace,
            _ => Disposition::Keep,
        };
        commands.push((disposition, range));
    }
    if commands_end > slice.len() {
        return None;
    }

    let mut data_offset = slice.len() as u64;
    for segment in macho.segments.iter() {
        if segment.fileoff > 0 && segment.filesize > 0 {
            data_offset = data_offset.min(segment.fileoff);
        }
        let Ok(sections) = segment.sections() else {
            continue;
        };
        for (section, _) in sections {
            if section.offset > 0 && section.size > 0 {
                data_offset = data_offset.min(u64::from(section.offset));
            }
        }
    }

    Some(Layout {
        big_endian: !macho.little_endian,
        commands,
        commands_end,
        data_offset: data_offset as usize,
    })
}

fn write_u32(data: &mut [u8], offset: usize, value: u32, big_endian: bool) {
    let bytes = if big_endian {
        value.to_be_bytes()
    } else {
        value.to_le_bytes()
    };
    data[offset..offset + 4].copy_from_slice(&bytes);
}

fn build_version_command(big_endian: bool) -> Vec<u8> {
    let words = [
        LC_BUILD_VERSION,
        BUILD_VERSION_SIZE,
        PLATFORM_MACCATALYST,
        MINOS_10_0,
        SDK_14_5,
        1,
        TOOL_LD,
        TOOL_LD_VERSION,
    ];
    let mut command = vec![0u8; BUILD_VERSION_SIZE as usize];
    for (index, word) in words.into_iter().enumerate() {
        write_u32(&mut command, index * 4, word, big_endian);
    }
    command
}

fn rewrite_slice(slice: &mut [u8]) -> bool {
    let Some(layout) = layout(slice) else {
        return false;
    };

    let replacement = build_version_command(layout.big_endian);
    let area = layout.commands_end - SIZEOF_HEADER_64;
    let mut rebuilt = Vec::with_capacity(area + replacement.len());
    let mut kept = 0u32;
    let mut replaced = false;

    for (disposition, range) in &layout.commands {
        match disposition {
            Disposition::Drop => {
                log::debug!("Removing load command at offset 0x{:x}", range.start);
            }
            Disposition::Replace if !replaced => {
                log::debug!("Replacing build version command at offset 0x{:x}", range.start);
                rebuilt.extend_from_slice(&replacement);
                replaced = true;
                kept += 1;
            }
            Disposition::Replace => {
                log::debug!("Removing duplicate build version command at offset 0x{:x}", range.start);
            }
            Disposition::Keep => {
                rebuilt.extend_from_slice(&slice[range.clone()]);
                kept += 1;
            }
        }
    }

    if !replaced {
        rebuilt.extend_from_slice(&replacement);
        kept += 1;
    }

    let new_end = SIZEOF_HEADER_64 + rebuilt.len();
    if new_end > layout.data_offset {
        log::warn!(
            "Not enough header padding for build version command ({} bytes needed, {} available)",
            rebuilt.len(),
            layout.data_offset.saturating_sub(SIZEOF_HEADER_64)
        );
        return false;
    }

    slice[SIZEOF_HEADER_64..new_end].copy_from_slice(&rebuilt);
    if layout.commands_end > new_end {
        slice[new_end..layout.commands_end].fill(0);
    }

    write_u32(slice, NCMDS_OFFSET, kept, layout.big_endian);
    write_u32(slice, SIZEOFCMDS_OFFSET, rebuilt.len() as u32, layout.big_endian);
    true
}
