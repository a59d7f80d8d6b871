//! Minimal, bounded ELF section-table parser (spec §4.Y).
//!
//! Only what the module scanner needs: section names, flags, and sizes.
//! Endianness and 32/64-bit word size are taken from the ELF header itself;
//! everything else (program headers, symbol tables, relocations) is
//! intentionally unparsed. Malformed input is rejected, never panicked on.

const MAX_SECTIONS: usize = 512;
const MAX_STRTAB_BYTES: usize = 1024 * 1024;

pub const SHF_WRITE: u64 = 0x1;
pub const SHF_EXECINSTR: u64 = 0x4;

/// One parsed section header with its name resolved from `.shstrtab`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElfSection {
    pub name: String,
    pub flags: u64,
    pub size: u64,
}

#[derive(Clone, Copy)]
enum Class {
    Elf32,
    Elf64,
}

#[derive(Clone, Copy)]
enum Endian {
    Little,
    Big,
}

/// Parses the section table of an ELF object.
///
/// Returns `None` when the magic is wrong, the header is truncated, or the
/// section count/offset fail the sanity bounds (`shnum > 512` or
/// `shoff == 0`) — all per spec §4.Y.
pub fn parse_sections(data: &[u8]) -> Option<Vec<ElfSection>> {
    if data.len() < 20 || &data[0..4] != b"\x7fELF" {
        return None;
    }
    let class = match data[4] {
        1 => Class::Elf32,
        2 => Class::Elf64,
        _ => return None,
    };
    let endian = match data[5] {
        1 => Endian::Little,
        2 => Endian::Big,
        _ => return None,
    };

    let header_size = match class {
        Class::Elf32 => 52,
        Class::Elf64 => 64,
    };
    if data.len() < header_size {
        return None;
    }

    let (shoff, shentsize, shnum, shstrndx) = match class {
        Class::Elf32 => (
            read_u(&data[32..36], endian, 4),
            read_u(&data[46..48], endian, 2) as usize,
            read_u(&data[48..50], endian, 2) as usize,
            read_u(&data[50..52], endian, 2) as usize,
        ),
        Class::Elf64 => (
            read_u(&data[40..48], endian, 8),
            read_u(&data[58..60], endian, 2) as usize,
            read_u(&data[60..62], endian, 2) as usize,
            read_u(&data[62..64], endian, 2) as usize,
        ),
    };

    if shoff == 0 || shnum == 0 || shnum > MAX_SECTIONS {
        return None;
    }

    struct Raw {
        name_off: u32,
        flags: u64,
        size: u64,
    }

    let mut raw_sections = Vec::with_capacity(shnum);
    for i in 0..shnum {
        let start = shoff as usize + i * shentsize;
        let end = start.checked_add(shentsize)?;
        let hdr = data.get(start..end)?;
        let raw = match class {
            Class::Elf32 => Raw {
                name_off: read_u(&hdr[0..4], endian, 4) as u32,
                flags: read_u(&hdr[8..12], endian, 4),
                size: read_u(&hdr[16..20], endian, 4),
            },
            Class::Elf64 => Raw {
                name_off: read_u(&hdr[0..4], endian, 4) as u32,
                flags: read_u(&hdr[8..16], endian, 8),
                size: read_u(&hdr[32..40], endian, 8),
            },
        };
        raw_sections.push(raw);
    }

    // Second pass: resolve names via .shstrtab (bounded to 1 MiB).
    let strtab = raw_sections.get(shstrndx).and_then(|s| {
        let start = shoff as usize + shstrndx * shentsize;
        let end = start.checked_add(shentsize)?;
        let hdr = data.get(start..end)?;
        let (off, size) = match class {
            Class::Elf32 => (
                read_u(&hdr[16..20], endian, 4) as usize,
                read_u(&hdr[20..24], endian, 4) as usize,
            ),
            Class::Elf64 => (
                read_u(&hdr[24..32], endian, 8) as usize,
                read_u(&hdr[32..40], endian, 8) as usize,
            ),
        };
        let size = size.min(MAX_STRTAB_BYTES);
        data.get(off..off.checked_add(size)?)
    });

    let sections = raw_sections
        .into_iter()
        .map(|r| ElfSection {
            name: strtab
                .and_then(|tab| read_cstr(tab, r.name_off as usize))
                .unwrap_or_default(),
            flags: r.flags,
            size: r.size,
        })
        .collect();

    Some(sections)
}

fn read_u(bytes: &[u8], endian: Endian, width: usize) -> u64 {
    let mut buf = [0u8; 8];
    let slice = &bytes[..width.min(bytes.len())];
    match endian {
        Endian::Little => buf[..slice.len()].copy_from_slice(slice),
        Endian::Big => {
            let start = 8 - slice.len();
            buf[start..].copy_from_slice(slice);
            return u64::from_be_bytes(buf);
        }
    }
    u64::from_le_bytes(buf)
}

fn read_cstr(strtab: &[u8], offset: usize) -> Option<String> {
    let start = strtab.get(offset..)?;
    let end = start.iter().position(|&b| b == 0).unwrap_or(start.len());
    Some(String::from_utf8_lossy(&start[..end]).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_minimal_elf64(sections: &[(&str, u64, u64)]) -> Vec<u8> {
        // Builds a tiny, valid little-endian ELF64 with a real .shstrtab so
        // the parser's two-pass name resolution can be exercised.
        let mut strtab = vec![0u8]; // index 0 is always the empty string
        let mut name_offsets = Vec::new();
        for (name, _, _) in sections {
            name_offsets.push(strtab.len() as u32);
            strtab.extend_from_slice(name.as_bytes());
            strtab.push(0);
        }
        let shstrtab_name_off = strtab.len() as u32;
        strtab.extend_from_slice(b".shstrtab");
        strtab.push(0);

        let shnum = sections.len() + 1; // + .shstrtab itself
        let header_size = 64;
        let shentsize = 64;
        let strtab_off = header_size as u64;
        let shoff = strtab_off + strtab.len() as u64;

        let mut buf = vec![0u8; header_size];
        buf[0..4].copy_from_slice(b"\x7fELF");
        buf[4] = 2; // ELFCLASS64
        buf[5] = 1; // little endian
        buf[6] = 1; // EI_VERSION
        buf[40..48].copy_from_slice(&shoff.to_le_bytes());
        buf[58..60].copy_from_slice(&(shentsize as u16).to_le_bytes());
        buf[60..62].copy_from_slice(&(shnum as u16).to_le_bytes());
        buf[62..64].copy_from_slice(&(sections.len() as u16).to_le_bytes()); // shstrndx = last

        buf.extend_from_slice(&strtab);

        for (i, (_, flags, size)) in sections.iter().enumerate() {
            let mut sh = [0u8; 64];
            sh[0..4].copy_from_slice(&name_offsets[i].to_le_bytes());
            sh[8..16].copy_from_slice(&flags.to_le_bytes());
            sh[32..40].copy_from_slice(&size.to_le_bytes());
            buf.extend_from_slice(&sh);
        }
        // .shstrtab section header itself
        let mut sh = [0u8; 64];
        sh[0..4].copy_from_slice(&shstrtab_name_off.to_le_bytes());
        sh[24..32].copy_from_slice(&strtab_off.to_le_bytes());
        sh[32..40].copy_from_slice(&(strtab.len() as u64).to_le_bytes());
        buf.extend_from_slice(&sh);

        buf
    }

    #[test]
    fn rejects_bad_magic() {
        assert!(parse_sections(b"not an elf file at all").is_none());
    }

    #[test]
    fn parses_section_names_and_flags() {
        let data = build_minimal_elf64(&[(".text", SHF_EXECINSTR, 100), (".evil", SHF_WRITE | SHF_EXECINSTR, 8)]);
        let sections = parse_sections(&data).unwrap();
        let text = sections.iter().find(|s| s.name == ".text").unwrap();
        assert_eq!(text.flags & SHF_EXECINSTR, SHF_EXECINSTR);
        let evil = sections.iter().find(|s| s.name == ".evil").unwrap();
        assert_eq!(evil.flags & SHF_WRITE, SHF_WRITE);
        assert_eq!(evil.flags & SHF_EXECINSTR, SHF_EXECINSTR);
    }

    #[test]
    fn rejects_excessive_section_count() {
        let mut data = build_minimal_elf64(&[(".text", 0, 0)]);
        // Corrupt shnum to exceed the 512 cap.
        data[60..62].copy_from_slice(&1000u16.to_le_bytes());
        assert!(parse_sections(&data).is_none());
    }

    #[test]
    fn rejects_zero_shoff() {
        let mut data = build_minimal_elf64(&[(".text", 0, 0)]);
        data[40..48].copy_from_slice(&0u64.to_le_bytes());
        assert!(parse_sections(&data).is_none());
    }
}
