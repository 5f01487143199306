//! ELF image loading
//!
//! Turns a mapped file into an [`Image`]: its sections, and for each
//! section the function symbols defined in it, relocated to runtime
//! addresses.

use crate::engine::{Image, Routine, Section, SectionKind};
use crate::filter;
use crate::ptrace::maps::MapEntry;
use anyhow::{Context, Result};
use object::{Object, ObjectKind, ObjectSection, ObjectSegment, ObjectSymbol, SymbolKind};
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::path::Path;

const PAGE_SIZE: u64 = 0x1000;

fn page_down(value: u64) -> u64 {
    value & !(PAGE_SIZE - 1)
}

/// Map an object section kind onto the engine's classification
pub fn classify(kind: object::SectionKind) -> SectionKind {
    use object::SectionKind as K;
    match kind {
        K::Text => SectionKind::Exec,
        K::Data
        | K::ReadOnlyData
        | K::ReadOnlyString
        | K::UninitializedData
        | K::Common
        | K::Tls
        | K::UninitializedTls => SectionKind::Data,
        _ => SectionKind::Other,
    }
}

/// Load bias of an image given one of its executable mappings
///
/// The mapping's file offset identifies the PT_LOAD segment it came from;
/// the bias is the distance between that segment's link-time page and
/// where it was mapped.
pub fn load_bias<'data>(object: &object::File<'data>, mapping: &MapEntry) -> u64 {
    if object.kind() == ObjectKind::Executable {
        return 0;
    }

    for segment in object.segments() {
        let (file_offset, _) = segment.file_range();
        if page_down(file_offset) == mapping.offset {
            return mapping.start.wrapping_sub(page_down(segment.address()));
        }
    }

    // Fall back to the common layout where vaddr == file offset
    mapping.start.wrapping_sub(mapping.offset)
}

/// A defined function symbol, before aliases are merged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSymbol {
    pub section: object::SectionIndex,
    /// Link-time address
    pub address: u64,
    pub name: String,
    pub size: u64,
    pub global: bool,
    pub weak: bool,
}

/// Ordering among aliases of one entry point, best last
///
/// A name the relevance filter accepts beats one it rejects, so `free`
/// is chosen over `__libc_free`. Then strong globals, then the shortest
/// name; remaining ties keep the first symbol seen.
fn alias_rank(symbol: &FunctionSymbol) -> (bool, bool, bool, Reverse<usize>) {
    (
        filter::is_relevant(&symbol.name),
        symbol.global,
        !symbol.weak,
        Reverse(symbol.name.len()),
    )
}

/// Group function symbols by section, keeping one name per entry address
pub fn merge_aliases(
    symbols: impl IntoIterator<Item = FunctionSymbol>,
) -> HashMap<object::SectionIndex, BTreeMap<u64, FunctionSymbol>> {
    let mut by_section: HashMap<object::SectionIndex, BTreeMap<u64, FunctionSymbol>> =
        HashMap::new();
    for symbol in symbols {
        let by_address = by_section.entry(symbol.section).or_default();
        match by_address.get_mut(&symbol.address) {
            Some(chosen) if alias_rank(&symbol) > alias_rank(chosen) => *chosen = symbol,
            Some(_) => {}
            None => {
                by_address.insert(symbol.address, symbol);
            }
        }
    }
    by_section
}

/// Defined text symbols of `object`
fn function_symbols<'data>(object: &object::File<'data>) -> Vec<FunctionSymbol> {
    let has_symtab = object
        .symbols()
        .any(|symbol| symbol.kind() == SymbolKind::Text);
    let symbols = if has_symtab {
        object.symbols()
    } else {
        // Stripped: exported functions are all we have
        object.dynamic_symbols()
    };

    symbols
        .filter(|symbol| symbol.kind() == SymbolKind::Text && symbol.is_definition())
        .filter_map(|symbol| {
            Some(FunctionSymbol {
                section: symbol.section_index()?,
                address: symbol.address(),
                name: symbol.name().ok()?.to_string(),
                size: symbol.size(),
                global: symbol.is_global(),
                weak: symbol.is_weak(),
            })
        })
        .collect()
}

/// Build an image from parsed ELF data
pub fn image_from_object<'data>(
    name: &str,
    object: &object::File<'data>,
    mapping: &MapEntry,
) -> Image {
    let bias = load_bias(object, mapping);
    let mut symbols = merge_aliases(function_symbols(object));

    let sections = object
        .sections()
        .map(|section| {
            let section_name = section.name().unwrap_or("");
            let routines = symbols
                .remove(&section.index())
                .unwrap_or_default()
                .into_iter()
                .map(|(address, symbol)| {
                    Routine::new(symbol.name, address.wrapping_add(bias), symbol.size)
                })
                .collect();
            Section::new(section_name, classify(section.kind()), routines)
        })
        .collect();

    Image::new(name, bias, sections)
}

/// Open, map and parse the ELF file behind an executable mapping
pub fn load_image(path: &Path, mapping: &MapEntry) -> Result<Image> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open image: {}", path.display()))?;

    let mmap = unsafe { memmap2::Mmap::map(&file) }
        .with_context(|| format!("Failed to memory-map image: {}", path.display()))?;

    let object = object::File::parse(&*mmap)
        .with_context(|| format!("Failed to parse ELF image: {}", path.display()))?;

    Ok(image_from_object(
        &path.to_string_lossy(),
        &object,
        mapping,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ptrace::maps;

    #[test]
    fn test_page_down() {
        assert_eq!(page_down(0x1234), 0x1000);
        assert_eq!(page_down(0x1000), 0x1000);
        assert_eq!(page_down(0xfff), 0);
    }

    #[test]
    fn test_classify_sections() {
        assert_eq!(classify(object::SectionKind::Text), SectionKind::Exec);
        assert_eq!(classify(object::SectionKind::Data), SectionKind::Data);
        assert_eq!(
            classify(object::SectionKind::UninitializedData),
            SectionKind::Data
        );
        assert_eq!(classify(object::SectionKind::Debug), SectionKind::Other);
        assert_eq!(classify(object::SectionKind::Note), SectionKind::Other);
    }

    #[test]
    fn test_load_own_executable() {
        // The test harness binary is itself a mapped ELF image
        let me = nix::unistd::getpid();
        let exe = std::fs::read_link(format!("/proc/{}/exe", me)).unwrap();
        let maps = maps::read_maps(me).unwrap();
        let exe_str = exe.to_string_lossy();
        let mapping = maps
            .iter()
            .find(|m| m.is_executable() && m.path.as_deref() == Some(exe.as_path()))
            .expect("test binary has an executable mapping");

        let image = load_image(&exe, mapping).unwrap();
        assert_eq!(image.name(), exe_str);

        let text = image
            .sections()
            .iter()
            .find(|s| s.name() == ".text")
            .expect("test binary has .text");
        assert_eq!(text.kind(), SectionKind::Exec);
        assert!(!text.routines().is_empty());

        // Relocated entry points fall inside executable mappings
        let routine = &text.routines()[0];
        assert!(maps
            .iter()
            .any(|m| m.is_executable() && m.contains(routine.address())));
    }

    fn symbol(name: &str, address: u64, global: bool, weak: bool) -> FunctionSymbol {
        FunctionSymbol {
            section: object::SectionIndex(14),
            address,
            name: name.to_string(),
            size: 32,
            global,
            weak,
        }
    }

    fn chosen_names(symbols: Vec<FunctionSymbol>) -> Vec<String> {
        merge_aliases(symbols)
            .remove(&object::SectionIndex(14))
            .unwrap_or_default()
            .into_values()
            .map(|symbol| symbol.name)
            .collect()
    }

    #[test]
    fn test_public_alias_wins_over_internal_name() {
        // libc-style: the internal name comes first in the table
        let names = chosen_names(vec![
            symbol("__x", 0x98ef0, true, false),
            symbol("x", 0x98ef0, true, false),
        ]);
        assert_eq!(names, vec!["x"]);

        let names = chosen_names(vec![
            symbol("x", 0x98ef0, true, false),
            symbol("__x", 0x98ef0, true, false),
        ]);
        assert_eq!(names, vec!["x"]);
    }

    #[test]
    fn test_alias_preference_among_relevant_names() {
        // __libc_free, cfree, free at one address
        let names = chosen_names(vec![
            symbol("__libc_free", 0x98ef0, true, false),
            symbol("cfree", 0x98ef0, true, true),
            symbol("free", 0x98ef0, true, false),
        ]);
        assert_eq!(names, vec!["free"]);

        // Strong global beats a shorter local
        let names = chosen_names(vec![
            symbol("f", 0x100, false, false),
            symbol("fork", 0x100, true, false),
        ]);
        assert_eq!(names, vec!["fork"]);

        // Full tie: first seen stays
        let names = chosen_names(vec![
            symbol("aa", 0x100, true, false),
            symbol("bb", 0x100, true, false),
        ]);
        assert_eq!(names, vec!["aa"]);
    }

    #[test]
    fn test_only_rejected_aliases_keep_one_entry() {
        let names = chosen_names(vec![
            symbol("__fork", 0xd3e80, true, false),
            symbol("__libc_fork", 0xd3e80, true, false),
            symbol("malloc", 0x1000, true, false),
        ]);
        // Sorted by address; the filtered entry still occupies its address
        assert_eq!(names, vec!["malloc", "__fork"]);
    }

    #[test]
    fn test_load_missing_file() {
        let mapping = MapEntry {
            start: 0x1000,
            end: 0x2000,
            offset: 0,
            executable: true,
            path: Some("/nonexistent/lib.so".into()),
        };
        let err = load_image(Path::new("/nonexistent/lib.so"), &mapping).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/lib.so"));
    }
}
