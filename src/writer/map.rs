use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};

use crate::linker::LinkedImage;
use crate::module::ObjectModule;

/// Writes a text map of module placement and global symbols.
///
/// # Errors
/// Returns an error when writing `output_path` fails.
pub fn write_map(
    exec_output_path: &Path,
    output_path: &Path,
    image: &LinkedImage,
    modules: &[ObjectModule],
) -> Result<()> {
    let text = build_map_text(exec_output_path, image, modules);
    std::fs::write(output_path, text)
        .with_context(|| format!("failed to write {}", output_path.display()))?;
    Ok(())
}

pub(crate) fn build_map_text(
    exec_output_path: &Path,
    image: &LinkedImage,
    modules: &[ObjectModule],
) -> String {
    let mut out = String::new();
    out.push_str("==========================================================\n");
    let _ = writeln!(out, "{}", exec_output_path.display());
    out.push_str("==========================================================\n");
    out.push_str(&format_range_line("image", 0, image.words.len()));

    for placement in &image.layout.placements {
        let idx = placement.module_index;
        out.push('\n');
        out.push_str("----------------------------------------------------------\n");
        let _ = writeln!(out, "{}", display_obj_name(modules.get(idx), idx));
        out.push_str("----------------------------------------------------------\n");
        out.push_str(&format_range_line("code", placement.base, placement.len));

        let mut syms = image
            .symbols
            .iter()
            .filter(|(_, sym)| sym.module_index == idx)
            .collect::<Vec<_>>();
        syms.sort_by(|a, b| a.1.address.cmp(&b.1.address).then(a.0.cmp(b.0)));
        for (name, sym) in syms {
            out.push_str(&format_symbol_line(name, sym.address));
        }
    }
    out
}

fn display_obj_name(module: Option<&ObjectModule>, idx: usize) -> String {
    match module {
        Some(module) => module.display_name(idx),
        None => format!("#{idx}"),
    }
}

fn format_symbol_line(name: &str, addr: u16) -> String {
    let mut out = format_label_prefix(name);
    let _ = writeln!(out, "{addr:04x}");
    out
}

fn format_range_line(name: &str, pos: usize, size: usize) -> String {
    let mut label = format_label_prefix(name);
    if size == 0 {
        label.push('\n');
        return label;
    }
    let end = pos + size - 1;
    let _ = writeln!(label, "{pos:04x} - {end:04x} ({size:04x})");
    label
}

fn format_label_prefix(name: &str) -> String {
    let tabs = if name.len() < 8 {
        3
    } else if name.len() < 16 {
        2
    } else {
        1
    };
    format!("{name}{} : ", "\t".repeat(tabs))
}
