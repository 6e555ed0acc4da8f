use std::path::Path;

use anyhow::{Context, Result};

use crate::linker::LinkedImage;

pub mod map;

/// Byte order used when a word is stored as two bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WordOrder {
    #[default]
    Big,
    Little,
}

/// Writes the image as raw words, two bytes each.
///
/// # Errors
/// Returns an error when writing `output_path` fails.
pub fn write_output(output_path: &Path, image: &LinkedImage, order: WordOrder) -> Result<()> {
    let payload = encode_words(&image.words, order);
    std::fs::write(output_path, payload)
        .with_context(|| format!("failed to write {}", output_path.display()))?;
    Ok(())
}

#[must_use]
pub fn encode_words(words: &[u16], order: WordOrder) -> Vec<u8> {
    let mut out = Vec::with_capacity(words.len() * 2);
    for word in words {
        let bytes = match order {
            WordOrder::Big => word.to_be_bytes(),
            WordOrder::Little => word.to_le_bytes(),
        };
        out.extend_from_slice(&bytes);
    }
    out
}
