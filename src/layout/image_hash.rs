//! Difference hash (dHash) fingerprints for figure images.
//!
//! The image is shrunk to `(size + 1) x size` grayscale and each bit records
//! whether a pixel is brighter than its right neighbour. Bits are packed
//! least-significant first into bytes and rendered as lowercase hex, so an
//! 8x8 hash is 16 hex characters. Two fingerprints are compared character by
//! character.

use image::imageops::FilterType;
use image::DynamicImage;

/// Fingerprint of a decoded image.
#[must_use]
pub fn dhash(image: &DynamicImage, hash_size: u32) -> String {
    let size = hash_size.max(1);
    let small = image
        .resize_exact(size + 1, size, FilterType::CatmullRom)
        .to_luma8();

    let mut bits = Vec::with_capacity((size * size) as usize);
    for y in 0..size {
        for x in 0..size {
            let left = small.get_pixel(x, y).0[0];
            let right = small.get_pixel(x + 1, y).0[0];
            bits.push(left > right);
        }
    }

    pack_bits(&bits)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Decode raw image bytes and fingerprint them.
pub fn dhash_bytes(bytes: &[u8], hash_size: u32) -> image::ImageResult<String> {
    let image = image::load_from_memory(bytes)?;
    Ok(dhash(&image, hash_size))
}

fn pack_bits(bits: &[bool]) -> Vec<u8> {
    bits.chunks(8)
        .map(|chunk| {
            chunk
                .iter()
                .enumerate()
                .fold(0u8, |acc, (i, &bit)| acc | (u8::from(bit) << i))
        })
        .collect()
}

/// Number of positions where the two fingerprints differ.
///
/// Fingerprints of different length are maximally distant: the longer length
/// is returned.
#[must_use]
pub fn hamming_distance(a: &str, b: &str) -> usize {
    let (la, lb) = (a.chars().count(), b.chars().count());
    if la != lb {
        return la.max(lb);
    }
    a.chars().zip(b.chars()).filter(|(x, y)| x != y).count()
}
