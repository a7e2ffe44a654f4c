//! Flat map colours per block name.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use bedrockview_parse::BlockState;
use bedrockview_tiles::Rgba;

const KNOWN: &[(&str, Rgba)] = &[
    ("minecraft:grass_block", [0x5D, 0x94, 0x3A, 0xFF]),
    ("minecraft:grass", [0x5D, 0x94, 0x3A, 0xFF]),
    ("minecraft:dirt", [0x86, 0x60, 0x43, 0xFF]),
    ("minecraft:stone", [0x7D, 0x7D, 0x7D, 0xFF]),
    ("minecraft:deepslate", [0x50, 0x50, 0x55, 0xFF]),
    ("minecraft:bedrock", [0x35, 0x35, 0x35, 0xFF]),
    ("minecraft:sand", [0xDB, 0xCF, 0xA3, 0xFF]),
    ("minecraft:gravel", [0x84, 0x7F, 0x7E, 0xFF]),
    ("minecraft:water", [0x3F, 0x76, 0xE4, 0xFF]),
    ("minecraft:flowing_water", [0x3F, 0x76, 0xE4, 0xFF]),
    ("minecraft:lava", [0xCF, 0x5B, 0x13, 0xFF]),
    ("minecraft:flowing_lava", [0xCF, 0x5B, 0x13, 0xFF]),
    ("minecraft:snow", [0xF9, 0xFE, 0xFE, 0xFF]),
    ("minecraft:snow_layer", [0xF9, 0xFE, 0xFE, 0xFF]),
    ("minecraft:ice", [0x91, 0xB7, 0xFD, 0xFF]),
    ("minecraft:oak_leaves", [0x3B, 0x7A, 0x1F, 0xFF]),
    ("minecraft:leaves", [0x3B, 0x7A, 0x1F, 0xFF]),
    ("minecraft:oak_log", [0x6B, 0x51, 0x30, 0xFF]),
    ("minecraft:netherrack", [0x6F, 0x36, 0x35, 0xFF]),
    ("minecraft:soul_sand", [0x51, 0x3E, 0x32, 0xFF]),
    ("minecraft:end_stone", [0xDB, 0xDE, 0x9E, 0xFF]),
    ("minecraft:obsidian", [0x14, 0x12, 0x1D, 0xFF]),
];

/// Colour for a block. Unknown blocks get a stable colour derived from
/// their name; air is transparent.
pub fn block_color(block: &BlockState) -> Rgba {
    if block.is_air() {
        return [0, 0, 0, 0];
    }
    if let Some((_, color)) = KNOWN.iter().find(|(name, _)| *name == block.name) {
        return *color;
    }
    let mut hasher = DefaultHasher::new();
    block.name.hash(&mut hasher);
    let h = hasher.finish().to_le_bytes();
    // Keep generated colours in a muted mid range.
    [0x40 + h[0] / 2, 0x40 + h[1] / 2, 0x40 + h[2] / 2, 0xFF]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_block() {
        assert_eq!(block_color(&BlockState::new("minecraft:water")), [0x3F, 0x76, 0xE4, 0xFF]);
    }

    #[test]
    fn test_air_is_transparent() {
        assert_eq!(block_color(&BlockState::new("minecraft:air"))[3], 0);
    }

    #[test]
    fn test_unknown_block_is_stable_and_opaque() {
        let a = block_color(&BlockState::new("minecraft:mystery_block"));
        let b = block_color(&BlockState::new("minecraft:mystery_block"));
        assert_eq!(a, b);
        assert_eq!(a[3], 0xFF);
        assert!(a[..3].iter().all(|&c| c >= 0x40));
    }
}
