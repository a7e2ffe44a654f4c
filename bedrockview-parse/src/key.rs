//! Key classification.
//!
//! Keys are either well-known names (`portals`, `player_…`, `VILLAGE_…`) or
//! fixed-length chunk keys: an 8 or 12 byte chunk prefix, a tag byte and,
//! for sub-chunk records, a trailing vertical index byte.

use std::fmt;
use std::sync::OnceLock;

use crate::binary::parse_sane_chunk_prefix;
use crate::world::{ChunkPos, Dimension};

/// Dimension-independent tag byte following a chunk prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ChunkTag {
    Data3D = 43,
    Version = 44,
    Data2D = 45,
    Data2DLegacy = 46,
    SubChunkPrefix = 47,
    LegacyTerrain = 48,
    BlockEntity = 49,
    Entity = 50,
    PendingTicks = 51,
    LegacyBlockExtraData = 52,
    BiomeState = 53,
    FinalizedState = 54,
    ConversionData = 55,
    BorderBlocks = 56,
    HardcodedSpawners = 57,
    RandomTicks = 58,
    CheckSums = 59,
    GenerationSeed = 60,
    GeneratedPreCavesAndCliffsBlending = 61,
    BlendingBiomeHeight = 62,
    MetaDataHash = 63,
    BlendingData = 64,
    ActorDigestVersion = 65,
    LegacyVersion = 118,
}

impl ChunkTag {
    pub const ALL: [ChunkTag; 24] = [
        ChunkTag::Data3D,
        ChunkTag::Version,
        ChunkTag::Data2D,
        ChunkTag::Data2DLegacy,
        ChunkTag::SubChunkPrefix,
        ChunkTag::LegacyTerrain,
        ChunkTag::BlockEntity,
        ChunkTag::Entity,
        ChunkTag::PendingTicks,
        ChunkTag::LegacyBlockExtraData,
        ChunkTag::BiomeState,
        ChunkTag::FinalizedState,
        ChunkTag::ConversionData,
        ChunkTag::BorderBlocks,
        ChunkTag::HardcodedSpawners,
        ChunkTag::RandomTicks,
        ChunkTag::CheckSums,
        ChunkTag::GenerationSeed,
        ChunkTag::GeneratedPreCavesAndCliffsBlending,
        ChunkTag::BlendingBiomeHeight,
        ChunkTag::MetaDataHash,
        ChunkTag::BlendingData,
        ChunkTag::ActorDigestVersion,
        ChunkTag::LegacyVersion,
    ];

    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            43..=65 => Some(Self::ALL[(b - 43) as usize]),
            118 => Some(ChunkTag::LegacyVersion),
            _ => None,
        }
    }

    #[inline]
    pub fn byte(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            ChunkTag::Data3D => "Data3D",
            ChunkTag::Version => "Version",
            ChunkTag::Data2D => "Data2D",
            ChunkTag::Data2DLegacy => "Data2DLegacy",
            ChunkTag::SubChunkPrefix => "SubChunkPrefix",
            ChunkTag::LegacyTerrain => "LegacyTerrain",
            ChunkTag::BlockEntity => "BlockEntity",
            ChunkTag::Entity => "Entity",
            ChunkTag::PendingTicks => "PendingTicks",
            ChunkTag::LegacyBlockExtraData => "LegacyBlockExtraData",
            ChunkTag::BiomeState => "BiomeState",
            ChunkTag::FinalizedState => "FinalizedState",
            ChunkTag::ConversionData => "ConversionData",
            ChunkTag::BorderBlocks => "BorderBlocks",
            ChunkTag::HardcodedSpawners => "HardcodedSpawners",
            ChunkTag::RandomTicks => "RandomTicks",
            ChunkTag::CheckSums => "CheckSums",
            ChunkTag::GenerationSeed => "GenerationSeed",
            ChunkTag::GeneratedPreCavesAndCliffsBlending => "GeneratedPreCavesAndCliffsBlending",
            ChunkTag::BlendingBiomeHeight => "BlendingBiomeHeight",
            ChunkTag::MetaDataHash => "MetaDataHash",
            ChunkTag::BlendingData => "BlendingData",
            ChunkTag::ActorDigestVersion => "ActorDigestVersion",
            ChunkTag::LegacyVersion => "LegacyVersion",
        }
    }
}

/// Semantic kind of a database key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum KeyType {
    #[default]
    Unknown,
    PlayerServer,
    Player,
    Map,
    VillageDwellers,
    VillageInfo,
    VillagePlayers,
    VillagePoi,
    VillageOverworldDwellers,
    VillageOverworldInfo,
    VillageOverworldPlayers,
    VillageOverworldPoi,
    AutonomousEntities,
    BiomeData,
    LevelChunkMetaDataDictionary,
    Nether,
    Overworld,
    TheEnd,
    MobEvents,
    Portals,
    SchedulerWt,
    Scoreboard,
    ActorPrefix,
    Digp,
    LocalPlayer,
    GameFlatWorldLayers,
    StructureTemplate,
    TickingArea,
    /// A chunk-addressed record.
    Chunk(Dimension, ChunkTag),
}

impl KeyType {
    pub fn is_chunk_data(self) -> bool {
        matches!(self, KeyType::Chunk(..))
    }

    pub fn is_chunk_data_for(self, dimension: Dimension) -> bool {
        matches!(self, KeyType::Chunk(d, _) if d == dimension)
    }

    pub fn is_sub_chunk_prefix(self) -> bool {
        matches!(self, KeyType::Chunk(_, ChunkTag::SubChunkPrefix))
    }

    pub fn chunk_tag(self) -> Option<ChunkTag> {
        match self {
            KeyType::Chunk(_, tag) => Some(tag),
            _ => None,
        }
    }

    pub fn dimension(self) -> Option<Dimension> {
        match self {
            KeyType::Chunk(dimension, _) => Some(dimension),
            _ => None,
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KeyType::Chunk(dimension, tag) => return write!(f, "{}{}", dimension.name(), tag.name()),
            KeyType::Unknown => "Unknown",
            KeyType::PlayerServer => "PlayerServer",
            KeyType::Player => "Player",
            KeyType::Map => "Map",
            KeyType::VillageDwellers => "VillageDwellers",
            KeyType::VillageInfo => "VillageInfo",
            KeyType::VillagePlayers => "VillagePlayers",
            KeyType::VillagePoi => "VillagePOI",
            KeyType::VillageOverworldDwellers => "VillageOverworldDwellers",
            KeyType::VillageOverworldInfo => "VillageOverworldInfo",
            KeyType::VillageOverworldPlayers => "VillageOverworldPlayers",
            KeyType::VillageOverworldPoi => "VillageOverworldPOI",
            KeyType::AutonomousEntities => "AutonomousEntities",
            KeyType::BiomeData => "BiomeData",
            KeyType::LevelChunkMetaDataDictionary => "LevelChunkMetaDataDictionary",
            KeyType::Nether => "Nether",
            KeyType::Overworld => "Overworld",
            KeyType::TheEnd => "TheEnd",
            KeyType::MobEvents => "Mobevents",
            KeyType::Portals => "Portals",
            KeyType::SchedulerWt => "SchedulerWT",
            KeyType::Scoreboard => "Scoreboard",
            KeyType::ActorPrefix => "Actorprefix",
            KeyType::Digp => "Digp",
            KeyType::LocalPlayer => "LocalPlayer",
            KeyType::GameFlatWorldLayers => "GameFlatworldLayers",
            KeyType::StructureTemplate => "StructureTemplate",
            KeyType::TickingArea => "TickingArea",
        };
        f.write_str(name)
    }
}

const FULL_KEYS: &[(&str, KeyType)] = &[
    ("AutonomousEntities", KeyType::AutonomousEntities),
    ("BiomeData", KeyType::BiomeData),
    ("LevelChunkMetaDataDictionary", KeyType::LevelChunkMetaDataDictionary),
    ("Nether", KeyType::Nether),
    ("Overworld", KeyType::Overworld),
    ("TheEnd", KeyType::TheEnd),
    ("mobevents", KeyType::MobEvents),
    ("portals", KeyType::Portals),
    ("schedulerWT", KeyType::SchedulerWt),
    ("scoreboard", KeyType::Scoreboard),
    ("~local_player", KeyType::LocalPlayer),
    ("game_flatworldlayers", KeyType::GameFlatWorldLayers),
    ("structuretemplate", KeyType::StructureTemplate),
    ("tickingarea", KeyType::TickingArea),
];

// Order matters: the first matching (prefix, suffix) pair wins.
const PREFIX_SUFFIX_KEYS: &[(&str, &str, KeyType)] = &[
    ("map_-", "", KeyType::Map),
    ("player_server_", "", KeyType::PlayerServer),
    ("player_", "", KeyType::Player),
    ("actorprefix", "", KeyType::ActorPrefix),
    ("digp", "", KeyType::Digp),
    ("VILLAGE_Overworld_", "_DWELLERS", KeyType::VillageOverworldDwellers),
    ("VILLAGE_Overworld_", "_INFO", KeyType::VillageOverworldInfo),
    ("VILLAGE_Overworld_", "_PLAYERS", KeyType::VillageOverworldPlayers),
    ("VILLAGE_Overworld_", "_POI", KeyType::VillageOverworldPoi),
    ("VILLAGE_", "_DWELLERS", KeyType::VillageDwellers),
    ("VILLAGE_", "_INFO", KeyType::VillageInfo),
    ("VILLAGE_", "_PLAYERS", KeyType::VillagePlayers),
    ("VILLAGE_", "_POI", KeyType::VillagePoi),
];

/// Classification result for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyInfo {
    pub key_type: KeyType,
    /// Chunk coordinate and dimension, for chunk-addressed keys.
    pub location: Option<(ChunkPos, Dimension)>,
}

/// Classify a raw key. Pure; never fails.
pub fn classify(key: &[u8]) -> KeyInfo {
    if let Some((_, key_type)) = FULL_KEYS.iter().find(|(name, _)| name.as_bytes() == key) {
        return KeyInfo { key_type: *key_type, location: None };
    }

    for (prefix, suffix, key_type) in PREFIX_SUFFIX_KEYS {
        if key.starts_with(prefix.as_bytes()) && key.ends_with(suffix.as_bytes()) {
            return KeyInfo { key_type: *key_type, location: None };
        }
    }

    classify_chunk_key(key).unwrap_or_default()
}

fn classify_chunk_key(key: &[u8]) -> Option<KeyInfo> {
    let len = key.len();
    if !matches!(len, 9 | 10 | 13 | 14) {
        return None;
    }
    let tag_at = len & !3;
    let (pos, dimension) = parse_sane_chunk_prefix(&key[..tag_at])?;
    let tag = ChunkTag::from_byte(key[tag_at])?;
    Some(KeyInfo {
        key_type: KeyType::Chunk(dimension, tag),
        location: Some((pos, dimension)),
    })
}

/// Owned snapshot of one database record.
#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: Vec<u8>,
    pub val: Vec<u8>,
    info: OnceLock<KeyInfo>,
}

impl KeyVal {
    pub fn new(key: impl Into<Vec<u8>>, val: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            val: val.into(),
            info: OnceLock::new(),
        }
    }

    /// Classification of the key, computed once.
    pub fn key_info(&self) -> KeyInfo {
        *self.info.get_or_init(|| {
            let info = classify(&self.key);
            if info.key_type == KeyType::Unknown {
                log::trace!("Unclassified key {:02x?}", self.key);
            }
            info
        })
    }

    pub fn key_type(&self) -> KeyType {
        self.key_info().key_type
    }

    /// Trailing vertical index byte of a sub-chunk key.
    /// Vertical index byte of a sub-chunk key. `None` for other records
    /// and for sub-chunk keys too short to carry one.
    pub fn sub_chunk_index(&self) -> Option<i8> {
        if self.key_type().is_sub_chunk_prefix() && self.key.len() & 3 == 2 {
            self.key.last().map(|b| *b as i8)
        } else {
            None
        }
    }
}
