use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;

use bedrockview_parse::{BlockState, ChunkPos, DecodeOptions, Decoder, Dimension, HeightMap, NO_HEIGHT};
use bedrockview_storage::{LevelDbStore, RecordStore, key_type_counts, load_chunk, occupied_chunks};
use bedrockview_tiles::{Image, Rect, TILE_SIZE, TileServer};

mod colors;
mod source;

use source::WorldTileSource;

#[derive(Parser)]
#[command(name = "bedrockview", about = "Decode Bedrock world databases and render map tiles")]
pub struct Args {
    /// World directory, or its `db` directory
    #[arg(short, long, env = "BEDROCKVIEW_WORLD")]
    pub world: PathBuf,

    /// Dimension: overworld, nether or end
    #[arg(short, long, env = "BEDROCKVIEW_DIMENSION", default_value = "overworld")]
    pub dimension: Dimension,

    /// Block layers to decode per sub-chunk
    #[arg(long, env = "BEDROCKVIEW_LAYERS", default_value = "1")]
    pub layers: usize,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Count records per key type
    Keys,
    /// Decode one chunk and print its sub-chunks and height map
    Chunk {
        #[arg(long, allow_hyphen_values = true)]
        x: i32,
        #[arg(long, allow_hyphen_values = true)]
        z: i32,
        /// Print the decoded chunk as JSON
        #[arg(long)]
        json: bool,
    },
    /// Decode every occupied chunk of the dimension
    Scan,
    /// Render a block area to a PNG image
    Render {
        #[arg(long, allow_hyphen_values = true)]
        x0: i32,
        #[arg(long, allow_hyphen_values = true)]
        z0: i32,
        #[arg(long, allow_hyphen_values = true)]
        x1: i32,
        #[arg(long, allow_hyphen_values = true)]
        z1: i32,
        /// Blocks per tile side: 16, 32, 64, ...
        #[arg(long, default_value = "16")]
        units: u32,
        #[arg(short, long, default_value = "map.png")]
        out: PathBuf,
        /// Decoded chunks kept in memory
        #[arg(long, env = "BEDROCKVIEW_CHUNK_CACHE", default_value = "4096")]
        chunk_cache: NonZeroUsize,
        /// Leave empty areas transparent instead of drawing a checkerboard
        #[arg(long)]
        no_pattern: bool,
    },
    /// Describe the top block of one column
    Info {
        #[arg(long, allow_hyphen_values = true)]
        x: i32,
        #[arg(long, allow_hyphen_values = true)]
        z: i32,
    },
}

#[derive(Serialize)]
struct SubChunkReport {
    index: i8,
    min_y: i32,
    layers: Vec<LayerReport>,
}

#[derive(Serialize)]
struct LayerReport {
    bits_per_block: u8,
    palette: Vec<BlockState>,
}

#[derive(Serialize)]
struct ChunkReport {
    dimension: Dimension,
    pos: ChunkPos,
    min_y: Option<i32>,
    max_y: Option<i32>,
    sub_chunks: Vec<SubChunkReport>,
    heights: HeightMap,
    /// Indexed `[x][z]`.
    top_blocks: Vec<Vec<Option<BlockState>>>,
}

fn empty_pattern() -> Image {
    Image::checkerboard(TILE_SIZE, 8, [0, 0, 0, 255], [0x33, 0x33, 0x33, 255])
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let store: Rc<dyn RecordStore> = Rc::new(LevelDbStore::open(&args.world)?);
    let decoder = Decoder::new(DecodeOptions {
        max_layers: args.layers.max(1),
    });

    match args.command {
        Command::Keys => print_keys(store.as_ref()),
        Command::Chunk { x, z, json } => {
            print_chunk(store.as_ref(), decoder, ChunkPos::new(x, z), args.dimension, json)
        }
        Command::Scan => scan(store.as_ref(), decoder, args.dimension),
        Command::Render {
            x0,
            z0,
            x1,
            z1,
            units,
            out,
            chunk_cache,
            no_pattern,
        } => {
            let source = world_source(store, decoder, args.dimension, chunk_cache)?;
            let mut server = TileServer::new(source);
            if !no_pattern {
                server = server.with_empty_pattern(empty_pattern());
            }
            render(&mut server, Rect::new(x0, z0, x1, z1), units, &out)
        }
        Command::Info { x, z } => {
            let mut server = TileServer::new(world_source(store, decoder, args.dimension, NonZeroUsize::MIN)?);
            println!("{}", server.info(x, z)?);
            Ok(())
        }
    }
}

fn world_source(
    store: Rc<dyn RecordStore>,
    decoder: Decoder,
    dimension: Dimension,
    chunk_cache: NonZeroUsize,
) -> Result<WorldTileSource> {
    let occupied = occupied_chunks(store.as_ref())?
        .remove(&dimension)
        .unwrap_or_default();
    Ok(WorldTileSource::new(store, dimension, occupied, decoder, chunk_cache))
}

fn print_keys(store: &dyn RecordStore) -> Result<()> {
    let counts = key_type_counts(store)?;
    for (key_type, count) in &counts {
        println!("{:>10} {}", count, key_type);
    }
    println!("{:>10} total", counts.values().sum::<usize>());
    Ok(())
}

fn print_chunk(store: &dyn RecordStore, mut decoder: Decoder, pos: ChunkPos, dimension: Dimension, json: bool) -> Result<()> {
    let mut chunk = load_chunk(store, &mut decoder, pos, dimension)?;
    if chunk.is_empty() {
        println!("{} chunk {} has no sub-chunks", dimension, pos);
    }

    let sub_chunks = chunk
        .sub_chunks()
        .iter()
        .map(|s| SubChunkReport {
            index: s.index,
            min_y: s.min_y(),
            layers: s
                .layers
                .iter()
                .map(|l| LayerReport {
                    bits_per_block: l.bits_per_block(),
                    palette: l.palette().to_vec(),
                })
                .collect(),
        })
        .collect::<Vec<_>>();
    let heights = chunk.height_map(0).clone();
    let mut top_blocks = Vec::with_capacity(16);
    for x in 0..16 {
        let column = (0..16)
            .map(|z| chunk.top_block(x, z, 0).map(|(_, b)| b.clone()))
            .collect::<Vec<_>>();
        top_blocks.push(column);
    }

    let report = ChunkReport {
        dimension,
        pos,
        min_y: chunk.min_y(),
        max_y: chunk.max_y(),
        sub_chunks,
        heights,
        top_blocks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{} chunk {}, tags: {:?}", dimension, pos, chunk.tags().collect::<Vec<_>>());
    for s in &report.sub_chunks {
        let layers = s
            .layers
            .iter()
            .map(|l| format!("{} bits/{} entries", l.bits_per_block, l.palette.len()))
            .collect::<Vec<_>>();
        println!("  sub-chunk {:>3} (y {:>4}): {}", s.index, s.min_y, layers.join(", "));
    }
    println!("Height map (rows are z, columns are x):");
    for z in 0..16 {
        let row = (0..16)
            .map(|x| match report.heights.get(x, z) {
                Some(NO_HEIGHT) | None => "   -".to_string(),
                Some(y) => format!("{:>4}", y),
            })
            .collect::<String>();
        println!("{}", row);
    }
    let mut names = report
        .top_blocks
        .iter()
        .flatten()
        .flatten()
        .map(|b| b.name.as_str())
        .collect::<Vec<_>>();
    names.sort_unstable();
    names.dedup();
    println!("Top blocks: {}", names.join(", "));
    Ok(())
}

fn scan(store: &dyn RecordStore, mut decoder: Decoder, dimension: Dimension) -> Result<()> {
    let occupied: HashSet<ChunkPos> = occupied_chunks(store)?.remove(&dimension).unwrap_or_default();
    let mut positions = occupied.into_iter().collect::<Vec<_>>();
    positions.sort();
    log::info!("Scanning {} {} chunks", positions.len(), dimension);

    let mut failed = 0usize;
    for pos in positions {
        if let Err(e) = load_chunk(store, &mut decoder, pos, dimension) {
            log::warn!("{:#}", e);
            failed += 1;
        }
    }

    let stats = decoder.stats();
    println!("chunks decoded:  {}", stats.chunks);
    println!("chunks failed:   {}", failed);
    println!("sub-chunks:      {}", stats.sub_chunks);
    println!("records skipped: {}", stats.records_skipped);
    println!("bits per block:  {:?}", decoder.seen_bits_per_block().collect::<Vec<_>>());
    Ok(())
}

fn render(server: &mut TileServer<WorldTileSource>, area: Rect, units: u32, out: &Path) -> Result<()> {
    if area.is_empty() {
        bail!("Empty render area {:?}", area);
    }
    let tiles = server.get(area, units)?;
    let (Some(first), Some(last)) = (tiles.first(), tiles.last()) else {
        bail!("No tiles for {:?}", area);
    };

    let step = units as i32;
    let origin = first.area.min;
    let cols = ((last.area.min.x - origin.x) / step + 1) as u32;
    let rows = ((last.area.min.y - origin.y) / step + 1) as u32;
    log::info!("Rendering {}x{} tiles of {} blocks", cols, rows, units);

    let mut mosaic = Image::new(cols * TILE_SIZE, rows * TILE_SIZE);
    for tile in &tiles {
        let col = ((tile.area.min.x - origin.x) / step) as u32;
        let row = ((tile.area.min.y - origin.y) / step) as u32;
        mosaic.copy_from(&tile.image, col * TILE_SIZE, row * TILE_SIZE);
    }

    mosaic
        .save(out)
        .with_context(|| format!("Failed to write {}", out.display()))?;

    let stats = server.stats();
    let empty = tiles.iter().filter(|t| t.empty).count();
    println!(
        "Wrote {}x{} ({} tiles, {} empty) to {}",
        mosaic.width(),
        mosaic.height(),
        tiles.len(),
        empty,
        out.display()
    );
    println!(
        "Tile cache: {} hits, {} misses, {} empty shortcuts, {} cached",
        stats.hits,
        stats.misses,
        stats.empty_shortcuts,
        server.cached_tiles()
    );
    let decoded = server.source().decoder().stats();
    println!("Chunks decoded: {} ({} sub-chunks)", decoded.chunks, decoded.sub_chunks);
    Ok(())
}

