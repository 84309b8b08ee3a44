// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! PSRX texture cache tool
//!
//! Loads a raw VRAM dump, runs one texture page through the texture cache
//! and writes the decoded texture as PNG.
//!
//! ```text
//! psrx-texcache --vram vram.bin --page 5 --mode 4 --clut-x 0 --clut-y 480 -o page5.png
//! ```

use std::path::PathBuf;

use clap::Parser;
use psrx_texcache::core::texture_cache::vram::{VRAM_HEIGHT, VRAM_WIDTH};
use psrx_texcache::core::texture_cache::{
    PaletteRecordFlags, PaletteReg, Rect, SoftwareBackend, SourceKey, TextureBackend, TextureMode,
    Vram,
};
use psrx_texcache::{TextureCache, TextureCacheSettings};

#[derive(Parser, Debug)]
#[command(
    name = "psrx-texcache",
    version,
    about = "Decode a VRAM texture page through the texture cache"
)]
struct Args {
    /// Raw VRAM dump (1024x512 little-endian 16-bit pixels)
    #[arg(long)]
    vram: PathBuf,

    /// Texture page (0-31)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..32))]
    page: u8,

    /// Texel depth in bits: 4, 8 or 16
    #[arg(long, default_value = "16", value_parser = parse_mode)]
    mode: TextureMode,

    /// Palette X position in VRAM pixels (multiple of 16)
    #[arg(long, default_value_t = 0)]
    clut_x: u32,

    /// Palette Y position in VRAM pixels
    #[arg(long, default_value_t = 0)]
    clut_y: u32,

    /// Output PNG path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Texture cache settings (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Game identifier used for replacement and dump directories
    #[arg(long)]
    game_id: Option<String>,

    /// Upload through wgpu instead of decoding to an image
    #[cfg(feature = "wgpu-backend")]
    #[arg(long)]
    gpu: bool,
}

fn parse_mode(value: &str) -> Result<TextureMode, String> {
    match value {
        "4" => Ok(TextureMode::Palette4Bit),
        "8" => Ok(TextureMode::Palette8Bit),
        "16" | "15" => Ok(TextureMode::Direct16Bit),
        other => Err(format!("unsupported texture depth '{}', expected 4, 8 or 16", other)),
    }
}

/// Feed the dump into the cache and decode the requested page
fn run_lookup<B: TextureBackend>(
    cache: &mut TextureCache<B>,
    vram: &Vram,
    key: SourceKey,
    game_id: Option<&str>,
) -> psrx_texcache::Result<()> {
    cache.initialize()?;
    if let Some(game_id) = game_id {
        cache.set_game_id(game_id)?;
    }

    cache.write_vram(
        0,
        0,
        VRAM_WIDTH,
        VRAM_HEIGHT,
        vram.pixels(),
        false,
        false,
        Rect::VRAM,
    );

    let uv = Rect::new(0, 0, 256, 256);
    let source = cache.lookup_source(key, &uv, PaletteRecordFlags::empty())?;
    log::info!(
        "Decoded {}: texture {:016X}, palette {:016X}, pages {:?}",
        key,
        source.texture_hash(),
        source.palette_hash(),
        source.pages()
    );
    Ok(())
}

#[cfg(feature = "wgpu-backend")]
fn use_gpu(args: &Args) -> bool {
    args.gpu
}

#[cfg(not(feature = "wgpu-backend"))]
fn use_gpu(_args: &Args) -> bool {
    false
}

#[cfg(feature = "wgpu-backend")]
fn run_gpu(
    settings: TextureCacheSettings,
    vram: &Vram,
    key: SourceKey,
    game_id: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    use psrx_texcache::frontend::renderer::{GpuContext, WgpuTextureBackend};

    let context = GpuContext::new_headless()?;
    log::info!("Using GPU adapter {}", context.adapter_name());
    let mut cache = TextureCache::new(WgpuTextureBackend::new(context), settings);
    run_lookup(&mut cache, vram, key, game_id)?;

    let source = cache
        .source_id(key)
        .and_then(|id| cache.source(id))
        .ok_or("source vanished after lookup")?;
    if let Some(texture) = cache.texture(source) {
        println!(
            "Uploaded {}x{} texture for {}",
            texture.width(),
            texture.height(),
            key
        );
    }
    Ok(())
}

#[cfg(not(feature = "wgpu-backend"))]
fn run_gpu(
    _settings: TextureCacheSettings,
    _vram: &Vram,
    _key: SourceKey,
    _game_id: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    Err("built without the wgpu-backend feature".into())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args = Args::parse();

    let mut settings = match &args.config {
        Some(path) => TextureCacheSettings::load(path)?,
        None => TextureCacheSettings::default(),
    };
    settings.apply_env_overrides()?;

    log::info!("Loading VRAM dump {}", args.vram.display());
    let vram = Vram::load_dump(&args.vram)?;
    let key = SourceKey::new(
        args.page,
        PaletteReg::from_position(args.clut_x, args.clut_y),
        args.mode,
    );

    if use_gpu(&args) {
        return run_gpu(settings, &vram, key, args.game_id.as_deref());
    }

    let mut cache = TextureCache::new(SoftwareBackend::new(), settings);
    run_lookup(&mut cache, &vram, key, args.game_id.as_deref())?;

    let source = cache
        .source_id(key)
        .and_then(|id| cache.source(id))
        .ok_or("source vanished after lookup")?;
    let image = cache.texture(source).ok_or("source has no texture")?;

    let output = args
        .output
        .unwrap_or_else(|| PathBuf::from(format!("page{}.png", args.page)));
    image.save(&output)?;
    println!("Wrote {}", output.display());

    let stats = cache.stats();
    log::info!(
        "Lookups: {}, decodes: {}, uploads: {}",
        stats.lookups,
        stats.decodes,
        stats.uploads
    );
    Ok(())
}
