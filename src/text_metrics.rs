use fontdb::{Database, Family, Query, Stretch, Style, Weight};
use log::debug;
use once_cell::sync::{Lazy, OnceCell};
use std::collections::HashMap;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use ttf_parser::Face;

static TEXT_MEASURER: Lazy<Mutex<TextMeasurer>> = Lazy::new(|| Mutex::new(TextMeasurer::new()));
static CACHE_DIR: OnceCell<PathBuf> = OnceCell::new();

/// Width used per character when no font face can be resolved.
const FALLBACK_CHAR_RATIO: f32 = 0.56;

/// Sets the on-disk font cache directory. Only the first call has an effect.
pub fn init_cache_dir(path: &Path) {
    if CACHE_DIR.set(path.to_path_buf()).is_err() {
        debug!(path:? = path; "Font cache directory already set");
    }
}

pub fn measure_text_width(text: &str, font_size: f32, font_family: &str) -> f32 {
    if text.is_empty() || font_size <= 0.0 {
        return 0.0;
    }
    let measured = TEXT_MEASURER
        .lock()
        .ok()
        .and_then(|mut guard| guard.measure(text, font_size, font_family));
    measured.unwrap_or_else(|| fallback_width(text, font_size))
}

fn fallback_width(text: &str, font_size: f32) -> f32 {
    text.chars().count() as f32 * font_size * FALLBACK_CHAR_RATIO
}

struct TextMeasurer {
    db: Database,
    loaded_system_fonts: bool,
    cache: HashMap<String, Option<FontMetrics>>,
}

impl TextMeasurer {
    fn new() -> Self {
        Self {
            db: Database::new(),
            loaded_system_fonts: false,
            cache: HashMap::new(),
        }
    }

    fn measure(&mut self, text: &str, font_size: f32, font_family: &str) -> Option<f32> {
        let key = normalize_family_key(font_family);
        if !self.cache.contains_key(&key) {
            let metrics = self.load_metrics(font_family, &key);
            self.cache.insert(key.clone(), metrics);
        }
        let metrics = self.cache.get(&key)?.as_ref()?;
        Some(metrics.width(text, font_size))
    }

    fn load_metrics(&mut self, font_family: &str, key: &str) -> Option<FontMetrics> {
        if let Some(metrics) = load_cached_face(key) {
            return Some(metrics);
        }

        let names: Vec<&str> = font_family
            .split(',')
            .map(|part| part.trim().trim_matches('"').trim_matches('\''))
            .filter(|part| !part.is_empty())
            .collect();
        let mut families: Vec<Family<'_>> = names
            .iter()
            .map(|name| match name.to_ascii_lowercase().as_str() {
                "serif" => Family::Serif,
                "sans-serif" | "system-ui" => Family::SansSerif,
                "monospace" => Family::Monospace,
                _ => Family::Name(name),
            })
            .collect();
        if families.is_empty() {
            families.push(Family::SansSerif);
        }

        if !self.loaded_system_fonts {
            self.db.load_system_fonts();
            self.loaded_system_fonts = true;
        }

        let query = Query {
            families: &families,
            weight: Weight::NORMAL,
            stretch: Stretch::Normal,
            style: Style::Normal,
        };
        let id = self.db.query(&query)?;
        let mut loaded = None;
        self.db.with_face_data(id, |data, index| {
            if let Some(metrics) = FontMetrics::parse(data, index) {
                store_cached_face(key, data, index);
                loaded = Some(metrics);
            }
        });
        loaded
    }
}

/// Horizontal advances extracted once from a face; the face data is not kept.
struct FontMetrics {
    units_per_em: u16,
    advances: HashMap<char, u16>,
}

impl FontMetrics {
    fn parse(data: &[u8], index: u32) -> Option<Self> {
        let face = Face::parse(data, index).ok()?;
        let mut advances = HashMap::new();
        for ch in (' '..='~').chain('\u{a0}'..='\u{17f}') {
            if let Some(advance) = face
                .glyph_index(ch)
                .and_then(|glyph| face.glyph_hor_advance(glyph))
            {
                advances.insert(ch, advance);
            }
        }
        Some(Self {
            units_per_em: face.units_per_em().max(1),
            advances,
        })
    }

    fn width(&self, text: &str, font_size: f32) -> f32 {
        let scale = font_size / self.units_per_em as f32;
        text.chars()
            .filter(|ch| *ch != '\n')
            .map(|ch| match self.advances.get(&ch) {
                Some(advance) => *advance as f32 * scale,
                None => font_size * FALLBACK_CHAR_RATIO,
            })
            .sum()
    }
}

fn normalize_family_key(font_family: &str) -> String {
    let trimmed = font_family.trim();
    if trimmed.is_empty() {
        "sans-serif".to_string()
    } else {
        trimmed.to_string()
    }
}

fn cache_paths(family_key: &str) -> Option<(PathBuf, PathBuf)> {
    let base = CACHE_DIR.get()?;
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    family_key.hash(&mut hasher);
    let hash = hasher.finish();
    let dir = base.join("font-cache");
    Some((dir.join(format!("{hash:x}.font")), dir.join(format!("{hash:x}.meta"))))
}

fn store_cached_face(family_key: &str, data: &[u8], index: u32) {
    let Some((font_path, meta_path)) = cache_paths(family_key) else {
        return;
    };
    if font_path.exists() {
        return;
    }
    let written = font_path
        .parent()
        .map_or(Ok(()), fs::create_dir_all)
        .and_then(|_| fs::write(&font_path, data))
        .and_then(|_| fs::write(&meta_path, index.to_string()));
    if let Err(err) = written {
        debug!(path:? = font_path, error:% = err; "Could not write font cache");
    }
}

fn load_cached_face(family_key: &str) -> Option<FontMetrics> {
    let (font_path, meta_path) = cache_paths(family_key)?;
    if !font_path.exists() || !meta_path.exists() {
        return None;
    }
    let bytes = fs::read(font_path).ok()?;
    let index: u32 = fs::read_to_string(meta_path).ok()?.trim().parse().ok()?;
    FontMetrics::parse(&bytes, index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_has_zero_width() {
        assert_eq!(measure_text_width("", 12.0, "sans-serif"), 0.0);
        assert_eq!(measure_text_width("abc", 0.0, "sans-serif"), 0.0);
    }

    #[test]
    fn longer_text_is_wider() {
        let short = measure_text_width("7", 12.0, "sans-serif");
        let long = measure_text_width("7777777", 12.0, "sans-serif");
        assert!(short > 0.0);
        assert!(long > short);
    }

    #[test]
    fn fallback_scales_with_length() {
        assert_eq!(fallback_width("ab", 10.0), 2.0 * 10.0 * FALLBACK_CHAR_RATIO);
    }
}
