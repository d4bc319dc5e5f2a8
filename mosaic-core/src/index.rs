//! Color index: average tile color -> tile image paths.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::{average_color, Color, MosaicError, Result};

/// Options for building an index from a dataset folder
#[derive(Debug, Clone)]
pub struct IndexOptions {
    /// File extensions (without dot, case-insensitive) that count as tiles
    pub extensions: Vec<String>,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            extensions: vec!["jpg".to_string()],
        }
    }
}

impl IndexOptions {
    fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }
}

/// Mapping from average color to every tile sharing that color.
///
/// Keys are kept ordered, so iteration (and therefore nearest-color tie
/// breaking) is deterministic. Buckets are never empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColorIndex {
    buckets: BTreeMap<Color, Vec<PathBuf>>,
}

impl ColorIndex {
    /// Summarize every matching file directly under `dir` (no recursion)
    pub fn build(dir: &Path, options: &IndexOptions) -> Result<Self> {
        let read_err = |source: std::io::Error| MosaicError::DatasetRead {
            path: dir.to_path_buf(),
            source,
        };

        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(read_err)? {
            let path = entry.map_err(read_err)?.path();
            if path.is_file() && options.matches(&path) {
                files.push(path);
            }
        }
        files.sort();
        log::info!("Indexing {} tile images in {:?}", files.len(), dir);

        #[cfg(feature = "parallel")]
        let colors: Vec<Color> = files
            .par_iter()
            .map(|path| summarize_file(path))
            .collect::<Result<_>>()?;

        #[cfg(not(feature = "parallel"))]
        let colors: Vec<Color> = files
            .iter()
            .map(|path| summarize_file(path))
            .collect::<Result<_>>()?;

        let index: ColorIndex = colors.into_iter().zip(files).collect();
        log::info!(
            "Indexed {} tiles under {} distinct colors",
            index.tile_count(),
            index.len(),
        );
        Ok(index)
    }

    /// Number of distinct colors
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Total number of tile references across all buckets
    pub fn tile_count(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    /// Tiles whose average color is exactly `color`
    pub fn get(&self, color: &Color) -> Option<&[PathBuf]> {
        self.buckets.get(color).map(Vec::as_slice)
    }

    /// Indexed colors in ascending (r, g, b) order
    pub fn colors(&self) -> impl Iterator<Item = &Color> + '_ {
        self.buckets.keys()
    }

    /// Serialize to JSON with `"(r, g, b)"` keys and ordered path lists
    pub fn to_json(&self) -> Result<String> {
        let persisted: BTreeMap<String, &Vec<PathBuf>> = self
            .buckets
            .iter()
            .map(|(color, tiles)| (color.to_string(), tiles))
            .collect();
        serde_json::to_string_pretty(&persisted).map_err(MosaicError::IndexEncode)
    }

    /// Parse the JSON form written by [`ColorIndex::to_json`]
    pub fn from_json(json: &str) -> Result<Self> {
        let persisted: BTreeMap<String, Vec<PathBuf>> = serde_json::from_str(json)?;
        let mut buckets = BTreeMap::new();
        for (key, tiles) in persisted {
            let color: Color = key.parse()?;
            if tiles.is_empty() {
                return Err(MosaicError::EmptyBucket(color));
            }
            // Keys that differ only in whitespace collapse into one bucket
            buckets.entry(color).or_insert_with(Vec::new).extend(tiles);
        }
        Ok(Self { buckets })
    }

    /// Persist the index to `path`
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        std::fs::write(path, json).map_err(|source| MosaicError::IndexIo {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load an index previously written by [`ColorIndex::save`]
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|source| MosaicError::IndexIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Reuse the cached index at `cache` if present, otherwise build it from
    /// `dataset` and write the cache. `rebuild` forces a fresh build.
    pub fn load_or_build(
        cache: &Path,
        dataset: &Path,
        options: &IndexOptions,
        rebuild: bool,
    ) -> Result<Self> {
        if !rebuild && cache.exists() {
            log::debug!("Reusing cached index {:?}", cache);
            return Self::load(cache);
        }
        log::debug!("Building index from {:?} (cache {:?})", dataset, cache);
        let index = Self::build(dataset, options)?;
        index.save(cache)?;
        Ok(index)
    }
}

/// Collisions accumulate into the same bucket, preserving insertion order
impl FromIterator<(Color, PathBuf)> for ColorIndex {
    fn from_iter<I: IntoIterator<Item = (Color, PathBuf)>>(iter: I) -> Self {
        let mut buckets: BTreeMap<Color, Vec<PathBuf>> = BTreeMap::new();
        for (color, path) in iter {
            log::debug!("{} <- {:?}", color, path);
            buckets.entry(color).or_default().push(path);
        }
        Self { buckets }
    }
}

fn summarize_file(path: &Path) -> Result<Color> {
    let image = image::open(path).map_err(|source| MosaicError::DatasetImage {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(average_color(&image.to_rgb8()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_tile(dir: &Path, name: &str, rgb: [u8; 3]) -> PathBuf {
        let path = dir.join(name);
        image::RgbImage::from_pixel(8, 8, image::Rgb(rgb))
            .save(&path)
            .unwrap();
        path
    }

    #[test]
    fn test_build_groups_collisions() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_tile(dir.path(), "a.png", [10, 20, 30]);
        let b = write_tile(dir.path(), "b.png", [10, 20, 30]);
        let c = write_tile(dir.path(), "c.png", [200, 0, 0]);

        let options = IndexOptions {
            extensions: vec!["png".to_string()],
        };
        let index = ColorIndex::build(dir.path(), &options).unwrap();

        assert_eq!(index.len(), 2);
        assert_eq!(index.tile_count(), 3);
        assert_eq!(index.get(&Color::new(10, 20, 30)).unwrap(), &[a, b][..]);
        assert_eq!(index.get(&Color::new(200, 0, 0)).unwrap(), &[c][..]);
    }

    #[test]
    fn test_build_filters_and_does_not_recurse() {
        let dir = tempfile::tempdir().unwrap();
        write_tile(dir.path(), "keep.PNG", [1, 2, 3]);
        write_tile(dir.path(), "skip.bmp", [4, 5, 6]);
        std::fs::write(dir.path().join("notes.txt"), "not an image").unwrap();
        let nested = dir.path().join("nested.png");
        std::fs::create_dir(&nested).unwrap();
        write_tile(&nested, "deep.png", [7, 8, 9]);

        let options = IndexOptions {
            extensions: vec!["png".to_string()],
        };
        let index = ColorIndex::build(dir.path(), &options).unwrap();
        assert_eq!(index.colors().copied().collect::<Vec<_>>(), vec![Color::new(1, 2, 3)]);
    }

    #[test]
    fn test_build_empty_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let index = ColorIndex::build(dir.path(), &IndexOptions::default()).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn test_build_missing_folder() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        let err = ColorIndex::build(&missing, &IndexOptions::default()).unwrap_err();
        assert!(matches!(err, MosaicError::DatasetRead { path, .. } if path == missing));
    }

    #[test]
    fn test_build_undecodable_tile() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("bad.jpg");
        std::fs::write(&bad, b"definitely not a jpeg").unwrap();
        let err = ColorIndex::build(dir.path(), &IndexOptions::default()).unwrap_err();
        assert!(matches!(err, MosaicError::DatasetImage { path, .. } if path == bad));
    }

    #[test]
    fn test_json_round_trip_preserves_order() {
        let index: ColorIndex = vec![
            (Color::new(0, 0, 0), PathBuf::from("tiles/z.jpg")),
            (Color::new(120, 45, 200), PathBuf::from("tiles/b.jpg")),
            (Color::new(0, 0, 0), PathBuf::from("tiles/a.jpg")),
        ]
        .into_iter()
        .collect();

        let json = index.to_json().unwrap();
        assert!(json.contains("\"(120, 45, 200)\""));
        assert!(json.contains("\"(0, 0, 0)\""));

        let loaded = ColorIndex::from_json(&json).unwrap();
        assert_eq!(loaded, index);
        assert_eq!(
            loaded.get(&Color::new(0, 0, 0)).unwrap(),
            &[PathBuf::from("tiles/z.jpg"), PathBuf::from("tiles/a.jpg")][..]
        );
    }

    #[test]
    fn test_from_json_accepts_external_writer() {
        let json = r#"{ "(5,6,7)": ["x.jpg"], "(255, 255, 255)": ["w1.jpg", "w2.jpg"] }"#;
        let index = ColorIndex::from_json(json).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.get(&Color::new(255, 255, 255)).unwrap().len(), 2);
    }

    #[test]
    fn test_from_json_rejects_bad_keys_and_buckets() {
        let bad_key = r#"{ "120-45-200": ["x.jpg"] }"#;
        assert!(matches!(
            ColorIndex::from_json(bad_key),
            Err(MosaicError::MalformedKey(k)) if k == "120-45-200"
        ));

        let empty_bucket = r#"{ "(1, 2, 3)": [] }"#;
        assert!(matches!(
            ColorIndex::from_json(empty_bucket),
            Err(MosaicError::EmptyBucket(c)) if c == Color::new(1, 2, 3)
        ));

        assert!(matches!(
            ColorIndex::from_json("[1, 2, 3]"),
            Err(MosaicError::IndexFormat(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_path_fails_to_encode() {
        use std::os::unix::ffi::OsStrExt;

        let path = PathBuf::from(std::ffi::OsStr::from_bytes(b"tiles/\xff.jpg"));
        let index: ColorIndex = std::iter::once((Color::new(1, 1, 1), path)).collect();

        let err = index.to_json().unwrap_err();
        assert!(matches!(err, MosaicError::IndexEncode(_)));
        assert!(err.to_string().starts_with("Failed to encode index"));

        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("cache.json");
        assert!(matches!(index.save(&cache), Err(MosaicError::IndexEncode(_))));
        assert!(!cache.exists());
    }

    #[test]
    fn test_load_or_build_uses_cache() {
        let dataset = tempfile::tempdir().unwrap();
        write_tile(dataset.path(), "t.jpg", [50, 50, 50]);
        let cache_dir = tempfile::tempdir().unwrap();
        let cache = cache_dir.path().join("cache.json");
        let options = IndexOptions::default();

        let built = ColorIndex::load_or_build(&cache, dataset.path(), &options, false).unwrap();
        assert!(cache.exists());
        assert_eq!(built.tile_count(), 1);

        // New tiles are ignored until a rebuild is requested
        write_tile(dataset.path(), "u.jpg", [250, 0, 0]);
        let cached = ColorIndex::load_or_build(&cache, dataset.path(), &options, false).unwrap();
        assert_eq!(cached, built);

        let rebuilt = ColorIndex::load_or_build(&cache, dataset.path(), &options, true).unwrap();
        assert_eq!(rebuilt.tile_count(), 2);
        assert_eq!(ColorIndex::load(&cache).unwrap(), rebuilt);
    }
}
