use std::{
    collections::HashMap,
    fs::{self, File},
    io::{BufReader, BufWriter, ErrorKind, Read, Write},
    path::{Path, PathBuf},
    sync::Mutex,
};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use tracing::debug;

use crate::{
    entity::{ColumnId, Entity, EntityKind, EntityValue},
    error::{Error, Result},
    sort::SortBag,
};

/// Container magic. A file that does not start with this is not ours.
const MAGIC: &[u8; 4] = b"HGSB";

/// Bump when the entry layout changes; readers reject other versions.
const FORMAT_VERSION: u16 = 1;

const KIND_INTEGER: u8 = 0;
const KIND_FLOAT: u8 = 1;
const KIND_TEXT: u8 = 2;

/// Identity of one cached sort result.
///
/// `prefix` disambiguates datasets sharing a cache directory (one prefix per
/// open result set); `column` is the sorted column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub prefix: String,
    pub column: ColumnId,
}

impl CacheKey {
    pub fn new(prefix: impl Into<String>, column: ColumnId) -> Self {
        CacheKey {
            prefix: prefix.into(),
            column,
        }
    }

    /// On-disk file name, `{prefix}{column}_a.lst`. The `_a` marks that the
    /// stored order is always ascending.
    pub fn file_name(&self) -> String {
        format!("{}{}_a.lst", self.prefix, self.column)
    }
}

/// Persistence for computed sort bags.
///
/// `load` returning `Err` means the entry exists but cannot be read back;
/// the engine logs and treats that the same as `Ok(None)`.
pub trait SortCacheStore {
    fn load(&self, key: &CacheKey) -> Result<Option<SortBag>>;
    fn store(&self, key: &CacheKey, bag: &SortBag) -> Result<()>;
}

impl SortCacheStore for Box<dyn SortCacheStore + Send + Sync> {
    fn load(&self, key: &CacheKey) -> Result<Option<SortBag>> {
        self.as_ref().load(key)
    }

    fn store(&self, key: &CacheKey, bag: &SortBag) -> Result<()> {
        self.as_ref().store(key, bag)
    }
}

/// In-memory store, for tests and for sessions without a cache directory.
#[derive(Debug, Default)]
pub struct MemorySortCache {
    inner: Mutex<HashMap<(String, ColumnId), SortBag>>,
}

impl MemorySortCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SortCacheStore for MemorySortCache {
    fn load(&self, key: &CacheKey) -> Result<Option<SortBag>> {
        let map = self.inner.lock().expect("sort cache poisoned");
        Ok(map.get(&(key.prefix.clone(), key.column)).cloned())
    }

    fn store(&self, key: &CacheKey, bag: &SortBag) -> Result<()> {
        let mut map = self.inner.lock().expect("sort cache poisoned");
        map.insert((key.prefix.clone(), key.column), bag.clone());
        Ok(())
    }
}

/// Filesystem store writing one versioned container per `(prefix, column)`.
#[derive(Debug, Clone)]
pub struct FsSortCache {
    dir: PathBuf,
}

impl FsSortCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FsSortCache { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    /// Remove one cached entry. Missing files are fine.
    pub fn invalidate(&self, key: &CacheKey) -> Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove every cached entry for one dataset prefix, e.g. when the
    /// result set it belongs to is closed or reloaded.
    pub fn invalidate_prefix(&self, prefix: &str) -> Result<usize> {
        let mut removed = 0;
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with(prefix) && name.ends_with("_a.lst") {
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

impl SortCacheStore for FsSortCache {
    fn load(&self, key: &CacheKey) -> Result<Option<SortBag>> {
        let path = self.path_for(key);
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let bag = read_bag(BufReader::new(file), key.column)?;
        debug!(path = %path.display(), entries = bag.entities.len(), "sort cache hit");
        Ok(Some(bag))
    }

    fn store(&self, key: &CacheKey, bag: &SortBag) -> Result<()> {
        let path = self.path_for(key);
        let mut wtr = BufWriter::new(File::create(&path)?);
        write_bag(&mut wtr, bag)?;
        wtr.flush()?;
        debug!(path = %path.display(), entries = bag.entities.len(), "sort cache written");
        Ok(())
    }
}

fn kind_tag(kind: EntityKind) -> u8 {
    match kind {
        EntityKind::Integer => KIND_INTEGER,
        EntityKind::Float => KIND_FLOAT,
        EntityKind::Text => KIND_TEXT,
    }
}

fn tag_kind(tag: u8) -> Result<EntityKind> {
    match tag {
        KIND_INTEGER => Ok(EntityKind::Integer),
        KIND_FLOAT => Ok(EntityKind::Float),
        KIND_TEXT => Ok(EntityKind::Text),
        other => Err(Error::cache_format(format!("unknown entity kind tag {other}"))),
    }
}

fn write_bag<W: Write>(wtr: &mut W, bag: &SortBag) -> Result<()> {
    wtr.write_all(MAGIC)?;
    wtr.write_u16::<LittleEndian>(FORMAT_VERSION)?;
    wtr.write_u32::<LittleEndian>(bag.column)?;
    wtr.write_u8(u8::from(bag.ascending))?;
    wtr.write_u8(kind_tag(bag.kind))?;
    wtr.write_u64::<LittleEndian>(bag.entities.len() as u64)?;
    for entity in &bag.entities {
        wtr.write_u64::<LittleEndian>(entity.id)?;
        match &entity.value {
            EntityValue::Integer(v) => wtr.write_i64::<LittleEndian>(*v)?,
            EntityValue::Float(v) => wtr.write_f64::<LittleEndian>(*v)?,
            EntityValue::Text(v) => {
                wtr.write_u32::<LittleEndian>(v.len() as u32)?;
                wtr.write_all(v.as_bytes())?;
            },
        }
    }
    Ok(())
}

fn read_bag<R: Read>(mut rdr: R, expected_column: ColumnId) -> Result<SortBag> {
    let mut magic = [0u8; 4];
    rdr.read_exact(&mut magic)
        .map_err(|_| Error::cache_format("container too short for magic"))?;
    if &magic != MAGIC {
        return Err(Error::cache_format("bad magic"));
    }
    let version = rdr.read_u16::<LittleEndian>()?;
    if version != FORMAT_VERSION {
        return Err(Error::cache_format(format!(
            "unsupported container version {version} (expected {FORMAT_VERSION})"
        )));
    }
    let column = rdr.read_u32::<LittleEndian>()?;
    if column != expected_column {
        return Err(Error::cache_format(format!(
            "container is for column {column}, not {expected_column}"
        )));
    }
    let ascending = rdr.read_u8()? != 0;
    let kind = tag_kind(rdr.read_u8()?)?;
    let count = rdr.read_u64::<LittleEndian>()?;

    let mut entities = Vec::with_capacity(count.min(1 << 24) as usize);
    for _ in 0..count {
        let id = rdr
            .read_u64::<LittleEndian>()
            .map_err(|_| Error::cache_format("truncated entry list"))?;
        let value = match kind {
            EntityKind::Integer => EntityValue::Integer(
                rdr.read_i64::<LittleEndian>()
                    .map_err(|_| Error::cache_format("truncated integer entry"))?,
            ),
            EntityKind::Float => EntityValue::Float(
                rdr.read_f64::<LittleEndian>()
                    .map_err(|_| Error::cache_format("truncated float entry"))?,
            ),
            EntityKind::Text => {
                let len = rdr
                    .read_u32::<LittleEndian>()
                    .map_err(|_| Error::cache_format("truncated text entry"))?;
                let mut buf = vec![0u8; len as usize];
                rdr.read_exact(&mut buf)
                    .map_err(|_| Error::cache_format("truncated text payload"))?;
                let text = String::from_utf8(buf)
                    .map_err(|_| Error::cache_format("text entry is not utf-8"))?;
                EntityValue::Text(text)
            },
        };
        entities.push(Entity::new(id, value));
    }

    Ok(SortBag {
        column,
        ascending,
        kind,
        entities,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Entity, EntityValue};

    fn sample_bag() -> SortBag {
        SortBag {
            column: 3,
            ascending: true,
            kind: EntityKind::Integer,
            entities: vec![
                Entity::new(1, EntityValue::Integer(-1)),
                Entity::new(4, EntityValue::Integer(5)),
                Entity::new(2, EntityValue::Integer(10)),
                Entity::new(3, EntityValue::Integer(10)),
                Entity::new(0, EntityValue::Integer(30)),
            ],
        }
    }

    #[test]
    fn fs_store_round_trips() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let cache = FsSortCache::new(dir.path());
        let key = CacheKey::new("res1_", 3);
        let bag = sample_bag();

        cache.store(&key, &bag)?;
        let reloaded = cache.load(&key)?.expect("entry should exist");
        assert_eq!(reloaded, bag);
        Ok(())
    }

    #[test]
    fn missing_file_is_clean_miss() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let cache = FsSortCache::new(dir.path());
        assert!(cache.load(&CacheKey::new("absent_", 0))?.is_none());
        Ok(())
    }

    #[test]
    fn corrupt_container_is_rejected() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let cache = FsSortCache::new(dir.path());
        let key = CacheKey::new("res1_", 3);
        std::fs::write(dir.path().join(key.file_name()), b"not a container")?;

        match cache.load(&key) {
            Err(Error::CacheFormat(_)) => Ok(()),
            other => panic!("expected CacheFormat, got {other:?}"),
        }
    }

    #[test]
    fn truncated_container_is_rejected() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let cache = FsSortCache::new(dir.path());
        let key = CacheKey::new("res1_", 3);
        cache.store(&key, &sample_bag())?;

        let path = dir.path().join(key.file_name());
        let bytes = std::fs::read(&path)?;
        std::fs::write(&path, &bytes[..bytes.len() - 4])?;

        assert!(matches!(cache.load(&key), Err(Error::CacheFormat(_))));
        Ok(())
    }

    #[test]
    fn version_mismatch_is_rejected() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let cache = FsSortCache::new(dir.path());
        let key = CacheKey::new("res1_", 3);
        cache.store(&key, &sample_bag())?;

        let path = dir.path().join(key.file_name());
        let mut bytes = std::fs::read(&path)?;
        // Version field sits right after the 4-byte magic.
        bytes[4] = 0xFF;
        std::fs::write(&path, &bytes)?;

        assert!(matches!(cache.load(&key), Err(Error::CacheFormat(_))));
        Ok(())
    }

    #[test]
    fn wrong_column_is_rejected() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let cache = FsSortCache::new(dir.path());
        cache.store(&CacheKey::new("res1_", 3), &sample_bag())?;

        // Same bytes presented under a different column id must not load.
        std::fs::rename(
            dir.path().join("res1_3_a.lst"),
            dir.path().join("res1_7_a.lst"),
        )?;
        assert!(matches!(
            cache.load(&CacheKey::new("res1_", 7)),
            Err(Error::CacheFormat(_))
        ));
        Ok(())
    }

    #[test]
    fn text_bag_round_trips() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let cache = FsSortCache::new(dir.path());
        let key = CacheKey::new("res2_", 0);
        let bag = SortBag {
            column: 0,
            ascending: true,
            kind: EntityKind::Text,
            entities: vec![
                Entity::new(2, EntityValue::Text(String::new())),
                Entity::new(0, EntityValue::Text("NP_414542.1".into())),
                Entity::new(1, EntityValue::Text("YP_002791247.1".into())),
            ],
        };
        cache.store(&key, &bag)?;
        assert_eq!(cache.load(&key)?.as_ref(), Some(&bag));
        Ok(())
    }

    #[test]
    fn invalidate_prefix_removes_only_that_dataset() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let cache = FsSortCache::new(dir.path());
        cache.store(&CacheKey::new("res1_", 1), &sample_bag())?;
        cache.store(&CacheKey::new("res1_", 2), &sample_bag())?;
        cache.store(&CacheKey::new("res2_", 1), &sample_bag())?;

        assert_eq!(cache.invalidate_prefix("res1_")?, 2);
        assert!(cache.load(&CacheKey::new("res1_", 1))?.is_none());
        assert!(cache.load(&CacheKey::new("res2_", 1))?.is_some());
        Ok(())
    }

    #[test]
    fn memory_store_round_trips() -> anyhow::Result<()> {
        let cache = MemorySortCache::new();
        let key = CacheKey::new("res1_", 3);
        assert!(cache.load(&key)?.is_none());
        cache.store(&key, &sample_bag())?;
        assert_eq!(cache.load(&key)?, Some(sample_bag()));
        Ok(())
    }
}
