//! `Registry.pol` (PReg version 1) policy store.
//!
//! Layout: the `PReg` signature, a little-endian version dword, then
//! records of the form `[key;value;type;size;data]`. Brackets, semicolons
//! and the two names are UTF-16LE (names null terminated); type and size
//! are raw little-endian dwords.

use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};

use super::{MemoryPolicySource, PolicySource, RegistryData, RegistryValueKind};
use crate::error::{StoreError, StoreResult};

const SIGNATURE: &[u8; 4] = b"PReg";
const VERSION: u32 = 1;

/// A `Registry.pol` file loaded into memory and written back on `save`.
#[derive(Debug, Clone)]
pub struct PolFile {
    path: PathBuf,
    data: MemoryPolicySource,
}

impl PolFile {
    /// Open `path`; a missing file is an empty policy set.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let data = match fs::read(&path) {
            Ok(bytes) => decode(&bytes).map_err(|detail| StoreError::Corrupt {
                path: path.clone(),
                detail,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("{} does not exist yet; starting empty", path.display());
                MemoryPolicySource::new()
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        Ok(Self { path, data })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contents(&self) -> &MemoryPolicySource {
        &self.data
    }
}

impl PolicySource for PolFile {
    fn key_exists(&self, key: &str) -> StoreResult<bool> {
        self.data.key_exists(key)
    }

    fn create_key(&mut self, key: &str) -> StoreResult<()> {
        self.data.create_key(key)
    }

    fn delete_key(&mut self, key: &str) -> StoreResult<()> {
        self.data.delete_key(key)
    }

    fn subkey_names(&self, key: &str) -> StoreResult<Vec<String>> {
        self.data.subkey_names(key)
    }

    fn value_names(&self, key: &str) -> StoreResult<Vec<String>> {
        self.data.value_names(key)
    }

    fn get_value(&self, key: &str, name: &str) -> StoreResult<Option<RegistryData>> {
        self.data.get_value(key, name)
    }

    fn set_value(&mut self, key: &str, name: &str, data: RegistryData) -> StoreResult<()> {
        self.data.set_value(key, name, data)
    }

    fn delete_value(&mut self, key: &str, name: &str) -> StoreResult<()> {
        self.data.delete_value(key, name)
    }

    fn save(&mut self) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&self.path, encode(&self.data)).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;
        info!("Saved {}", self.path.display());
        Ok(())
    }

    fn discard(&mut self) -> StoreResult<()> {
        *self = Self::open(self.path.clone())?;
        debug!("Reloaded {}", self.path.display());
        Ok(())
    }
}

// ─── Encoding ───────────────────────────────────────────────────────────

fn push_utf16(out: &mut Vec<u8>, s: &str) {
    for unit in s.encode_utf16() {
        out.extend_from_slice(&unit.to_le_bytes());
    }
}

fn push_char(out: &mut Vec<u8>, c: char) {
    out.extend_from_slice(&(c as u16).to_le_bytes());
}

fn sz_bytes(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity((s.len() + 1) * 2);
    push_utf16(&mut out, s);
    out.extend_from_slice(&[0, 0]);
    out
}

fn data_bytes(data: &RegistryData) -> Vec<u8> {
    match data {
        RegistryData::None => Vec::new(),
        RegistryData::String(s) | RegistryData::ExpandString(s) => sz_bytes(s),
        RegistryData::Binary(b) | RegistryData::Raw { bytes: b, .. } => b.clone(),
        RegistryData::DWord(v) => v.to_le_bytes().to_vec(),
        RegistryData::QWord(v) => v.to_le_bytes().to_vec(),
        RegistryData::MultiString(items) => {
            let mut out = Vec::new();
            for item in items {
                out.extend(sz_bytes(item));
            }
            out.extend_from_slice(&[0, 0]);
            out
        }
    }
}

fn push_record(out: &mut Vec<u8>, key: &str, name: &str, kind: u32, data: &[u8]) {
    push_char(out, '[');
    out.extend(sz_bytes(key));
    push_char(out, ';');
    out.extend(sz_bytes(name));
    push_char(out, ';');
    out.extend_from_slice(&kind.to_le_bytes());
    push_char(out, ';');
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    push_char(out, ';');
    out.extend_from_slice(data);
    push_char(out, ']');
}

/// Serialize a store. Keys without values become key-only records.
pub(crate) fn encode(source: &MemoryPolicySource) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(SIGNATURE);
    out.extend_from_slice(&VERSION.to_le_bytes());
    for (key, values) in source.entries() {
        if values.is_empty() {
            push_record(&mut out, key, "", RegistryValueKind::None.code(), &[]);
        }
        for (name, data) in values {
            push_record(&mut out, key, name, data.kind().code(), &data_bytes(data));
        }
    }
    out
}

// ─── Decoding ───────────────────────────────────────────────────────────

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], String> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&e| e <= self.bytes.len())
            .ok_or_else(|| format!("truncated record at offset {}", self.pos))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u16(&mut self) -> Result<u16, String> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, String> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn expect(&mut self, c: char) -> Result<(), String> {
        let at = self.pos;
        let unit = self.u16()?;
        if unit != c as u16 {
            return Err(format!("expected '{c}' at offset {at}"));
        }
        Ok(())
    }

    /// A null-terminated UTF-16LE string.
    fn sz(&mut self) -> Result<String, String> {
        let mut units = Vec::new();
        loop {
            match self.u16()? {
                0 => break,
                u => units.push(u),
            }
        }
        String::from_utf16(&units).map_err(|e| e.to_string())
    }
}

fn utf16_units(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect()
}

fn decode_sz(bytes: &[u8]) -> Result<String, String> {
    let units = utf16_units(bytes);
    let end = units.iter().position(|&u| u == 0).unwrap_or(units.len());
    String::from_utf16(&units[..end]).map_err(|e| e.to_string())
}

fn decode_data(kind: u32, bytes: &[u8]) -> Result<RegistryData, String> {
    Ok(match RegistryValueKind::from_code(kind) {
        RegistryValueKind::None => RegistryData::None,
        RegistryValueKind::String => RegistryData::String(decode_sz(bytes)?),
        RegistryValueKind::ExpandString => RegistryData::ExpandString(decode_sz(bytes)?),
        RegistryValueKind::Binary => RegistryData::Binary(bytes.to_vec()),
        RegistryValueKind::DWord => {
            let b: [u8; 4] = bytes
                .try_into()
                .map_err(|_| format!("REG_DWORD with {} bytes", bytes.len()))?;
            RegistryData::DWord(u32::from_le_bytes(b))
        }
        RegistryValueKind::QWord => {
            let b: [u8; 8] = bytes
                .try_into()
                .map_err(|_| format!("REG_QWORD with {} bytes", bytes.len()))?;
            RegistryData::QWord(u64::from_le_bytes(b))
        }
        RegistryValueKind::MultiString => {
            let units = utf16_units(bytes);
            let mut items = Vec::new();
            for chunk in units.split(|&u| u == 0) {
                if chunk.is_empty() {
                    break;
                }
                items.push(String::from_utf16(chunk).map_err(|e| e.to_string())?);
            }
            RegistryData::MultiString(items)
        }
        RegistryValueKind::Other(code) => RegistryData::Raw {
            code,
            bytes: bytes.to_vec(),
        },
    })
}

pub(crate) fn decode(bytes: &[u8]) -> Result<MemoryPolicySource, String> {
    let mut cursor = Cursor { bytes, pos: 0 };
    if cursor.take(4)? != SIGNATURE {
        return Err("missing PReg signature".into());
    }
    let version = cursor.u32()?;
    if version != VERSION {
        return Err(format!("unsupported version {version}"));
    }

    let mut source = MemoryPolicySource::new();
    while !cursor.at_end() {
        cursor.expect('[')?;
        let key = cursor.sz()?;
        cursor.expect(';')?;
        let name = cursor.sz()?;
        cursor.expect(';')?;
        let kind = cursor.u32()?;
        cursor.expect(';')?;
        let size = cursor.u32()? as usize;
        cursor.expect(';')?;
        let data = cursor.take(size)?;
        cursor.expect(']')?;

        source.create_key(&key).map_err(|e| e.to_string())?;
        // An unnamed REG_NONE record with no data only marks the key.
        let key_only = name.is_empty() && kind == RegistryValueKind::None.code() && size == 0;
        if !key_only {
            source
                .set_value(&key, &name, decode_data(kind, data)?)
                .map_err(|e| e.to_string())?;
        }
    }
    Ok(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> MemoryPolicySource {
        let mut src = MemoryPolicySource::new();
        let key = r"Software\Policies\Vendor";
        src.create_key(key).unwrap();
        src.set_value(key, "Timeout", RegistryData::DWord(42)).unwrap();
        src.set_value(key, "**del.Banner", RegistryData::String(" ".into())).unwrap();
        src.set_value(key, "Path", RegistryData::ExpandString("%TEMP%".into())).unwrap();
        src.set_value(key, "Big", RegistryData::QWord(1 << 40)).unwrap();
        let lines = RegistryData::MultiString(vec!["a".into(), "b c".into()]);
        src.set_value(key, "Lines", lines).unwrap();
        src.create_key(r"Software\Policies\Vendor\Empty").unwrap();
        src
    }

    #[test]
    fn file_starts_with_header() {
        let bytes = encode(&MemoryPolicySource::new());
        assert_eq!(bytes, b"PReg\x01\x00\x00\x00");
    }

    #[test]
    fn save_and_reopen_preserves_contents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Machine").join("Registry.pol");

        let mut pol = PolFile::open(&path).unwrap();
        assert!(pol.contents().is_empty());
        for (key, values) in sample().entries() {
            pol.create_key(key).unwrap();
            for (name, data) in values {
                pol.set_value(key, name, data.clone()).unwrap();
            }
        }
        pol.save().unwrap();

        let reopened = PolFile::open(&path).unwrap();
        let key = r"Software\Policies\Vendor";
        assert_eq!(
            reopened.value_names(key).unwrap(),
            vec!["Timeout", "**del.Banner", "Path", "Big", "Lines"]
        );
        assert_eq!(reopened.get_value(key, "timeout").unwrap(), Some(RegistryData::DWord(42)));
        assert_eq!(
            reopened.get_value(key, "**del.Banner").unwrap(),
            Some(RegistryData::String(" ".into()))
        );
        assert_eq!(
            reopened.get_value(key, "Path").unwrap(),
            Some(RegistryData::ExpandString("%TEMP%".into()))
        );
        assert_eq!(reopened.get_value(key, "Big").unwrap(), Some(RegistryData::QWord(1 << 40)));
        assert_eq!(
            reopened.get_value(key, "Lines").unwrap(),
            Some(RegistryData::MultiString(vec!["a".into(), "b c".into()]))
        );
        assert!(reopened.key_exists(r"Software\Policies\Vendor\Empty").unwrap());
    }

    #[test]
    fn default_values_survive_a_round_trip() {
        let key = r"Software\Policies\Vendor";
        let mut src = MemoryPolicySource::new();
        src.create_key(key).unwrap();
        src.set_value(key, "", RegistryData::String("default".into())).unwrap();
        src.set_value(key, "Timeout", RegistryData::DWord(1)).unwrap();

        let back = decode(&encode(&src)).unwrap();
        assert_eq!(back.value_names(key).unwrap(), vec!["", "Timeout"]);
        assert_eq!(
            back.get_value(key, "").unwrap(),
            Some(RegistryData::String("default".into()))
        );

        let mut bare = MemoryPolicySource::new();
        bare.create_key(key).unwrap();
        let back = decode(&encode(&bare)).unwrap();
        assert!(back.key_exists(key).unwrap());
        assert!(back.value_names(key).unwrap().is_empty());
    }

    #[test]
    fn rejects_bad_signature_and_truncation() {
        assert!(decode(b"NOPE\x01\x00\x00\x00").is_err());
        let mut bytes = encode(&sample());
        bytes.truncate(bytes.len() - 3);
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn corrupt_file_reports_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Registry.pol");
        fs::write(&path, b"garbage").unwrap();
        let err = PolFile::open(&path).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }
}
