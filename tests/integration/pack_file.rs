//! End-to-end pack reading over real files.
//!
//! Each test writes a pack and its companion index to a temp directory,
//! opens them through the memory-mapped path, and drives lookups and
//! loads through the public API.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::write::ZlibEncoder;
use flate2::Compression;
use tempfile::TempDir;

use packfile_rs::{
    BaseResolver, CorruptIndexKind, FormatError, ObjectId, ObjectKind, PackError, PackFile,
    ResolvedBase,
};

/// Builds pack bytes: preamble, appended entries, 20-byte trailer.
struct PackBuilder {
    body: Vec<u8>,
    object_count: u32,
}

impl PackBuilder {
    fn new() -> Self {
        Self {
            body: Vec::new(),
            object_count: 0,
        }
    }

    fn next_offset(&self) -> u64 {
        12 + self.body.len() as u64
    }

    fn add_whole(&mut self, kind: ObjectKind, content: &[u8]) -> u64 {
        let type_code = match kind {
            ObjectKind::Commit => 1,
            ObjectKind::Tree => 2,
            ObjectKind::Blob => 3,
            ObjectKind::Tag => 4,
        };
        let offset = self.next_offset();
        self.push_entry_header(type_code, content.len() as u64);
        let compressed = deflate(content);
        self.body.extend_from_slice(&compressed);
        self.object_count += 1;
        offset
    }

    fn add_ofs_delta(&mut self, base_offset: u64, base: &[u8], target: &[u8]) -> u64 {
        let offset = self.next_offset();
        let patch = insert_only_patch(base, target);
        self.push_entry_header(6, patch.len() as u64);
        self.body
            .extend_from_slice(&encode_back_offset(offset - base_offset));
        self.body.extend_from_slice(&deflate(&patch));
        self.object_count += 1;
        offset
    }

    fn add_ref_delta(&mut self, base_id: ObjectId, base: &[u8], target: &[u8]) -> u64 {
        let offset = self.next_offset();
        let patch = insert_only_patch(base, target);
        self.push_entry_header(7, patch.len() as u64);
        self.body.extend_from_slice(base_id.as_bytes());
        self.body.extend_from_slice(&deflate(&patch));
        self.object_count += 1;
        offset
    }

    fn push_entry_header(&mut self, type_code: u8, mut size: u64) {
        let mut first = (type_code << 4) | (size & 0x0f) as u8;
        size >>= 4;
        if size > 0 {
            first |= 0x80;
        }
        self.body.push(first);
        while size > 0 {
            let mut byte = (size & 0x7f) as u8;
            size >>= 7;
            if size > 0 {
                byte |= 0x80;
            }
            self.body.push(byte);
        }
    }

    fn build(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(12 + self.body.len() + 20);
        out.extend_from_slice(b"PACK");
        out.extend_from_slice(&2u32.to_be_bytes());
        out.extend_from_slice(&self.object_count.to_be_bytes());
        out.extend_from_slice(&self.body);
        out.extend_from_slice(&[0u8; 20]);
        out
    }
}

/// Builds fan-out index bytes from (id, offset) pairs.
struct IdxBuilder {
    objects: Vec<(ObjectId, u32)>,
}

impl IdxBuilder {
    fn new() -> Self {
        Self {
            objects: Vec::new(),
        }
    }

    fn add_object(&mut self, id: ObjectId, offset: u64) -> &mut Self {
        self.objects
            .push((id, u32::try_from(offset).expect("offset fits u32")));
        self
    }

    fn build(&self) -> Vec<u8> {
        let mut objects = self.objects.clone();
        objects.sort_by(|a, b| a.0.cmp(&b.0));

        let mut counts = [0u32; 256];
        for (id, _) in &objects {
            counts[id.first_byte() as usize] += 1;
        }

        let mut out = Vec::new();
        let mut running = 0u32;
        for count in counts {
            running += count;
            out.extend_from_slice(&running.to_be_bytes());
        }
        for (id, offset) in &objects {
            out.extend_from_slice(&offset.to_be_bytes());
            out.extend_from_slice(id.as_bytes());
        }
        out.extend_from_slice(&[0u8; 40]);
        out
    }
}

fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn encode_back_offset(mut value: u64) -> Vec<u8> {
    let mut bytes = vec![(value & 0x7f) as u8];
    value >>= 7;
    while value > 0 {
        value -= 1;
        bytes.push(0x80 | (value & 0x7f) as u8);
        value >>= 7;
    }
    bytes.reverse();
    bytes
}

/// A patch that rewrites `base` into `target` with insert commands.
fn insert_only_patch(base: &[u8], target: &[u8]) -> Vec<u8> {
    let mut patch = patch_varint(base.len() as u64);
    patch.extend_from_slice(&patch_varint(target.len() as u64));
    for chunk in target.chunks(0x7f) {
        patch.push(chunk.len() as u8);
        patch.extend_from_slice(chunk);
    }
    patch
}

fn patch_varint(mut value: u64) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            break;
        }
    }
    out
}

fn id(first: u8, rest: u8) -> ObjectId {
    let mut bytes = [rest; 20];
    bytes[0] = first;
    ObjectId::from_bytes(bytes)
}

/// Writes pack and index bytes as `<stem>.pack` / `<stem>.idx`.
fn write_pair(dir: &Path, stem: &str, pack: &[u8], idx: &[u8]) -> PathBuf {
    let pack_path = dir.join(format!("{stem}.pack"));
    fs::write(&pack_path, pack).unwrap();
    fs::write(dir.join(format!("{stem}.idx")), idx).unwrap();
    pack_path
}

/// Resolver stub serving one known base.
struct OneBase {
    base_id: ObjectId,
    bytes: Vec<u8>,
}

impl BaseResolver for OneBase {
    fn resolve_base(&mut self, id: &ObjectId) -> Result<Option<ResolvedBase>, PackError> {
        if *id == self.base_id {
            Ok(Some(ResolvedBase {
                kind: ObjectKind::Blob,
                bytes: self.bytes.clone(),
            }))
        } else {
            Ok(None)
        }
    }
}

#[test]
fn whole_objects_round_trip_through_mmap() {
    let dir = TempDir::new().unwrap();

    let mut pack = PackBuilder::new();
    let mut idx = IdxBuilder::new();
    let commit = id(0x01, 0x11);
    let tree = id(0x80, 0x22);
    let blob = id(0xff, 0x33);
    idx.add_object(commit, pack.add_whole(ObjectKind::Commit, b"commit payload"));
    idx.add_object(tree, pack.add_whole(ObjectKind::Tree, b"tree payload"));
    idx.add_object(blob, pack.add_whole(ObjectKind::Blob, b"blob payload"));

    let pack_path = write_pair(dir.path(), "pack-whole", &pack.build(), &idx.build());
    let file = PackFile::open(&pack_path).unwrap();

    assert_eq!(file.object_count(), 3);
    for (oid, kind, payload) in [
        (commit, ObjectKind::Commit, &b"commit payload"[..]),
        (tree, ObjectKind::Tree, b"tree payload"),
        (blob, ObjectKind::Blob, b"blob payload"),
    ] {
        assert!(file.has_object(&oid));
        let loader = file.get(&oid).unwrap().expect("indexed");
        assert_eq!(loader.object_kind(), Some(kind));
        assert_eq!(loader.declared_size(), payload.len() as u64);

        let object = loader
            .read(&mut packfile_rs::NoExternalBases)
            .unwrap();
        assert_eq!(object.kind, kind);
        assert_eq!(object.bytes, payload);
    }

    assert!(!file.has_object(&id(0x42, 0x99)));
    file.close();
}

#[test]
fn delta_chains_resolve_through_mmap() {
    let dir = TempDir::new().unwrap();

    let mut pack = PackBuilder::new();
    let mut idx = IdxBuilder::new();

    let base = id(0x05, 0x01);
    let middle = id(0x06, 0x02);
    let tip = id(0x07, 0x03);
    let external_tip = id(0x08, 0x04);
    let external_base = id(0xee, 0x05);

    let base_off = pack.add_whole(ObjectKind::Blob, b"layer zero");
    let middle_off = pack.add_ofs_delta(base_off, b"layer zero", b"layer one");
    let tip_off = pack.add_ofs_delta(middle_off, b"layer one", b"layer two");
    let external_off = pack.add_ref_delta(external_base, b"outside base", b"patched from outside");

    idx.add_object(base, base_off)
        .add_object(middle, middle_off)
        .add_object(tip, tip_off)
        .add_object(external_tip, external_off);

    let pack_path = write_pair(dir.path(), "pack-delta", &pack.build(), &idx.build());
    let file = PackFile::open(&pack_path).unwrap();

    let loader = file.get(&tip).unwrap().expect("tip indexed");
    assert_eq!(loader.object_kind(), None);
    let object = loader.read(&mut packfile_rs::NoExternalBases).unwrap();
    assert_eq!(object.kind, ObjectKind::Blob);
    assert_eq!(object.bytes, b"layer two");

    let loader = file.get(&external_tip).unwrap().expect("external indexed");
    let err = loader.read(&mut packfile_rs::NoExternalBases).unwrap_err();
    assert!(matches!(
        err,
        PackError::UnresolvableBase { id } if id == external_base
    ));

    let mut resolver = OneBase {
        base_id: external_base,
        bytes: b"outside base".to_vec(),
    };
    let object = loader.read(&mut resolver).unwrap();
    assert_eq!(object.bytes, b"patched from outside");

    // The failed ref-delta read above did not poison the handle.
    let object = file
        .get(&base)
        .unwrap()
        .expect("base indexed")
        .read(&mut packfile_rs::NoExternalBases)
        .unwrap();
    assert_eq!(object.bytes, b"layer zero");
}

#[test]
fn open_rejects_non_pack_files() {
    let dir = TempDir::new().unwrap();
    let idx = IdxBuilder::new().build();
    let pack_path = write_pair(dir.path(), "pack-junk", b"this is not a pack", &idx);

    let err = PackFile::open(&pack_path).unwrap_err();
    assert!(matches!(err, PackError::Format(FormatError::NotAPack)));
}

#[test]
fn open_rejects_truncated_index_naming_the_file() {
    let dir = TempDir::new().unwrap();

    let mut pack = PackBuilder::new();
    let blob = id(0x09, 0x10);
    let mut idx = IdxBuilder::new();
    idx.add_object(blob, pack.add_whole(ObjectKind::Blob, b"payload"));

    let mut idx_bytes = idx.build();
    idx_bytes.truncate(idx_bytes.len() - 7);
    let pack_path = write_pair(dir.path(), "pack-shorty", &pack.build(), &idx_bytes);

    let err = PackFile::open(&pack_path).unwrap_err();
    match err {
        PackError::CorruptIndex(err) => {
            assert!(err.name.contains("pack-shorty.idx"), "got name {}", err.name);
            assert!(matches!(err.kind, CorruptIndexKind::LengthMismatch { .. }));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn open_requires_the_companion_index() {
    let dir = TempDir::new().unwrap();
    let pack_path = dir.path().join("pack-alone.pack");
    fs::write(&pack_path, PackBuilder::new().build()).unwrap();

    let err = PackFile::open(&pack_path).unwrap_err();
    assert!(matches!(err, PackError::Source(_)));
}
