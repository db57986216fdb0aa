#![allow(dead_code)]

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use ds_upgrade::engine::KeyValue;
use ds_upgrade::engine::sqlite::Layout;
use ds_upgrade::store::{CONFIG_FILE, SPEC_FILE, VERSION_FILE};
use tempfile::TempDir;

pub const DEFAULT_SPEC: &str = r#"{
  "type": "mount",
  "mounts": [
    {
      "child": {"path": "blocks", "shardFunc": "/repo/flatfs/shard/v1/next-to-last/2", "sync": true, "type": "flatfs"},
      "mountpoint": "/blocks",
      "prefix": "flatfs.datastore",
      "type": "measure"
    },
    {
      "child": {"path": "badgerds", "syncWrites": true, "type": "badgerds"},
      "mountpoint": "/",
      "prefix": "badger.datastore",
      "type": "measure"
    }
  ]
}"#;

pub fn init_repo(version: &str, spec: &str) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(VERSION_FILE), version).unwrap();
    fs::write(dir.path().join(SPEC_FILE), spec).unwrap();
    fs::write(dir.path().join(CONFIG_FILE), r#"{"Datastore": {}}"#).unwrap();
    dir
}

pub fn sample_pairs(n: usize) -> Vec<KeyValue> {
    (0..n)
        .map(|i| KeyValue {
            key: format!("/blocks/CIQ{i:06}").into_bytes(),
            value: (0..(i % 64)).map(|b| (b * 7 + i) as u8).collect(),
        })
        .collect()
}

pub fn seed_store(dir: &Path, layout: Layout, pairs: &[KeyValue]) {
    let store = layout.create(dir).unwrap();
    for kv in pairs {
        store.put(&kv.key, &kv.value).unwrap();
    }
    store.close().unwrap();
}

pub fn read_store(dir: &Path, layout: Layout) -> Vec<KeyValue> {
    let mut store = layout.open(dir).unwrap();
    let entries = store.entries().unwrap();
    store.close().unwrap();
    entries
}

pub fn sorted(mut pairs: Vec<KeyValue>) -> Vec<KeyValue> {
    pairs.sort();
    pairs
}

/// Names of everything directly under `dir`.
pub fn listing(dir: &Path) -> BTreeSet<String> {
    fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
        .collect()
}

pub fn with_prefix(dir: &Path, prefix: &str) -> Vec<String> {
    listing(dir)
        .into_iter()
        .filter(|name| name.starts_with(prefix))
        .collect()
}
