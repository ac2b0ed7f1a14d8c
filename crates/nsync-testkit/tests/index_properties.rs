//! The file index agrees with a map model across reopen.

use std::collections::BTreeMap;

use nsync_core::{DataRecord, FolderId};
use nsync_store::{FileIndex, Index};
use nsync_testkit::generators::{index_ops, IndexOp};
use proptest::prelude::*;
use tempfile::TempDir;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

async fn contents(index: &FileIndex) -> BTreeMap<String, DataRecord> {
    let mut out = BTreeMap::new();
    for path in index.paths().await.unwrap() {
        let record = index.get(&path).await.unwrap().unwrap();
        out.insert(path, record);
    }
    out
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn index_matches_model_after_reopen(ops in index_ops(24)) {
        let dir = TempDir::new().unwrap();
        let folder = FolderId::new("prop");
        let rt = runtime();

        let mut model = BTreeMap::new();
        rt.block_on(async {
            let index = FileIndex::open(dir.path(), &folder).unwrap();
            for op in &ops {
                match op {
                    IndexOp::Set(path, record) => {
                        index.set(path, *record).await.unwrap();
                        model.insert(path.clone(), *record);
                    }
                    IndexOp::Remove(path) => {
                        let removed = index.remove(path).await.unwrap();
                        assert_eq!(removed, model.remove(path).is_some());
                    }
                }
            }
            assert_eq!(contents(&index).await, model);
        });

        let reopened = rt.block_on(async {
            let index = FileIndex::open(dir.path(), &folder).unwrap();
            assert_eq!(index.len().await.unwrap(), model.len());
            contents(&index).await
        });
        prop_assert_eq!(reopened, model);
    }
}
