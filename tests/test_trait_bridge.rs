use lnbind::bridge::{
    self, ConfirmationTarget, FeeEstimator, IoError, KvStore, Level, Logger, NativeFeeEstimator,
    NativeKvStore, NativeLogger, Record,
};
use lnbind::ffi::lnbind_registry_len;
use lnbind::TraitObject;
use parking_lot::Mutex;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

/// Stores each key as a file under `root/namespace/`
struct FileStore {
    root: PathBuf,
}

impl FileStore {
    fn path(&self, namespace: &str, key: &str) -> PathBuf {
        self.root.join(namespace).join(key)
    }
}

impl KvStore for FileStore {
    fn read(&self, namespace: &str, key: &str) -> Result<Vec<u8>, IoError> {
        fs::read(self.path(namespace, key)).map_err(|err: io::Error| err.kind().into())
    }

    fn write(&self, namespace: &str, key: &str, value: &[u8]) -> Result<(), IoError> {
        let path = self.path(namespace, key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| IoError::from(err.kind()))?;
        }
        fs::write(path, value).map_err(|err| err.kind().into())
    }
}

struct MempoolFees;

impl FeeEstimator for MempoolFees {
    fn get_est_sat_per_1000_weight(&self, target: ConfirmationTarget) -> u32 {
        match target {
            ConfirmationTarget::Background => 253,
            ConfirmationTarget::Normal => 1_000,
            ConfirmationTarget::HighPriority => 5_000,
        }
    }
}

/// Keeps records at or above a minimum level
struct FilteringLogger {
    min_level: Level,
    kept: Mutex<Vec<(Level, String)>>,
}

impl Logger for FilteringLogger {
    fn log(&self, record: &Record<'_>) {
        if record.level >= self.min_level {
            self.kept.lock().push((record.level, record.args.to_string()));
        }
    }
}

#[test]
fn test_init_and_registry_visibility() {
    assert!(lnbind::init(None).is_ok());

    let object: TraitObject<dyn FeeEstimator> = TraitObject::new(Arc::new(MempoolFees));
    let native = unsafe { NativeFeeEstimator::from_vtable(object.to_native()) };
    assert!(lnbind_registry_len() >= 1);
    assert!(bridge::global().contains(object.id().as_raw()));

    assert_eq!(native.get_est_sat_per_1000_weight(ConfirmationTarget::HighPriority), 5_000);
    drop(native);
    assert!(!bridge::global().contains(object.id().as_raw()));
}

#[test]
fn test_file_backed_store_through_c() {
    let dir = TempDir::new().unwrap();
    let object: TraitObject<dyn KvStore> = TraitObject::new(Arc::new(FileStore {
        root: dir.path().to_path_buf(),
    }));
    let store = unsafe { NativeKvStore::from_vtable(object.to_native()) };

    assert_eq!(store.read("monitors", "deadbeef"), Err(IoError::NotFound));

    let monitor: Vec<u8> = (0..=255).collect();
    store.write("monitors", "deadbeef", &monitor).unwrap();
    assert_eq!(store.read("monitors", "deadbeef").unwrap(), monitor);
    assert!(dir.path().join("monitors").join("deadbeef").exists());
}

#[test]
fn test_logger_receives_native_records() {
    let logger = Arc::new(FilteringLogger {
        min_level: Level::Info,
        kept: Mutex::new(Vec::new()),
    });
    let object: TraitObject<dyn Logger> = TraitObject::new(logger.clone());
    let native = unsafe { NativeLogger::from_vtable(object.to_native()) };

    for (level, text) in [
        (Level::Gossip, "gossip noise"),
        (Level::Info, "channel opened"),
        (Level::Error, "peer misbehaved"),
    ] {
        native.log(&Record {
            level,
            args: text,
            module_path: "lightning",
            file: "lib.rs",
            line: 1,
        });
    }

    assert_eq!(
        logger.kept.lock().clone(),
        vec![
            (Level::Info, "channel opened".to_string()),
            (Level::Error, "peer misbehaved".to_string()),
        ]
    );
}

#[test]
fn test_concurrent_callbacks() {
    let object: TraitObject<dyn FeeEstimator> = TraitObject::new(Arc::new(MempoolFees));
    let native = Arc::new(unsafe { NativeFeeEstimator::from_vtable(object.to_native()) });

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let native = Arc::clone(&native);
            thread::spawn(move || {
                (0..1_000)
                    .map(|_| native.get_est_sat_per_1000_weight(ConfirmationTarget::Normal))
                    .all(|fee| fee == 1_000)
            })
        })
        .collect();

    for worker in workers {
        assert!(worker.join().unwrap());
    }
}

#[test]
fn test_key_exposed_without_activation_still_resolves() {
    let object: TraitObject<dyn FeeEstimator> = TraitObject::new(Arc::new(MempoolFees));
    let key = object.opaque_key();

    // Nobody counted a holder; the default policy logs and carries on
    assert_eq!(bridge::global().reference_count(object.id().as_raw()), 0);
    let resolved = bridge::global()
        .resolve::<dyn FeeEstimator>(key)
        .unwrap();
    assert_eq!(resolved.get_est_sat_per_1000_weight(ConfirmationTarget::Background), 253);
}
