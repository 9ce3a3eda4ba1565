#![allow(clippy::unwrap_used, dead_code)]

// Shared fixtures for the pbxctl-core integration tests.

use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;
use pbxctl_core::{
    CoreError, CreateExtensionRequest, CreateTrunkRequest, MemoryFs, MemoryStore, ModuleReloader,
    Pbx, RecordStore, SyncOrchestrator,
};

/// Remembers every module it was asked to reload.
#[derive(Default)]
pub struct RecordingReloader {
    modules: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingReloader {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Reloads requested so far, oldest first. Clears the log.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.modules.lock().unwrap())
    }
}

impl ModuleReloader for RecordingReloader {
    fn reload<'a>(&'a self, module: &'a str) -> BoxFuture<'a, Result<(), CoreError>> {
        Box::pin(async move {
            self.modules.lock().unwrap().push(module.to_owned());
            if self.fail {
                return Err(CoreError::NotConnected);
            }
            Ok(())
        })
    }
}

pub struct Fixture {
    pub pbx: Pbx,
    pub fs: Arc<MemoryFs>,
    pub reloader: Arc<RecordingReloader>,
    pub store: Arc<dyn RecordStore>,
}

pub fn fixture_with(fs: MemoryFs, reloader: RecordingReloader) -> Fixture {
    let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new());
    let fs = Arc::new(fs);
    let reloader = Arc::new(reloader);
    let sync =
        SyncOrchestrator::new(Arc::clone(&store), fs.clone()).with_reloader(reloader.clone());
    Fixture {
        pbx: Pbx::from_parts(Arc::clone(&store), sync, None),
        fs,
        reloader,
        store,
    }
}

pub fn fixture() -> Fixture {
    fixture_with(MemoryFs::new(), RecordingReloader::default())
}

pub fn extension(number: &str) -> CreateExtensionRequest {
    CreateExtensionRequest {
        extension: number.into(),
        name: format!("User {number}"),
        secret: format!("pw{number}"),
        ..Default::default()
    }
}

pub fn trunk(name: &str) -> CreateTrunkRequest {
    CreateTrunkRequest {
        name: name.into(),
        host: "sip.provider.example".into(),
        username: Some("acct".into()),
        secret: Some("trunkpw".into()),
        ..Default::default()
    }
}
