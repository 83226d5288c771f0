//! Background sweeper that closes idle [`super::FileSource`] descriptors once
//! their grace period has elapsed.

use std::{
    sync::{OnceLock, Weak},
    thread,
    time::{Duration, SystemTime},
};

use parking_lot::Mutex;

use super::file::FileSourceState;

const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

struct Reaper {
    entries: Mutex<Vec<Weak<FileSourceState>>>,
}

static REAPER: OnceLock<&'static Reaper> = OnceLock::new();

fn reaper() -> &'static Reaper {
    REAPER.get_or_init(|| {
        let reaper: &'static Reaper = Box::leak(Box::new(Reaper {
            entries: Mutex::new(Vec::new()),
        }));
        thread::Builder::new()
            .name("vfs-zip-reaper".into())
            .spawn(move || loop {
                thread::sleep(SWEEP_INTERVAL);
                reaper.sweep();
            })
            .expect("failed to spawn reaper thread");
        reaper
    })
}

/// Register a `FileSourceState` with the reaper so its descriptor is swept
/// once idle. Registration is a no-op if the reaper hasn't swept it by the
/// time it's dropped; the weak reference just goes stale and is pruned.
pub(super) fn register(state: Weak<FileSourceState>) {
    reaper().entries.lock().push(state);
}

impl Reaper {
    fn sweep(&self) {
        let now = SystemTime::now();
        let mut entries = self.entries.lock();
        entries.retain(|weak| {
            let Some(state) = weak.upgrade() else {
                return false;
            };
            state.sweep_if_idle(now);
            true
        });
    }
}
