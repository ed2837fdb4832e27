//! Process-wide allocator override (§5, §9 "ambient global state").
//!
//! Mirrors the fake-clock hook in [`crate::types::Time`]: a single
//! `once_cell`-backed global, installable once, reset only once no
//! `File` is alive. Real allocation still goes through the global Rust
//! allocator; what is overridden here is the *hook* a caller can use to
//! track or redirect allocation accounting around `load`/`save` calls
//! (the original library's custom allocator slot), not `#[global_allocator]`
//! itself -- swapping the process allocator after the binary has already
//! started allocating is not something a library can safely do.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use once_cell::sync::Lazy;

use crate::error::{HeifError, Result};

/// Called on every allocation/deallocation event the crate reports
/// through [`track_alloc`]/[`track_dealloc`], in bytes.
pub trait AllocatorHook: Send + Sync {
    fn on_alloc(&self, bytes: usize);
    fn on_dealloc(&self, bytes: usize);
}

struct DefaultHook;

impl AllocatorHook for DefaultHook {
    fn on_alloc(&self, _bytes: usize) {}
    fn on_dealloc(&self, _bytes: usize) {}
}

static HOOK: Lazy<Mutex<Option<Box<dyn AllocatorHook>>>> = Lazy::new(|| Mutex::new(None));
static LIVE_FILES: AtomicUsize = AtomicUsize::new(0);

/// Installs a process-wide allocator hook. Returns
/// [`HeifError::AllocatorAlreadySet`] if one is already installed;
/// callers must [`reset_allocator`] first.
pub fn set_allocator(hook: Box<dyn AllocatorHook>) -> Result<()> {
    let mut slot = HOOK.lock().unwrap();
    if slot.is_some() {
        return Err(HeifError::AllocatorAlreadySet);
    }
    *slot = Some(hook);
    Ok(())
}

/// Restores the default no-op hook. Only permitted while no [`crate::File`]
/// instances are live (tracked via [`register_file`]/[`unregister_file`]),
/// since an in-flight load/save may still be reporting through the old hook.
pub fn reset_allocator() -> Result<()> {
    if LIVE_FILES.load(Ordering::SeqCst) != 0 {
        return Err(HeifError::InvalidFunctionParameter(
            "cannot reset the allocator while a File instance is live".into(),
        ));
    }
    *HOOK.lock().unwrap() = None;
    Ok(())
}

pub(crate) fn track_alloc(bytes: usize) {
    if let Some(hook) = HOOK.lock().unwrap().as_deref() {
        hook.on_alloc(bytes);
    }
}

pub(crate) fn track_dealloc(bytes: usize) {
    if let Some(hook) = HOOK.lock().unwrap().as_deref() {
        hook.on_dealloc(bytes);
    }
}

pub(crate) fn register_file() {
    LIVE_FILES.fetch_add(1, Ordering::SeqCst);
}

pub(crate) fn unregister_file() {
    LIVE_FILES.fetch_sub(1, Ordering::SeqCst);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize as StdAtomicUsize;
    use std::sync::Arc;

    struct CountingHook(Arc<StdAtomicUsize>);

    impl AllocatorHook for CountingHook {
        fn on_alloc(&self, bytes: usize) {
            self.0.fetch_add(bytes, Ordering::SeqCst);
        }
        fn on_dealloc(&self, _bytes: usize) {}
    }

    #[test]
    fn second_install_is_rejected() {
        let _ = reset_allocator();
        let counter = Arc::new(StdAtomicUsize::new(0));
        set_allocator(Box::new(CountingHook(counter.clone()))).unwrap();
        let err = set_allocator(Box::new(CountingHook(counter))).unwrap_err();
        assert!(matches!(err, HeifError::AllocatorAlreadySet));
        reset_allocator().unwrap();
    }

    #[test]
    fn reset_is_blocked_while_a_file_is_live() {
        let _ = reset_allocator();
        register_file();
        let err = reset_allocator().unwrap_err();
        assert!(matches!(err, HeifError::InvalidFunctionParameter(_)));
        unregister_file();
        reset_allocator().unwrap();
    }
}
