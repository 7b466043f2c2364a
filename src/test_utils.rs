//! Helpers shared by unit and integration tests.
use std::{
    env,
    ffi::OsString,
    sync::{Mutex, MutexGuard, OnceLock},
};

/// Global lock for environment variable modifications in tests.
/// All tests that modify environment variables should acquire this lock
/// to prevent race conditions between parallel test executions.
pub static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

pub fn env_lock() -> MutexGuard<'static, ()> {
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Sets or clears an environment variable, restoring the previous value on drop.
pub struct EnvVarGuard {
    key: String,
    previous: Option<OsString>,
    _lock: MutexGuard<'static, ()>,
}

impl EnvVarGuard {
    pub fn set(key: &str, value: &str) -> Self {
        let lock = env_lock();
        let previous = env::var_os(key);
        unsafe {
            env::set_var(key, value);
        }
        Self {
            key: key.to_string(),
            previous,
            _lock: lock,
        }
    }

    pub fn unset(key: &str) -> Self {
        let lock = env_lock();
        let previous = env::var_os(key);
        unsafe {
            env::remove_var(key);
        }
        Self {
            key: key.to_string(),
            previous,
            _lock: lock,
        }
    }
}

impl Drop for EnvVarGuard {
    fn drop(&mut self) {
        match &self.previous {
            Some(value) => unsafe {
                env::set_var(&self.key, value);
            },
            None => unsafe {
                env::remove_var(&self.key);
            },
        }
    }
}
