/// Helper macro for locking a shared module
///
/// Poisoned locks surface as [`crate::Error::LockError`], so the macro is meant to be
/// followed by `?`.
///
/// ```rust, ignore
///  let mut module = lock!(module_rc)?;
///  module.name = "Other.dll".to_string();
/// ```
macro_rules! lock {
    ($lock:expr) => {
        $lock.lock().map_err(|_| crate::Error::LockError)
    };
}
