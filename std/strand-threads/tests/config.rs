///
/// # Installed Config
///
/// `strand_core::config::install` is process-wide and first-call-wins, so
/// this file holds a single test and runs in its own process.
///

use strand_threads::{FastMutex, SyncConfig, Thread, WAIT_INFINITE};

#[test]
fn test_installed_config_drives_primitives() {
    let config = SyncConfig::from_toml_str(
        "default_stack_size = 131072\nspin_sleep_ms = 1\nmax_name_len = 8\n",
    )
    .unwrap();
    assert!(strand_core::config::install(config));
    assert!(!strand_core::config::install(SyncConfig::default()));
    assert_eq!(strand_core::config::get().max_name_len, 8);

    let thread = Thread::from_fn(|| 3);
    thread.set_name("background-loader");
    assert_eq!(thread.name(), "backgrou");

    // Stack size 0 picks up the configured default.
    thread.start(0).unwrap();
    assert!(thread.join(WAIT_INFINITE));
    assert_eq!(thread.result(), Some(3));

    let m = FastMutex::new();
    m.lock();
    m.unlock();
}
