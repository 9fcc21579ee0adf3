#![no_main]

use libfuzzer_sys::fuzz_target;
use iceflow::config::ConfigLoader;

fuzz_target!(|data: &[u8]| {
    let loader = ConfigLoader::with_defaults();

    // Any input must produce a config or an error, never a panic.
    let Ok(loaded) = loader.load_from_reader(data) else {
        return;
    };

    // A loaded config must survive its own rendering.
    let text = loaded.config.to_yaml().expect("loaded config renders");
    let again = loader.load_from_str(&text).expect("rendered config reloads");
    assert_eq!(*again.config, *loaded.config);
});
