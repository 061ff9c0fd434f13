#![no_main]

use libfuzzer_sys::fuzz_target;
use dotmeta::{ModuleDefinition, ReaderOptions};

fuzz_target!(|data: &[u8]| {
    let options = ReaderOptions::immediate();
    if let Ok(mut module) = ModuleDefinition::from_mem_with(data.to_vec(), options) {
        let _ = module.write();
    }
});
