#![no_main]

use libfuzzer_sys::fuzz_target;
use dotmeta::metadata::signatures::{
    parse_field_signature, parse_local_var_signature, parse_method_signature,
    parse_method_spec_signature, parse_property_signature, parse_type_spec_signature, RowTokens,
};

fuzz_target!(|data: &[u8]| {
    let _ = parse_method_signature(data, &mut RowTokens);
    let _ = parse_field_signature(data, &mut RowTokens);
    let _ = parse_property_signature(data, &mut RowTokens);
    let _ = parse_local_var_signature(data, &mut RowTokens);
    let _ = parse_type_spec_signature(data, &mut RowTokens);
    let _ = parse_method_spec_signature(data, &mut RowTokens);
});
