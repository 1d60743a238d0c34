//! Small shared helpers.

mod text;

pub use text::{
    extract_json_object, first_balanced_object, slugify, strip_code_fences, FALLBACK_SLUG,
};
