/// JSON-pointer prefixes read by [`crate::LexConfig`].
///
/// Keep in step with `settings.rs`: a section listed here but never
/// deserialized hides typos from `report_unused_keys`.
pub fn consumed_pointers() -> &'static [&'static str] {
    CONSUMED
}

static CONSUMED: &[&str] = &[
    "/archive",
    "/mirror",
    "/storage",
    "/schedule",
    "/paging",
    "/news",
    "/daemon",
];
