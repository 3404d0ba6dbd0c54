//! Namespaces and fixed tokens of the package document.

pub const METS_PREFIX: &str = "mets";
pub const METS_NS: &str = "http://www.loc.gov/METS/";
pub const XLINK_PREFIX: &str = "xlink";
pub const XLINK_NS: &str = "http://www.w3.org/1999/xlink";
pub const DC_PREFIX: &str = "dc";
pub const DC_NS: &str = "http://purl.org/dc/elements/1.1/";
pub const DNX_PREFIX: &str = "dnx";
pub const DNX_NS: &str = "http://www.exlibrisgroup.com/dps/dnx";

/// Column prefix of descriptive fields rendered into the `dc` namespace.
pub const DC_FIELD_PREFIX: &str = "dc_";

pub const DEFAULT_MIMETYPE: &str = "application/octet-stream";
pub const DEFAULT_CHECKSUM_TYPE: &str = "MD5";
pub const DEFAULT_LOCTYPE: &str = "URL";
pub const DEFAULT_AGENT_NAME: &str = "metsynth";

/// `xmlns:*` declarations carried by the root element.
pub fn declarations() -> [(String, &'static str); 4] {
    [
        (format!("xmlns:{METS_PREFIX}"), METS_NS),
        (format!("xmlns:{XLINK_PREFIX}"), XLINK_NS),
        (format!("xmlns:{DC_PREFIX}"), DC_NS),
        (format!("xmlns:{DNX_PREFIX}"), DNX_NS),
    ]
}

/// `prefix:local`
pub fn qualified(prefix: &str, local: &str) -> String {
    format!("{prefix}:{local}")
}

pub fn mets(local: &str) -> String {
    qualified(METS_PREFIX, local)
}
