const fn version_or_cargo(opt: Option<&'static str>) -> &'static str {
    match opt {
        Some(val) => val,
        None => env!("CARGO_PKG_VERSION"),
    }
}

/// Build version, overridable at compile time through `ALIVECHECKS_VERSION`.
pub const VERSION: &str = version_or_cargo(option_env!("ALIVECHECKS_VERSION"));

pub fn user_agent() -> String {
    format!("alivechecks/{VERSION}")
}
