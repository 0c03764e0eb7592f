//! Stamps the build date into `RAYSTUDIO_BUILD_STAMP` for `--version` and the UI.
//!
//! Set `RAYSTUDIO_BUILD_STAMP` in the environment for reproducible builds.

use time::format_description::FormatItem;
use time::macros::format_description;

const STAMP_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute] UTC");

fn main() {
    println!("cargo:rerun-if-env-changed=RAYSTUDIO_BUILD_STAMP");

    let stamp = std::env::var("RAYSTUDIO_BUILD_STAMP").unwrap_or_else(|_| {
        time::OffsetDateTime::now_utc()
            .format(STAMP_FORMAT)
            .unwrap_or_else(|_| "unknown".to_string())
    });

    println!("cargo:rustc-env=RAYSTUDIO_BUILD_STAMP={stamp}");
}
