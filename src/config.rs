//! Host configuration, parsed from bare positional arguments in the
//! teacher's own minimal style (no flag-parsing crate).

use std::env;

/// Inputs the host binary needs beyond the core's own construction
/// parameter (the BIOS bytes themselves are read from `bios_path`).
pub struct Config {
    pub bios_path: String,
    pub cd_image_path: Option<String>,
    pub headless: bool,
}

impl Config {
    /// Parses `argv`: the BIOS path is the first positional argument, an
    /// optional second positional argument names a CD image, and `--headless`
    /// suppresses the windowed presenter.
    pub fn from_args() -> Result<Self, String> {
        let mut bios_path = None;
        let mut cd_image_path = None;
        let mut headless = false;

        for arg in env::args().skip(1) {
            if arg == "--headless" {
                headless = true;
            } else if bios_path.is_none() {
                bios_path = Some(arg);
            } else if cd_image_path.is_none() {
                cd_image_path = Some(arg);
            }
        }

        let bios_path = bios_path.ok_or_else(|| "usage: rpsx <bios.bin> [disc.bin] [--headless]".to_string())?;
        Ok(Self { bios_path, cd_image_path, headless })
    }
}
