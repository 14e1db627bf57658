// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! `fern`-based logging setup for binaries and tests that embed this
//! crate. The kernels themselves only ever call `log::{trace,debug}!`; they
//! never configure a logger.

/// Install a `fern` dispatcher that writes to stdout, with verbosity
/// controlled the same way the teacher's CLI tools do it: `0` is `Info`,
/// `1` is `Debug`, anything higher is `Trace`.
pub fn setup_logging(verbosity: u8) -> Result<(), fern::InitError> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} line {}][{}] {}",
                record.target(),
                record.line().unwrap_or(0),
                record.level(),
                message
            ))
        })
        .level(match verbosity {
            0 => log::LevelFilter::Info,
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        })
        .chain(std::io::stdout())
        .apply()?;
    Ok(())
}
