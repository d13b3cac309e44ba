//! The standard element set.
//!
//! Every built-in registers under the `conduit.` namespace. Each module
//! exposes a `spec()` and `factory()` pair — the registry never sees the
//! concrete element types.
//!
//! ```text
//! Registry
//! ├── Sources    (Input, RestApi, Random, Glob)
//! ├── Transforms (Filter, JsonQuery, Extract, Format, Console, Replace)
//! ├── Flow       (Fork, Iterate, Identity, Empty)
//! ├── Data       (CsvReader, GroupBy, Sort)
//! ├── System     (DownloadFile, Cli, FileInfo, Find, Path)
//! ├── SFTP       (SftpList, SftpDownload)
//! └── Numerics   (Numpy, Eval)
//! ```

mod cli;
mod console;
mod csv_reader;
mod download;
mod empty;
mod eval;
mod extract;
mod file_info;
mod filter;
mod find;
mod fork;
mod format;
mod glob_files;
mod groupby;
mod identity;
mod input;
mod iterate;
mod jsonquery;
mod numeric;
mod path;
mod random;
mod replace;
mod restapi;
mod sftp;
mod sort;

use conduit_types::ConduitResult;

use crate::registry::Registry;

/// Register every built-in element.
pub fn register_builtins(registry: &mut Registry) -> ConduitResult<()> {
    registry.register(input::spec(), input::factory())?;
    registry.register(restapi::spec(), restapi::factory())?;
    registry.register(random::spec(), random::factory())?;
    registry.register(glob_files::spec(), glob_files::factory())?;

    registry.register(filter::spec(), filter::factory())?;
    registry.register(jsonquery::spec(), jsonquery::factory())?;
    registry.register(extract::spec(), extract::factory())?;
    registry.register(format::spec(), format::factory())?;
    registry.register(console::spec(), console::factory())?;
    registry.register(replace::spec(), replace::factory())?;

    registry.register(fork::spec(), fork::factory())?;
    registry.register(iterate::spec(), iterate::factory())?;
    registry.register(identity::spec(), identity::factory())?;
    registry.register(empty::spec(), empty::factory())?;

    registry.register(csv_reader::spec(), csv_reader::factory())?;
    registry.register(groupby::spec(), groupby::factory())?;
    registry.register(sort::spec(), sort::factory())?;

    registry.register(download::spec(), download::factory())?;
    registry.register(cli::spec(), cli::factory())?;
    registry.register(file_info::spec(), file_info::factory())?;
    registry.register(find::spec(), find::factory())?;
    registry.register(path::spec(), path::factory())?;

    registry.register(sftp::list_spec(), sftp::list_factory())?;
    registry.register(sftp::download_spec(), sftp::download_factory())?;

    registry.register(numeric::spec(), numeric::factory())?;
    registry.register(eval::spec(), eval::factory())?;

    Ok(())
}
