use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::cli::Args;

#[derive(Debug, Error)]
pub(crate) enum SymbolsError {
    #[error("symbols list is empty (file: {path:?})")]
    EmptyFromFile { path: PathBuf },

    #[error("failed to read symbols file: {path:?}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub(crate) type Result<T> = std::result::Result<T, SymbolsError>;

/// Символы из источника, выбранного в CLI:
/// - `--symbols-file` -> market_core::symbols::read_symbols_from_path
/// - `--symbols`      -> market_core::symbols::parse_symbols_csv
///
/// Без источника — пустой список: клиент может слушать только каналы.
pub(crate) fn load_symbols(args: &Args) -> Result<Vec<String>> {
    if let Some(path) = &args.symbols_file {
        load_from_file(path)
    } else if let Some(raw) = &args.symbols {
        Ok(market_core::symbols::parse_symbols_csv(raw))
    } else {
        Ok(Vec::new())
    }
}

pub(crate) fn load_channels(args: &Args) -> Vec<String> {
    args.channels
        .as_deref()
        .map(market_core::symbols::parse_channels_csv)
        .unwrap_or_default()
}

fn load_from_file(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref().to_path_buf();

    let symbols = market_core::symbols::read_symbols_from_path(&path).map_err(|e| {
        SymbolsError::ReadFile {
            path: path.clone(),
            source: e,
        }
    })?;

    if symbols.is_empty() {
        return Err(SymbolsError::EmptyFromFile { path });
    }

    Ok(symbols)
}
