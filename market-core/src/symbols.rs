use std::collections::BTreeSet;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Нормализует символ: trim + ASCII uppercase. Пустой -> `None`
pub fn normalize_symbol(raw: &str) -> Option<String> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    Some(s.to_ascii_uppercase())
}

/// Нормализует имя канала: только trim, регистр не трогаем
pub fn normalize_channel(raw: &str) -> Option<String> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    Some(s.to_string())
}

/// "aapl, TSLA, ,goog" -> ["AAPL", "GOOG", "TSLA"] (отсортировано, без дублей)
pub fn parse_symbols_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .filter_map(normalize_symbol)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// "market-indices, news" -> ["market-indices", "news"]
pub fn parse_channels_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .filter_map(normalize_channel)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Читает символы построчно. `#` начинает комментарий до конца строки
pub fn read_symbols<R: io::Read>(reader: R) -> io::Result<Vec<String>> {
    let mut set = BTreeSet::new();

    for line in BufReader::new(reader).lines() {
        let line = line?;
        let body = line.split('#').next().unwrap_or("");
        // в одной строке допускаем и CSV: "AAPL, MSFT"
        set.extend(body.split(',').filter_map(normalize_symbol));
    }

    Ok(set.into_iter().collect())
}

pub fn read_symbols_from_path(path: impl AsRef<Path>) -> io::Result<Vec<String>> {
    read_symbols(File::open(path)?)
}
