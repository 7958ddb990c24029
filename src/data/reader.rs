use anyhow::{Context, Result};
use csv::{Reader, ReaderBuilder, StringRecord};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Open a CSV file, transparently decompressing `.gz`
pub fn open_csv(path: &Path) -> Result<Reader<Box<dyn Read>>> {
    let file =
        File::open(path).with_context(|| format!("Failed to open CSV file: {}", path.display()))?;
    let reader: Box<dyn Read> = if path.extension().map_or(false, |e| e == "gz") {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };

    Ok(ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader))
}

/// Index of the first header matching any alias (case-insensitive)
pub fn find_column(headers: &StringRecord, aliases: &[&str]) -> Option<usize> {
    aliases.iter().find_map(|alias| {
        headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(alias))
    })
}

/// Non-empty trimmed field value
pub fn field(record: &StringRecord, idx: Option<usize>) -> Option<String> {
    idx.and_then(|i| record.get(i))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_column_aliases() {
        let headers = StringRecord::from(vec!["Name", "md_y", "MD_X"]);
        assert_eq!(find_column(&headers, &["name"]), Some(0));
        assert_eq!(find_column(&headers, &["lat", "md_y"]), Some(1));
        assert_eq!(find_column(&headers, &["md_x"]), Some(2));
        assert_eq!(find_column(&headers, &["phone"]), None);
    }

    #[test]
    fn test_missing_file_names_path() {
        let err = match open_csv(Path::new("/nonexistent/businesses.csv")) {
            Err(e) => e,
            Ok(_) => panic!("expected open to fail"),
        };
        assert!(format!("{:#}", err).contains("/nonexistent/businesses.csv"));
    }
}
