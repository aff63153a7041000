use std::collections::BTreeMap;

use anyhow::{anyhow, Result};

/// Reads a two-column, tab-separated translation table. Blank keys are skipped; later rows win.
pub fn read_csv_dict<I: AsRef<str>>(path: I) -> Result<BTreeMap<String, String>> {
    let bytes = crate::slurp_file(path.as_ref())?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_reader(&bytes[..]);
    let mut dict = BTreeMap::new();
    for rec in reader.records() {
        let rec = rec?;
        let key = match rec.get(0) {
            Some(k) if !k.is_empty() => k.to_string(),
            _ => continue,
        };
        let value = rec.get(1).unwrap_or("").to_string();
        dict.insert(key, value);
    }
    Ok(dict)
}

pub fn write_csv_dict<I: AsRef<str>>(path: I, dict: &BTreeMap<String, String>) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_writer(Vec::new());
    for (k, v) in dict {
        writer.write_record(&[k, v])?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| anyhow!("flushing CSV: {}", err))?;
    crate::write_file(path, &bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tab_separated() {
        let dir = tempfile::tempdir().unwrap();
        let path = format!("{}/highway_names.csv", dir.path().display());
        let mut dict = BTreeMap::new();
        dict.insert("CL MAYOR".to_string(), "Calle Mayor".to_string());
        dict.insert("PZ ESPAÑA".to_string(), "Plaza de España".to_string());
        write_csv_dict(&path, &dict).unwrap();

        let raw = String::from_utf8(crate::slurp_file(&path).unwrap()).unwrap();
        assert!(raw.contains("CL MAYOR\tCalle Mayor"));
        assert_eq!(read_csv_dict(&path).unwrap(), dict);
    }
}
