use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Serialize;

use crate::debug_println;
use crate::models::HotelRecord;

/// Writes `value` as pretty-printed UTF-8 JSON, replacing any existing file.
/// Non-ASCII text is written as-is.
pub fn write_json<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .context(format!("Failed to create directory: {}", parent.display()))?;
    }

    let file = File::create(path)
        .context(format!("Failed to create output file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)
        .context(format!("Failed to write JSON to {}", path.display()))?;
    writer.flush()?;
    Ok(())
}

pub fn save_records(records: &[HotelRecord], path: &Path) -> Result<()> {
    write_json(records, path)?;
    println!("Saved all {} records to {}", records.len(), path.display());
    Ok(())
}

pub fn load_records(path: &Path) -> Result<Vec<HotelRecord>> {
    let file = File::open(path)
        .context(format!("Failed to open input file: {}", path.display()))?;
    let records = serde_json::from_reader(BufReader::new(file))
        .context(format!("Failed to parse records from {}", path.display()))?;
    Ok(records)
}

/// CSV report with display-formatted prices.
pub fn export_csv(records: &[HotelRecord], path: &Path) -> Result<()> {
    let file = File::create(path)
        .context(format!("Failed to create CSV file: {}", path.display()))?;
    let mut writer = csv::Writer::from_writer(file);

    writer.write_record(HotelRecord::csv_header())?;
    for record in records {
        writer.write_record(&record.to_csv_record())?;
    }

    writer.flush()?;
    println!("Exported {} records to {}", records.len(), path.display());
    Ok(())
}

/// Flushes a region's records to `hotel_data_batch_{region}_{n}.json` files
/// of `size` records each, numbered from 1.
#[derive(Debug, Clone)]
pub struct BatchWriter {
    dir: PathBuf,
    size: usize,
}

impl BatchWriter {
    pub fn new(dir: impl Into<PathBuf>, size: usize) -> Result<Self> {
        if size == 0 {
            bail!("Batch size must be at least 1");
        }
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .context(format!("Failed to create batch directory: {}", dir.display()))?;
        Ok(Self { dir, size })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn batch_path(&self, region: &str, batch_number: usize) -> PathBuf {
        self.dir
            .join(format!("hotel_data_batch_{}_{}.json", region, batch_number))
    }

    /// Call after every append. Writes the last full batch when `records`
    /// has just reached a multiple of the batch size.
    pub fn on_append(&self, region: &str, records: &[HotelRecord]) -> Result<Option<PathBuf>> {
        let len = records.len();
        if len == 0 || len % self.size != 0 {
            return Ok(None);
        }
        let batch_number = len / self.size;
        let path = self.batch_path(region, batch_number);
        write_json(&records[len - self.size..], &path)?;
        debug_println!("Saved batch {} for {} to {}", batch_number, region, path.display());
        Ok(Some(path))
    }

    /// Writes the trailing partial batch, if any, once a region is done.
    pub fn finish(&self, region: &str, records: &[HotelRecord]) -> Result<Option<PathBuf>> {
        let len = records.len();
        let remainder = len % self.size;
        if remainder == 0 {
            return Ok(None);
        }
        let batch_number = len / self.size + 1;
        let path = self.batch_path(region, batch_number);
        write_json(&records[len - remainder..], &path)?;
        debug_println!("Saved final batch {} for {} to {}", batch_number, region, path.display());
        Ok(Some(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Price;

    fn record(i: usize) -> HotelRecord {
        HotelRecord {
            description: format!("Hotel {} is a hotel located in Kraków", i),
            name: format!("Hotel {}", i),
            price: Price::new(100 + i as u64, "MYR"),
            price_estimated: false,
            is_origin_country: false,
            region: Some("Poland".to_string()),
            image: "https://default-hotel-image.com/high-res.jpg".to_string(),
        }
    }

    #[test]
    fn json_keeps_non_ascii_and_indents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.json");
        save_records(&[record(1)], &path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("Kraków"));
        assert!(text.starts_with("[\n  {"));
        assert_eq!(load_records(&path).unwrap(), vec![record(1)]);
    }

    #[test]
    fn batch_writer_flushes_on_boundaries() {
        let dir = tempfile::tempdir().unwrap();
        let writer = BatchWriter::new(dir.path().join("batches"), 2).unwrap();
        let mut records = Vec::new();
        let mut written = Vec::new();

        for i in 0..5 {
            records.push(record(i));
            if let Some(path) = writer.on_append("Poland", &records).unwrap() {
                written.push(path);
            }
        }
        written.extend(writer.finish("Poland", &records).unwrap());

        assert_eq!(
            written,
            vec![
                writer.batch_path("Poland", 1),
                writer.batch_path("Poland", 2),
                writer.batch_path("Poland", 3),
            ]
        );
        assert_eq!(load_records(&written[1]).unwrap(), records[2..4].to_vec());
        assert_eq!(load_records(&written[2]).unwrap(), records[4..].to_vec());
    }

    #[test]
    fn finish_skips_when_no_partial_batch() {
        let dir = tempfile::tempdir().unwrap();
        let writer = BatchWriter::new(dir.path(), 2).unwrap();
        let records = vec![record(0), record(1)];
        assert_eq!(writer.finish("Poland", &records).unwrap(), None);
        assert_eq!(writer.finish("Poland", &[]).unwrap(), None);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(BatchWriter::new(dir.path(), 0).is_err());
    }

    #[test]
    fn csv_export_formats_prices() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        let mut rich = record(0);
        rich.price = Price::new(12_500, "MYR");
        export_csv(&[rich], &path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("Name,Description,Price,Estimated,Origin Country,Region,Image")
        );
        assert!(lines.next().unwrap().contains("\"RM 12,500\""));
    }
}
