use super::RowSink;
use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// One JSON object per line, keyed by column name.
pub struct JsonlSink {
    writer: BufWriter<Box<dyn Write + Send>>,
    keys: Vec<String>,
}

impl JsonlSink {
    pub fn new<P: AsRef<Path>>(path: P, keys: Vec<String>) -> Result<Self> {
        let path = path.as_ref();
        let file =
            File::create(path).with_context(|| format!("Sink: Failed to create {:?}", path))?;
        Ok(Self {
            writer: BufWriter::new(Box::new(file)),
            keys,
        })
    }

    pub fn stdout(keys: Vec<String>) -> Result<Self> {
        Ok(Self {
            writer: BufWriter::new(Box::new(std::io::stdout())),
            keys,
        })
    }
}

impl RowSink for JsonlSink {
    fn write_record(&mut self, record: &[String]) -> Result<()> {
        let object: Map<String, Value> = self
            .keys
            .iter()
            .zip(record)
            .map(|(key, value)| (key.clone(), Value::String(value.clone())))
            .collect();

        serde_json::to_writer(&mut self.writer, &Value::Object(object))?;
        writeln!(self.writer)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_one_object_per_line() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut sink = JsonlSink::new(file.path(), vec!["UF".into(), "EMAIL".into()]).unwrap();
        sink.write_record(&["MG".to_string(), "x@empresa.com".to_string()])
            .unwrap();
        sink.write_record(&["SP".to_string(), String::new()]).unwrap();
        sink.finish().unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        let lines: Vec<Value> = content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["UF"], "MG");
        assert_eq!(lines[0]["EMAIL"], "x@empresa.com");
        assert_eq!(lines[1]["EMAIL"], "");
    }
}
