use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serde_json::Value;
use sensorview_wire::{kind_name, Envelope, ImageEncoding};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// Print one JSON document per line and flush, so readers of a pipe see it
/// immediately.
pub fn print_json<T: Serialize>(value: &T) {
    let line = serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string());
    let mut out = std::io::stdout().lock();
    let _ = writeln!(out, "{line}");
    let _ = out.flush();
}

pub fn print_table(header: &[&str], rows: Vec<Vec<String>>) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header.to_vec());
    for row in rows {
        table.add_row(row);
    }
    println!("{table}");
    let _ = std::io::stdout().flush();
}

/// One message received by `watch`.
#[derive(Debug, Serialize)]
pub struct MessageRecord {
    pub kind: &'static str,
    pub size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale_mm: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tiles: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acked_kind: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<Value>,
}

impl MessageRecord {
    fn empty(kind: &'static str, size: usize) -> Self {
        Self {
            kind,
            size,
            encoding: None,
            width: None,
            height: None,
            timestamp: None,
            scale_mm: None,
            tiles: None,
            acked_kind: None,
            message: None,
        }
    }

    pub fn from_envelope(envelope: &Envelope, size: usize) -> Self {
        let mut record = Self::empty(kind_name(envelope.kind().as_u8()), size);
        match envelope {
            Envelope::Image { header, .. } => {
                record.encoding = Some(match header.encoding {
                    ImageEncoding::Raw => "raw",
                    ImageEncoding::Jpeg => "jpeg",
                });
                record.width = Some(header.width);
                record.height = Some(header.height);
                record.timestamp = Some(header.timestamp);
            }
            Envelope::Map { scale_mm, tiles } => {
                record.scale_mm = Some(*scale_mm);
                record.tiles = Some(tiles.len());
            }
            Envelope::Ack { kind } => record.acked_kind = Some(*kind),
        }
        record
    }

    pub fn from_text(text: &str) -> Self {
        let mut record = Self::empty("TEXT", text.len());
        record.message = Some(
            serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string())),
        );
        record
    }

    fn detail(&self) -> String {
        if let Some(message) = &self.message {
            return message.to_string();
        }
        if let (Some(w), Some(h)) = (self.width, self.height) {
            return format!(
                "{}x{} {} ts={}",
                w,
                h,
                self.encoding.unwrap_or("?"),
                self.timestamp.unwrap_or_default()
            );
        }
        if let Some(scale) = self.scale_mm {
            return format!("scale={scale}mm tiles={}", self.tiles.unwrap_or_default());
        }
        match self.acked_kind {
            Some(kind) => format!("ack {}", kind_name(kind)),
            None => String::new(),
        }
    }
}

pub fn print_message(record: &MessageRecord, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(record),
        OutputFormat::Table => print_table(
            &["KIND", "SIZE", "DETAIL"],
            vec![vec![
                record.kind.to_string(),
                record.size.to_string(),
                record.detail(),
            ]],
        ),
        OutputFormat::Pretty => {
            println!("kind={} size={} {}", record.kind, record.size, record.detail());
            let _ = std::io::stdout().flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use sensorview_wire::{ImageHeader, MsgKind, Tile};

    use super::*;

    #[test]
    fn image_record() {
        let envelope = Envelope::Image {
            header: ImageHeader {
                kind: MsgKind::Rgb,
                encoding: ImageEncoding::Jpeg,
                width: 320,
                height: 240,
                timestamp: 42,
            },
            payload: Default::default(),
        };
        let record = MessageRecord::from_envelope(&envelope, 100);
        assert_eq!(record.kind, "RGB");
        assert_eq!(record.detail(), "320x240 jpeg ts=42");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["encoding"], "jpeg");
        assert!(json.get("scale_mm").is_none());
    }

    #[test]
    fn map_and_text_records() {
        let envelope = Envelope::Map {
            scale_mm: 50,
            tiles: vec![Tile {
                x: 0,
                z: 0,
                occupancy: 1,
            }],
        };
        let record = MessageRecord::from_envelope(&envelope, 16);
        assert_eq!(record.kind, "MAP_UPDATE");
        assert_eq!(record.detail(), "scale=50mm tiles=1");

        let record = MessageRecord::from_text(r#"{"type":"event","event":"x"}"#);
        assert_eq!(record.kind, "TEXT");
        assert_eq!(record.message.as_ref().unwrap()["type"], "event");

        let record = MessageRecord::from_text("not json");
        assert_eq!(record.message, Some(Value::String("not json".into())));
    }
}
