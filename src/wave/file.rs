// src/wave/file.rs

//! A convenience wrapper over a `RIFF:WAVE` document.

use crate::riff::component::{Component, ValidationContext};
use crate::riff::document::RiffDocument;
use crate::riff::fourcc::FourCC;
use crate::riff::leaf::Leaf;
use crate::utils::error::{Result, RiffError};
use crate::utils::tree::NodeId;
use crate::utils::validation::ValidationResult;
use crate::wave::cue::CuePoint;
use crate::wave::format::{FormatTag, WaveFormat};
use crate::wave::schema::{self, CUE, DATA, FACT, FMT, INFO};
use log::info;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;

/// A WAVE file held in memory.
#[derive(Debug, Clone)]
pub struct WaveFile {
    document: RiffDocument,
}

impl WaveFile {
    /// Builds a file with a `fmt ` chunk and a `data` chunk holding `samples`.
    /// Formats other than PCM also get a `fact` chunk with the frame count.
    pub fn new(format: WaveFormat, samples: Vec<u8>) -> Result<Self> {
        let mut document = RiffDocument::new(schema::wave_schema());
        let root = document.root();

        let frames = format.sample_frames(samples.len() as u64);
        let needs_fact = format.effective_tag() != FormatTag::Pcm;

        let fmt = document.append_chunk(root, FMT)?;
        document.append_value(fmt, Leaf::WaveFormat(format))?;
        if needs_fact {
            let frames = u32::try_from(frames).map_err(|_| {
                RiffError::RiffFormat(format!("{} sample frames do not fit a 'fact' chunk", frames))
            })?;
            let fact = document.append_chunk(root, FACT)?;
            document.append_value(fact, Leaf::U32(frames))?;
        }
        let data = document.append_chunk(root, DATA)?;
        document.append_value(data, Leaf::Bytes(samples))?;

        Ok(WaveFile { document })
    }

    pub fn read_from<R: Read + Seek>(reader: R) -> Result<Self> {
        let document = RiffDocument::from_reader(reader, schema::wave_schema())?;
        Ok(WaveFile { document })
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = Self::read_from(BufReader::new(File::open(path)?))?;
        info!("opened {} ({} bytes)", path.display(), file.document.size());
        Ok(file)
    }

    pub fn write_to<W: Write + Seek>(&self, writer: W) -> Result<()> {
        self.document.write(writer)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.document.to_bytes()
    }

    pub fn document(&self) -> &RiffDocument {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut RiffDocument {
        &mut self.document
    }

    pub fn format(&self) -> Option<&WaveFormat> {
        schema::wave_format(self.document.tree(), self.document.root())
    }

    /// Raw sample bytes of the `data` chunk.
    pub fn samples(&self) -> Option<&[u8]> {
        let data = self.document.child(self.document.root(), DATA)?;
        self.document.tree().values(data).find_map(Leaf::as_bytes)
    }

    /// Number of whole sample frames in the `data` chunk.
    pub fn sample_frames(&self) -> u64 {
        match (self.format(), self.samples()) {
            (Some(format), Some(samples)) => format.sample_frames(samples.len() as u64),
            _ => 0,
        }
    }

    fn info_list(&self) -> Option<NodeId> {
        let tree = self.document.tree();
        tree.children(self.document.root())
            .iter()
            .copied()
            .find(|&node| {
                tree.get(node)
                    .and_then(Component::as_list)
                    .is_some_and(|list| list.type_id() == INFO)
            })
    }

    /// The text stored under an INFO tag such as `INAM` or `IART`.
    pub fn info(&self, tag: FourCC) -> Option<&str> {
        let list = self.info_list()?;
        let chunk = self.document.child(list, tag)?;
        self.document.tree().values(chunk).find_map(Leaf::as_text)
    }

    /// Sets an INFO tag, creating the `LIST:INFO` chunk if needed.
    pub fn set_info(&mut self, tag: FourCC, value: &str) -> Result<()> {
        let registered = schema::INFO_TAGS.iter().any(|t| FourCC::from_bytes(**t) == tag);
        if !registered {
            return Err(RiffError::InvalidOperation(format!(
                "'{}' is not an INFO tag",
                tag
            )));
        }

        let list = match self.info_list() {
            Some(list) => list,
            None => {
                let root = self.document.root();
                self.document.append_list(root, FourCC::LIST, INFO)?
            }
        };
        let chunk = match self.document.child(list, tag) {
            Some(chunk) => chunk,
            None => self.document.append_chunk(list, tag)?,
        };
        let tree = self.document.tree_mut();
        let existing = tree.children(chunk).to_vec();
        for node in existing {
            tree.remove(node)?;
        }
        tree.append(chunk, Component::Value(Leaf::Text(value.to_string())))?;
        Ok(())
    }

    pub fn cue_points(&self) -> Vec<CuePoint> {
        self.document
            .child(self.document.root(), CUE)
            .map(|cue| {
                self.document
                    .tree()
                    .values(cue)
                    .filter_map(Leaf::as_cue_point)
                    .copied()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Adds a cue point, creating the `cue ` chunk if needed and keeping its
    /// count in step.
    pub fn add_cue_point(&mut self, cue: CuePoint) -> Result<()> {
        let root = self.document.root();
        let chunk = match self.document.child(root, CUE) {
            Some(chunk) => chunk,
            None => {
                let chunk = self.document.append_chunk(root, CUE)?;
                self.document.append_value(chunk, Leaf::U32(0))?;
                chunk
            }
        };
        self.document.append_value(chunk, Leaf::CuePoint(cue))?;

        let tree = self.document.tree_mut();
        let count = tree.values(chunk).filter_map(Leaf::as_cue_point).count() as u32;
        let first = tree.children(chunk).first().copied();
        let stored = first
            .and_then(|node| tree.get_mut(node))
            .and_then(Component::as_leaf_mut);
        if let Some(Leaf::U32(stored)) = stored {
            *stored = count;
        }
        Ok(())
    }

    pub fn validate(&self) -> ValidationResult {
        self.validate_with(&ValidationContext::default())
    }

    pub fn validate_with(&self, context: &ValidationContext) -> ValidationResult {
        self.document.validate(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(s: &str) -> FourCC {
        s.parse().unwrap()
    }

    #[test]
    fn test_new_pcm_file() {
        let wave = WaveFile::new(WaveFormat::pcm(2, 44_100, 16), vec![0; 16]).unwrap();
        assert_eq!(wave.sample_frames(), 4);
        assert!(wave.document().find(FACT).is_none());
        assert!(wave.validate().is_valid());

        let bytes = wave.to_bytes().unwrap();
        assert_eq!(bytes.len(), 12 + 24 + 24);
        let parsed = WaveFile::read_from(std::io::Cursor::new(&bytes)).unwrap();
        assert_eq!(parsed.format(), wave.format());
        assert_eq!(parsed.samples(), Some(&[0u8; 16][..]));
    }

    #[test]
    fn test_float_file_gets_fact() {
        let wave = WaveFile::new(WaveFormat::ieee_float(1, 48_000, 32), vec![0; 12]).unwrap();
        let fact = wave.document().find(FACT).unwrap();
        assert_eq!(
            wave.document().tree().values(fact).next(),
            Some(&Leaf::U32(3))
        );
        let result = wave.validate();
        assert!(result.is_valid(), "{}", result);
    }

    #[test]
    fn test_info_tags() {
        let mut wave = WaveFile::new(WaveFormat::pcm(1, 8_000, 8), vec![1, 2]).unwrap();
        assert_eq!(wave.info(tag("INAM")), None);
        wave.set_info(tag("INAM"), "Hello").unwrap();
        wave.set_info(tag("IART"), "Someone").unwrap();
        wave.set_info(tag("INAM"), "Title").unwrap();
        assert!(wave.set_info(tag("XXXX"), "nope").is_err());

        let parsed = WaveFile::read_from(std::io::Cursor::new(wave.to_bytes().unwrap())).unwrap();
        assert_eq!(parsed.info(tag("INAM")), Some("Title"));
        assert_eq!(parsed.info(tag("IART")), Some("Someone"));
        assert!(parsed.validate().is_valid());
    }

    #[test]
    fn test_cue_points() {
        let mut wave = WaveFile::new(WaveFormat::pcm(1, 8_000, 16), vec![0; 8]).unwrap();
        wave.add_cue_point(CuePoint::in_data(1, 0)).unwrap();
        wave.add_cue_point(CuePoint::in_data(2, 3)).unwrap();

        let parsed = WaveFile::read_from(std::io::Cursor::new(wave.to_bytes().unwrap())).unwrap();
        let cues = parsed.cue_points();
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[1].sample_offset, 3);
        assert!(parsed.validate().is_valid());
    }
}
