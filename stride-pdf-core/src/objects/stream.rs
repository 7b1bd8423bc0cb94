use crate::error::{PdfError, Result};
use crate::objects::{Dictionary, Object};

/// A PDF stream: dictionary plus raw (possibly filtered) data.
///
/// Decoded bytes can be materialized eagerly (`cache_decoded`) when a
/// document is loaded with stream caching enabled, or computed on demand
/// by `decoded_data`. The two paths return identical bytes; caching only
/// trades memory for repeated-access speed.
#[derive(Debug, Clone, PartialEq)]
pub struct Stream {
    dictionary: Dictionary,
    data: Vec<u8>,
    decoded: Option<Vec<u8>>,
}

impl Stream {
    pub fn new(data: Vec<u8>) -> Self {
        let mut dictionary = Dictionary::new();
        dictionary.set("Length", data.len() as i64);
        Self {
            dictionary,
            data,
            decoded: None,
        }
    }

    pub fn with_dictionary(dictionary: Dictionary, data: Vec<u8>) -> Self {
        let mut dict = dictionary;
        dict.set("Length", data.len() as i64);
        Self {
            dictionary: dict,
            data,
            decoded: None,
        }
    }

    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    pub fn dictionary_mut(&mut self) -> &mut Dictionary {
        &mut self.dictionary
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn set_data(&mut self, data: Vec<u8>) {
        self.data = data;
        self.decoded = None;
        self.dictionary.set("Length", self.data.len() as i64);
    }

    pub fn filter(&self) -> Option<&str> {
        match self.dictionary.get("Filter") {
            Some(Object::Name(name)) => Some(name.as_str()),
            // A one-element filter array is common; longer chains are not
            // produced by this crate.
            Some(Object::Array(filters)) if filters.len() == 1 => filters[0].as_name(),
            _ => None,
        }
    }

    /// Decode the stream data according to its `Filter` entry.
    pub fn decoded_data(&self) -> Result<Vec<u8>> {
        if let Some(decoded) = &self.decoded {
            return Ok(decoded.clone());
        }
        self.decode()
    }

    /// Decode once and keep the result for later `decoded_data` calls.
    pub fn cache_decoded(&mut self) -> Result<()> {
        if self.decoded.is_none() {
            self.decoded = Some(self.decode()?);
        }
        Ok(())
    }

    pub fn is_decoded_cached(&self) -> bool {
        self.decoded.is_some()
    }

    fn decode(&self) -> Result<Vec<u8>> {
        match self.filter() {
            None => Ok(self.data.clone()),
            Some("FlateDecode") => self.decode_flate(),
            Some(other) => Err(PdfError::Format(format!(
                "Unsupported stream filter: {other}"
            ))),
        }
    }

    #[cfg(feature = "compression")]
    fn decode_flate(&self) -> Result<Vec<u8>> {
        use flate2::read::ZlibDecoder;
        use std::io::Read;

        let mut decoder = ZlibDecoder::new(self.data.as_slice());
        let mut decoded = Vec::new();
        decoder
            .read_to_end(&mut decoded)
            .map_err(|e| PdfError::Format(format!("FlateDecode failed: {e}")))?;
        Ok(decoded)
    }

    #[cfg(not(feature = "compression"))]
    fn decode_flate(&self) -> Result<Vec<u8>> {
        Err(PdfError::Format(
            "FlateDecode support not enabled (compression feature)".to_string(),
        ))
    }

    #[cfg(feature = "compression")]
    pub fn compress_flate(&mut self) -> Result<()> {
        use flate2::write::ZlibEncoder;
        use flate2::Compression;
        use std::io::Write;

        let decoded = self.decoded_data()?;
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(&decoded)
            .map_err(|e| PdfError::Format(format!("FlateDecode compression failed: {e}")))?;
        let compressed = encoder
            .finish()
            .map_err(|e| PdfError::Format(format!("FlateDecode compression failed: {e}")))?;

        self.data = compressed;
        self.decoded = Some(decoded);
        self.dictionary.set("Length", self.data.len() as i64);
        self.dictionary.set("Filter", Object::name("FlateDecode"));
        Ok(())
    }
}
